use log::debug;
use mailparse::{DispositionType, MailHeaderMap, ParsedMail};

/// Decodes RFC 2047 encoded-words in a raw header value.
pub fn decode_mime_words(raw: &[u8]) -> String {
    // mailparse expects a full "Key: value" header line
    let mut line = b"X: ".to_vec();
    line.extend_from_slice(raw);
    line.extend_from_slice(b"\r\n");

    match mailparse::parse_header(&line) {
        Ok((h, _idx)) => h.get_value(),
        Err(_) => String::from_utf8_lossy(raw).into_owned(),
    }
}

/// Pulls the `To` header out of a header block and decodes it.
pub fn recipient_from_headers(block: &[u8]) -> Option<String> {
    let (headers, _) = mailparse::parse_headers(block).ok()?;
    headers
        .get_first_header("To")
        .map(|h| decode_mime_words(h.get_value_raw()).trim().to_string())
}

/// Subject and body text of a raw RFC 822 message.
///
/// For multipart messages the body is the first `text/plain` part that is
/// not an attachment (empty if there is none); otherwise it is the single
/// part's text.
pub fn extract_subject_and_body(raw_rfc822: &[u8]) -> (String, String) {
    let parsed = match mailparse::parse_mail(raw_rfc822) {
        Ok(p) => p,
        Err(e) => {
            debug!("unparseable message, keeping raw text: {e}");
            return (String::new(), String::from_utf8_lossy(raw_rfc822).into_owned());
        }
    };

    let subject = parsed
        .headers
        .get_first_header("Subject")
        .map(|h| decode_mime_words(h.get_value_raw()).trim().to_string())
        .unwrap_or_default();

    let body = if parsed.subparts.is_empty() {
        decode_part_text(&parsed)
    } else {
        find_plain_text(&parsed)
            .map(decode_part_text)
            .unwrap_or_default()
    };

    (subject, body)
}

fn find_plain_text<'a>(part: &'a ParsedMail<'a>) -> Option<&'a ParsedMail<'a>> {
    if part.ctype.mimetype.eq_ignore_ascii_case("text/plain")
        && part.get_content_disposition().disposition != DispositionType::Attachment
    {
        return Some(part);
    }
    part.subparts.iter().find_map(find_plain_text)
}

/// Transfer-decodes the part and converts it from its declared charset.
/// Falls back to lossy UTF-8 when the charset conversion fails.
fn decode_part_text(part: &ParsedMail) -> String {
    match part.get_body() {
        Ok(text) => text,
        Err(e) => {
            debug!("charset {:?} failed ({e}), using utf-8", part.ctype.charset);
            part.get_body_raw()
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                .unwrap_or_default()
        }
    }
}

/// Collapses whitespace runs into single spaces and trims.
pub fn clean_text(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// At most `limit` characters, with `...` appended when cut.
pub fn preview(text: Option<&str>, limit: usize) -> String {
    let text = text.unwrap_or_default().trim();
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut out: String = text.chars().take(limit).collect();
    out.push_str("...");
    out
}

pub fn format_size(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < KB * KB {
        format!("{:.2} KB", b / KB)
    } else {
        format!("{:.2} MB", b / (KB * KB))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_encoded_words() {
        assert_eq!(
            decode_mime_words(b"=?UTF-8?B?5pel5pys6Kqe?= <jp@example.com>"),
            "日本語 <jp@example.com>"
        );
        assert_eq!(decode_mime_words(b"plain@example.com"), "plain@example.com");
    }

    #[test]
    fn finds_recipient_in_header_block() {
        let block = b"To: =?ISO-8859-1?Q?Andr=E9?= <andre@example.com>\r\n\r\n";
        assert_eq!(
            recipient_from_headers(block).as_deref(),
            Some("Andr\u{e9} <andre@example.com>")
        );
        assert_eq!(recipient_from_headers(b"Subject: x\r\n\r\n"), None);
    }

    #[test]
    fn single_part_message() {
        let raw = b"Subject: =?UTF-8?Q?caf=C3=A9?=\r\n\
                    Content-Type: text/plain; charset=utf-8\r\n\r\nhello there\r\n";
        let (subject, body) = extract_subject_and_body(raw);
        assert_eq!(subject, "caf\u{e9}");
        assert_eq!(body.trim(), "hello there");
    }

    #[test]
    fn multipart_prefers_inline_plain_text() {
        let raw = concat!(
            "Subject: report\r\n",
            "Content-Type: multipart/mixed; boundary=\"b1\"\r\n\r\n",
            "--b1\r\n",
            "Content-Type: text/plain; charset=utf-8\r\n",
            "Content-Disposition: attachment; filename=\"notes.txt\"\r\n\r\n",
            "attached notes\r\n",
            "--b1\r\n",
            "Content-Type: multipart/alternative; boundary=\"b2\"\r\n\r\n",
            "--b2\r\n",
            "Content-Type: text/html\r\n\r\n",
            "<p>html body</p>\r\n",
            "--b2\r\n",
            "Content-Type: text/plain; charset=iso-8859-1\r\n",
            "Content-Transfer-Encoding: quoted-printable\r\n\r\n",
            "plain caf=E9\r\n",
            "--b2--\r\n",
            "--b1--\r\n",
        );
        let (subject, body) = extract_subject_and_body(raw.as_bytes());
        assert_eq!(subject, "report");
        assert_eq!(body.trim(), "plain caf\u{e9}");
    }

    #[test]
    fn multipart_without_plain_text_has_empty_body() {
        let raw = concat!(
            "Subject: html only\r\n",
            "Content-Type: multipart/alternative; boundary=\"b\"\r\n\r\n",
            "--b\r\n",
            "Content-Type: text/html\r\n\r\n",
            "<b>hi</b>\r\n",
            "--b--\r\n",
        );
        let (_, body) = extract_subject_and_body(raw.as_bytes());
        assert!(body.is_empty());
    }

    #[test]
    fn invalid_bytes_are_replaced() {
        let raw = b"Subject: bad\r\nContent-Type: text/plain; charset=utf-8\r\n\r\nok \xff\xfe end\r\n";
        let (_, body) = extract_subject_and_body(raw);
        assert!(body.starts_with("ok "));
        assert!(body.contains("end"));
    }

    #[test]
    fn text_helpers() {
        assert_eq!(clean_text("  a \r\n\t b  c "), "a b c");
        assert_eq!(preview(Some("  short "), 20), "short");
        assert_eq!(preview(Some("0123456789abcdef"), 4), "0123...");
        assert_eq!(preview(None, 4), "");
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.00 MB");
    }
}
