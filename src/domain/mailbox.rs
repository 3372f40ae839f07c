use log::warn;
use std::fmt;

/// A server-side folder in both of its forms: the UTF-8 display name and
/// the modified UTF-7 name used on the wire (RFC 3501 §5.1.3).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MailboxName {
    display: String,
    wire: String,
}

impl MailboxName {
    pub fn from_display(display: impl Into<String>) -> Self {
        let display = display.into();
        let wire = encode_wire(&display);
        Self { display, wire }
    }

    pub fn from_wire(wire: impl Into<String>) -> Self {
        let wire = wire.into();
        let display = decode_wire(&wire);
        Self { display, wire }
    }

    pub fn display(&self) -> &str {
        &self.display
    }

    pub fn wire(&self) -> &str {
        &self.wire
    }
}

impl fmt::Display for MailboxName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

pub fn encode_wire(display: &str) -> String {
    utf7_imap::encode_utf7_imap(display.to_string())
}

/// Decodes a wire name. Names that are not well-formed modified UTF-7
/// are kept as sent.
pub fn decode_wire(wire: &str) -> String {
    if !is_well_formed_wire(wire) {
        warn!("mailbox name {wire:?} is not valid modified UTF-7, keeping it as sent");
        return wire.to_string();
    }
    utf7_imap::decode_utf7_imap(wire.to_string())
}

/// Every `&` must open a `-`-terminated run of modified base64 that
/// carries whole UTF-16 code units (`&-` is a literal `&`).
fn is_well_formed_wire(wire: &str) -> bool {
    let mut rest = wire;
    while let Some(start) = rest.find('&') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('-') else {
            return false;
        };
        let run = &after[..end];
        let alphabet_ok = run
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b',');
        let bytes = run.len() * 6 / 8;
        if !alphabet_ok || run.len() % 4 == 1 || bytes % 2 != 0 {
            return false;
        }
        rest = &after[end + 1..];
    }
    true
}
