use log::{debug, warn};

use crate::domain::mailbox::MailboxName;
use crate::error::{Error, Result};
use crate::mail::session::MailSession;

/// Mailboxes to search.
///
/// Explicit targets (display names) are used as given. Without targets the
/// live listing is used, minus `\Noselect` entries and anything named in
/// `ignored` (matched against display or wire form).
pub fn resolve<S: MailSession + ?Sized>(
    session: &mut S,
    targets: &[String],
    ignored: &[String],
) -> Result<Vec<MailboxName>> {
    if !targets.is_empty() {
        return Ok(targets.iter().map(MailboxName::from_display).collect());
    }

    let listed = session.list_mailboxes().map_err(Error::List)?;
    let mut mailboxes = Vec::with_capacity(listed.len());
    for entry in listed {
        let name = MailboxName::from_wire(entry.wire_name);
        if !entry.selectable {
            debug!("mailbox '{name}' is not selectable, skipping");
            continue;
        }
        if ignored
            .iter()
            .any(|i| i == name.display() || i == name.wire())
        {
            debug!("mailbox '{name}' is ignored");
            continue;
        }
        mailboxes.push(name);
    }
    Ok(mailboxes)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxSummary {
    pub name: MailboxName,
    pub messages: u32,
}

/// Every selectable mailbox with its message count.
pub fn describe_mailboxes<S: MailSession + ?Sized>(session: &mut S) -> Result<Vec<MailboxSummary>> {
    let listed = session.list_mailboxes().map_err(Error::List)?;
    let mut out = Vec::with_capacity(listed.len());
    for entry in listed {
        let name = MailboxName::from_wire(entry.wire_name);
        if !entry.selectable {
            warn!("mailbox '{name}' cannot be selected, skipping");
            continue;
        }
        let messages = session
            .message_count(name.wire())
            .map_err(|source| Error::Status {
                mailbox: name.display().to_string(),
                source,
            })?;
        out.push(MailboxSummary { name, messages });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::mock::{MockMessage, MockServer};

    fn server() -> MockServer {
        let msg = || vec![MockMessage::new(1, None, "a@b.c", "s", "b")];
        MockServer::default()
            .with_mailbox("INBOX", msg())
            .with_mailbox("Trash", msg())
            .with_mailbox("&U9dP4TDIMOwwpA-", msg())
            .with_mailbox("&kAFP4TDIMOwwpA-", vec![])
            .with_noselect("[Gmail]")
    }

    fn wires(names: &[MailboxName]) -> Vec<&str> {
        names.iter().map(MailboxName::wire).collect()
    }

    #[test]
    fn explicit_targets_are_used_verbatim() {
        let mut session = server().session();
        let targets = vec!["受信トレイ".to_string(), "Trash".to_string()];

        let names = resolve(&mut session, &targets, &["Trash".into()]).unwrap();

        assert_eq!(names.len(), 2);
        assert_eq!(names[0].display(), "受信トレイ");
        assert!(names[0].wire().is_ascii());
        assert_eq!(names[1].wire(), "Trash");
    }

    #[test]
    fn listing_drops_noselect_and_ignored() {
        let mut session = server().session();

        let names = resolve(&mut session, &[], &["Trash".into(), "送信トレイ".into()]).unwrap();

        assert_eq!(wires(&names), vec!["&U9dP4TDIMOwwpA-", "INBOX"]);
        assert_eq!(names[0].display(), "受信トレイ");
    }

    #[test]
    fn malformed_listed_name_does_not_abort_the_listing() {
        let mut session = MockServer::default()
            .with_mailbox("&!!-", vec![MockMessage::new(1, None, "a@b.c", "s", "b")])
            .session();

        let names = resolve(&mut session, &[], &[]).unwrap();

        assert_eq!(names.len(), 1);
        assert_eq!(names[0].display(), "&!!-");
        assert_eq!(names[0].wire(), "&!!-");
    }

    #[test]
    fn describes_message_counts() {
        let mut session = server().session();

        let summaries = describe_mailboxes(&mut session).unwrap();

        let counts: Vec<(&str, u32)> = summaries
            .iter()
            .map(|s| (s.name.display(), s.messages))
            .collect();
        assert_eq!(
            counts,
            vec![
                ("受信トレイ", 1),
                ("送信トレイ", 0),
                ("INBOX", 1),
                ("Trash", 1)
            ]
        );
    }
}
