//! In-memory stand-in for an IMAP server, used by unit tests.

use chrono::{DateTime, FixedOffset, NaiveDate};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::domain::email::Uid;
use crate::error::{Error, Result};
use crate::mail::response::{FetchedItem, ListedMailbox};
use crate::mail::session::{Connector, MailSession};

#[derive(Debug, Clone)]
pub struct MockMessage {
    pub uid: Uid,
    pub internal_date: Option<DateTime<FixedOffset>>,
    pub raw: Vec<u8>,
}

impl MockMessage {
    pub fn new(uid: Uid, date: Option<&str>, to: &str, subject: &str, body: &str) -> Self {
        let raw = format!(
            "From: sender@example.com\r\nTo: {to}\r\nSubject: {subject}\r\n\
             Content-Type: text/plain; charset=utf-8\r\n\r\n{body}\r\n"
        );
        Self {
            uid,
            internal_date: date.map(|d| DateTime::parse_from_rfc3339(d).unwrap()),
            raw: raw.into_bytes(),
        }
    }

    pub fn dated(uid: Uid, date: DateTime<FixedOffset>) -> Self {
        let mut msg = Self::new(uid, None, "to@example.com", &format!("subject {uid}"), "body");
        msg.internal_date = Some(date);
        msg
    }
}

/// What the next UID FETCH call does.
#[derive(Debug, Clone)]
pub enum FetchStep {
    Normal,
    Fail,
    /// Answer only for these UIDs (intersected with the request).
    Only(Vec<Uid>),
    /// Answer normally plus an item for a UID nobody asked for.
    Extra(Uid),
}

#[derive(Debug, Clone, Default)]
pub struct MockServer {
    pub mailboxes: BTreeMap<String, Vec<MockMessage>>,
    pub noselect: Vec<String>,
    pub script: Vec<FetchStep>,
    pub fail_logout: bool,
}

impl MockServer {
    pub fn with_mailbox(mut self, wire_name: &str, messages: Vec<MockMessage>) -> Self {
        self.mailboxes.insert(wire_name.to_string(), messages);
        self
    }

    pub fn with_noselect(mut self, wire_name: &str) -> Self {
        self.noselect.push(wire_name.to_string());
        self
    }

    pub fn with_script(mut self, script: Vec<FetchStep>) -> Self {
        self.script = script;
        self
    }

    pub fn session(&self) -> MockSession {
        MockSession::new(self.clone(), Arc::default())
    }
}

#[derive(Debug, Default)]
pub struct Counters {
    pub connects: AtomicUsize,
    pub logouts: AtomicUsize,
    pub fetch_calls: Mutex<Vec<String>>,
}

pub struct MockSession {
    server: MockServer,
    script: VecDeque<FetchStep>,
    selected: Option<String>,
    counters: Arc<Counters>,
}

impl MockSession {
    fn new(server: MockServer, counters: Arc<Counters>) -> Self {
        let script = server.script.iter().cloned().collect();
        Self {
            server,
            script,
            selected: None,
            counters,
        }
    }

    pub fn fetch_calls(&self) -> Vec<String> {
        self.counters.fetch_calls.lock().unwrap().clone()
    }

    fn item(msg: &MockMessage, query: &str) -> FetchedItem {
        FetchedItem {
            uid: Some(msg.uid),
            internal_date: if query.contains("INTERNALDATE") {
                msg.internal_date
            } else {
                None
            },
            header: query.contains("HEADER").then(|| msg.raw.clone()),
            body: query.contains("RFC822").then(|| msg.raw.clone()),
        }
    }
}

impl MailSession for MockSession {
    fn select_mailbox(&mut self, mailbox: &str, _readonly: bool) -> bool {
        let open = self
            .server
            .mailboxes
            .get(mailbox)
            .is_some_and(|msgs| !msgs.is_empty());
        self.selected = open.then(|| mailbox.to_string());
        open
    }

    fn search_uids(&mut self, criteria: &str) -> imap::error::Result<Vec<Uid>> {
        let selected = self
            .selected
            .as_ref()
            .ok_or_else(|| imap::Error::Bad("no mailbox selected".into()))?;
        let since = criteria
            .strip_prefix("SINCE ")
            .and_then(|rest| rest.split_whitespace().next())
            .and_then(|d| NaiveDate::parse_from_str(d, "%d-%b-%Y").ok());

        let mut uids: Vec<Uid> = self.server.mailboxes[selected]
            .iter()
            .filter(|m| match (since, m.internal_date) {
                (Some(since), Some(date)) => date.date_naive() >= since,
                _ => true,
            })
            .map(|m| m.uid)
            .collect();
        uids.sort_unstable();
        Ok(uids)
    }

    fn list_mailboxes(&mut self) -> imap::error::Result<Vec<ListedMailbox>> {
        let mut listed: Vec<ListedMailbox> = self
            .server
            .mailboxes
            .keys()
            .map(|name| ListedMailbox {
                wire_name: name.clone(),
                selectable: true,
            })
            .collect();
        listed.extend(self.server.noselect.iter().map(|name| ListedMailbox {
            wire_name: name.clone(),
            selectable: false,
        }));
        Ok(listed)
    }

    fn message_count(&mut self, mailbox: &str) -> imap::error::Result<u32> {
        self.server
            .mailboxes
            .get(mailbox)
            .map(|msgs| msgs.len() as u32)
            .ok_or_else(|| imap::Error::No(format!("no such mailbox {mailbox}")))
    }

    fn uid_fetch(&mut self, uid_set: &str, query: &str) -> imap::error::Result<Vec<FetchedItem>> {
        self.counters
            .fetch_calls
            .lock()
            .unwrap()
            .push(uid_set.to_string());

        let selected = self
            .selected
            .clone()
            .ok_or_else(|| imap::Error::Bad("no mailbox selected".into()))?;
        let requested: Vec<Uid> = uid_set.split(',').filter_map(|u| u.parse().ok()).collect();
        let messages = &self.server.mailboxes[&selected];
        let answer = |uid: &Uid| messages.iter().find(|m| m.uid == *uid);

        let step = self.script.pop_front().unwrap_or(FetchStep::Normal);
        let items = match step {
            FetchStep::Fail => return Err(imap::Error::No("server busy".into())),
            FetchStep::Normal => requested
                .iter()
                .filter_map(answer)
                .map(|m| Self::item(m, query))
                .collect(),
            FetchStep::Only(allowed) => requested
                .iter()
                .filter(|uid| allowed.contains(*uid))
                .filter_map(answer)
                .map(|m| Self::item(m, query))
                .collect(),
            FetchStep::Extra(extra) => {
                let mut items: Vec<FetchedItem> = requested
                    .iter()
                    .filter_map(answer)
                    .map(|m| Self::item(m, query))
                    .collect();
                let stray = MockMessage::new(extra, None, "x@y.z", "stray", "stray");
                items.push(Self::item(&stray, query));
                items
            }
        };
        Ok(items)
    }

    fn logout(&mut self) -> imap::error::Result<()> {
        self.counters.logouts.fetch_add(1, Ordering::SeqCst);
        if self.server.fail_logout {
            return Err(imap::Error::ConnectionLost);
        }
        Ok(())
    }
}

pub struct MockConnector {
    server: MockServer,
    counters: Arc<Counters>,
    pub refuse: bool,
}

impl MockConnector {
    pub fn new(server: MockServer) -> Self {
        Self {
            server,
            counters: Arc::default(),
            refuse: false,
        }
    }

    pub fn connects(&self) -> usize {
        self.counters.connects.load(Ordering::SeqCst)
    }

    pub fn logouts(&self) -> usize {
        self.counters.logouts.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> Vec<String> {
        self.counters.fetch_calls.lock().unwrap().clone()
    }
}

impl Connector for MockConnector {
    type Session = MockSession;

    fn connect(&self) -> Result<MockSession> {
        if self.refuse {
            return Err(Error::Auth {
                user: "mock".into(),
                source: imap::Error::No("invalid credentials".into()),
            });
        }
        self.counters.connects.fetch_add(1, Ordering::SeqCst);
        Ok(MockSession::new(self.server.clone(), self.counters.clone()))
    }
}
