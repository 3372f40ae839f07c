use chrono::{DateTime, FixedOffset};
use std::collections::HashMap;

pub type Uid = u32;

/// Identity of a message: UIDs are only unique within their mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageKey {
    pub mailbox: String,
    pub uid: Uid,
}

impl MessageKey {
    pub fn new(mailbox: impl Into<String>, uid: Uid) -> Self {
        Self {
            mailbox: mailbox.into(),
            uid,
        }
    }
}

/// One message flowing through the pipeline. `mailbox` (wire form) and
/// `uid` are fixed at discovery; the rest is filled in by later stages.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailRecord {
    mailbox: String,
    uid: Uid,
    pub received_at: Option<DateTime<FixedOffset>>,
    pub recipient: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
}

impl EmailRecord {
    pub fn new(mailbox: impl Into<String>, uid: Uid) -> Self {
        Self {
            mailbox: mailbox.into(),
            uid,
            received_at: None,
            recipient: None,
            subject: None,
            body: None,
        }
    }

    pub fn mailbox(&self) -> &str {
        &self.mailbox
    }

    pub fn uid(&self) -> Uid {
        self.uid
    }

    pub fn key(&self) -> MessageKey {
        MessageKey::new(self.mailbox.clone(), self.uid)
    }

    pub fn received_at_text(&self, fmt: &str) -> String {
        self.received_at
            .map(|d| d.format(fmt).to_string())
            .unwrap_or_default()
    }
}

/// Records keyed by `MessageKey`, iterated in insertion order.
#[derive(Debug, Clone, Default)]
pub struct EmailRecords {
    entries: Vec<EmailRecord>,
    index: HashMap<MessageKey, usize>,
}

impl EmailRecords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Adds a fresh record; returns false when the key is already known.
    pub fn insert_new(&mut self, mailbox: &str, uid: Uid) -> bool {
        let key = MessageKey::new(mailbox, uid);
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key, self.entries.len());
        self.entries.push(EmailRecord::new(mailbox, uid));
        true
    }

    /// Inserts or replaces the record stored under the same key.
    pub fn upsert(&mut self, record: EmailRecord) {
        match self.index.get(&record.key()) {
            Some(&pos) => self.entries[pos] = record,
            None => {
                self.index.insert(record.key(), self.entries.len());
                self.entries.push(record);
            }
        }
    }

    pub fn get(&self, mailbox: &str, uid: Uid) -> Option<&EmailRecord> {
        let pos = *self.index.get(&MessageKey::new(mailbox, uid))?;
        self.entries.get(pos)
    }

    pub fn get_mut(&mut self, mailbox: &str, uid: Uid) -> Option<&mut EmailRecord> {
        let pos = *self.index.get(&MessageKey::new(mailbox, uid))?;
        self.entries.get_mut(pos)
    }

    pub fn contains(&self, key: &MessageKey) -> bool {
        self.index.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EmailRecord> {
        self.entries.iter()
    }

    /// Records whose body has been filled in.
    pub fn with_body_count(&self) -> usize {
        self.entries.iter().filter(|r| r.body.is_some()).count()
    }

    pub fn first(&self) -> Option<&EmailRecord> {
        self.entries.first()
    }

    pub fn keys(&self) -> impl Iterator<Item = MessageKey> + '_ {
        self.entries.iter().map(EmailRecord::key)
    }

    /// UIDs grouped by mailbox, mailboxes in first-seen order.
    pub fn uids_by_mailbox(&self) -> Vec<(String, Vec<Uid>)> {
        let mut groups: Vec<(String, Vec<Uid>)> = Vec::new();
        let mut slot: HashMap<&str, usize> = HashMap::new();
        for record in &self.entries {
            match slot.get(record.mailbox()) {
                Some(&i) => groups[i].1.push(record.uid()),
                None => {
                    slot.insert(record.mailbox(), groups.len());
                    groups.push((record.mailbox().to_string(), vec![record.uid()]));
                }
            }
        }
        groups
    }

    /// Folds another record set in by key.
    pub fn merge(&mut self, other: EmailRecords) {
        for record in other.entries {
            self.upsert(record);
        }
    }

    /// Splits into `shares` disjoint parts whose sizes differ by at most one.
    /// The first `len % shares` parts carry the extra record.
    pub fn split_evenly(self, shares: usize) -> Vec<EmailRecords> {
        let shares = shares.max(1);
        let base = self.entries.len() / shares;
        let remainder = self.entries.len() % shares;

        let mut it = self.entries.into_iter();
        (0..shares)
            .map(|i| {
                let size = base + usize::from(i < remainder);
                it.by_ref().take(size).collect()
            })
            .collect()
    }

    pub fn into_vec(self) -> Vec<EmailRecord> {
        self.entries
    }
}

impl FromIterator<EmailRecord> for EmailRecords {
    fn from_iter<I: IntoIterator<Item = EmailRecord>>(iter: I) -> Self {
        let mut records = EmailRecords::new();
        for record in iter {
            records.upsert(record);
        }
        records
    }
}

impl IntoIterator for EmailRecords {
    type Item = EmailRecord;
    type IntoIter = std::vec::IntoIter<EmailRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
