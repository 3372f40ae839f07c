use chrono::{Days, Local, NaiveDate};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::domain::email::EmailRecords;
use crate::domain::mailbox::MailboxName;
use crate::error::{Error, Result};
use crate::mail::session::MailSession;

/// Named message-state filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchScope {
    All,
    Unseen,
    Seen,
    Answered,
    Unanswered,
    Deleted,
    NotDeleted,
}

impl SearchScope {
    pub fn keyword(self) -> &'static str {
        match self {
            SearchScope::All => "ALL",
            SearchScope::Unseen => "UNSEEN",
            SearchScope::Seen => "SEEN",
            SearchScope::Answered => "ANSWERED",
            SearchScope::Unanswered => "UNANSWERED",
            SearchScope::Deleted => "DELETED",
            SearchScope::NotDeleted => "NOT DELETED",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchCriteria {
    pub since: Option<NaiveDate>,
    pub before: Option<NaiveDate>,
    pub subject: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    /// `Some(true)` = SEEN, `Some(false)` = UNSEEN.
    pub seen: Option<bool>,
    pub scope: Option<SearchScope>,
    /// Raw search keys appended as-is.
    pub custom: Vec<String>,
}

impl SearchCriteria {
    /// `SINCE` today plus `days` (negative reaches back), or no date filter.
    pub fn since_days_ago(days: Option<i64>) -> Self {
        Self {
            since: days.map(|d| offset_date(Local::now().date_naive(), d)),
            ..Self::default()
        }
    }

    /// The UID SEARCH key string; `ALL` when nothing is set.
    pub fn to_query(&self) -> String {
        let mut keys: Vec<String> = Vec::new();
        if let Some(since) = self.since {
            keys.push(format!("SINCE {}", imap_date(since)));
        }
        if let Some(before) = self.before {
            keys.push(format!("BEFORE {}", imap_date(before)));
        }
        for (key, value) in [("SUBJECT", &self.subject), ("FROM", &self.from), ("TO", &self.to)] {
            if let Some(value) = value {
                keys.push(format!("{key} \"{}\"", value.replace('"', "\\\"")));
            }
        }
        match self.seen {
            Some(true) => keys.push(SearchScope::Seen.keyword().into()),
            Some(false) => keys.push(SearchScope::Unseen.keyword().into()),
            None => {}
        }
        if let Some(scope) = self.scope
            && scope != SearchScope::All
        {
            keys.push(scope.keyword().into());
        }
        keys.extend(self.custom.iter().cloned());

        if keys.is_empty() {
            SearchScope::All.keyword().to_string()
        } else {
            keys.join(" ")
        }
    }
}

/// `DD-Mon-YYYY`, as IMAP date search keys expect.
pub fn imap_date(date: NaiveDate) -> String {
    date.format("%d-%b-%Y").to_string()
}

fn offset_date(today: NaiveDate, days: i64) -> NaiveDate {
    let shifted = if days < 0 {
        today.checked_sub_days(Days::new(days.unsigned_abs()))
    } else {
        today.checked_add_days(Days::new(days as u64))
    };
    shifted.unwrap_or(today)
}

/// Searches every mailbox and creates one record per (mailbox, UID).
///
/// Mailboxes that cannot be selected or have no matches are skipped.
pub fn discover<S: MailSession + ?Sized>(
    session: &mut S,
    mailboxes: &[MailboxName],
    criteria: &SearchCriteria,
) -> Result<EmailRecords> {
    let query = criteria.to_query();
    debug!("search criteria: {query}");

    let mut records = EmailRecords::new();
    for mailbox in mailboxes {
        if !session.select_mailbox(mailbox.wire(), true) {
            continue;
        }
        let uids = session
            .search_uids(&query)
            .map_err(|source| Error::Search {
                mailbox: mailbox.display().to_string(),
                criteria: query.clone(),
                source,
            })?;
        if uids.is_empty() {
            warn!("no messages found in mailbox '{mailbox}'");
            continue;
        }
        let mut added = 0;
        for &uid in &uids {
            if records.insert_new(mailbox.wire(), uid) {
                added += 1;
            }
        }
        debug!("mailbox: {mailbox:?}, UIDs: {} ({added} new)", uids.len());
    }
    Ok(records)
}
