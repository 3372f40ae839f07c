use log::{debug, info, warn};

use crate::domain::email::EmailRecords;
use crate::error::Result;
use crate::mail::batch::{FULL_MESSAGE_QUERY, RetryPolicy, batch_fetch, plan_batches};
use crate::mail::decoders::{extract_subject_and_body, format_size, preview};
use crate::mail::session::MailSession;
use crate::pipeline::progress::{CancelFlag, Progress};

const PREVIEW_LENGTH: usize = 20;

/// Settings shared by every body worker of a run.
#[derive(Debug, Clone, Copy)]
pub struct BodyFetcher<'a> {
    pub batch_size: usize,
    pub policy: RetryPolicy,
    pub progress: &'a Progress,
    pub cancel: &'a CancelFlag,
}

impl BodyFetcher<'_> {
    /// Downloads full messages for `records` on one session and fills in
    /// subject and body. When cancelled, stops before the next batch and
    /// returns what was fetched so far.
    pub fn fetch<S: MailSession + ?Sized>(
        &self,
        session: &mut S,
        mut records: EmailRecords,
    ) -> Result<EmailRecords> {
        let total = records.len();
        if total == 0 {
            warn!("no messages to fetch");
            return Ok(records);
        }

        let mut total_size = 0usize;
        let mut fetched = 0usize;
        for batch in plan_batches(&records, self.batch_size) {
            if self.cancel.is_cancelled() {
                info!("cancelled, keeping {fetched} of {total} bodies fetched so far");
                break;
            }

            let outcome = batch_fetch(session, &batch, FULL_MESSAGE_QUERY, &self.policy)?;
            self.progress.advance(outcome.missing.len());
            for (uid, item) in outcome.items {
                self.progress.advance(1);
                total_size += item.size();
                let Some(record) = records.get_mut(&batch.mailbox, uid) else {
                    warn!("no record for '{}', UID {uid}", batch.mailbox);
                    continue;
                };
                let Some(raw) = item.body.as_deref() else {
                    warn!("no message body returned for '{}', UID {uid}", batch.mailbox);
                    continue;
                };
                let (subject, body) = extract_subject_and_body(raw);
                record.subject = Some(subject);
                record.body = Some(body);
                fetched += 1;
            }
        }

        if let Some(first) = records.first() {
            debug!(
                "(first record) mailbox: {} / UID: {} / subject: {:?} / body: {:?}",
                first.mailbox(),
                first.uid(),
                preview(first.subject.as_deref(), PREVIEW_LENGTH),
                preview(first.body.as_deref(), PREVIEW_LENGTH)
            );
        }
        debug!(
            "records: {total} / fetched: {fetched} / total size: {} / average size: {}",
            format_size(total_size),
            format_size(total_size / fetched.max(1))
        );
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::mock::{FetchStep, MockMessage, MockServer};
    use std::time::Duration;

    fn server() -> MockServer {
        MockServer::default().with_mailbox(
            "INBOX",
            (1..=4)
                .map(|uid| MockMessage::new(uid, None, "a@b.c", &format!("subject {uid}"), &format!("body {uid}")))
                .collect(),
        )
    }

    fn records(uids: &[u32]) -> EmailRecords {
        let mut records = EmailRecords::new();
        for &uid in uids {
            records.insert_new("INBOX", uid);
        }
        records
    }

    fn fetcher<'a>(progress: &'a Progress, cancel: &'a CancelFlag) -> BodyFetcher<'a> {
        BodyFetcher {
            batch_size: 2,
            policy: RetryPolicy {
                max_retries: 1,
                delay: Duration::ZERO,
                max_missing_ratio: 1.0,
            },
            progress,
            cancel,
        }
    }

    #[test]
    fn fills_subject_and_body() {
        let mut session = server().session();
        let progress = Progress::new("bodies", 3);
        let cancel = CancelFlag::default();

        let out = fetcher(&progress, &cancel)
            .fetch(&mut session, records(&[1, 2, 3]))
            .unwrap();

        for uid in 1..=3 {
            let r = out.get("INBOX", uid).unwrap();
            assert_eq!(r.subject.as_deref(), Some(format!("subject {uid}").as_str()));
            assert_eq!(r.body.as_deref().map(str::trim), Some(format!("body {uid}").as_str()));
        }
        assert_eq!(progress.done(), 3);
    }

    #[test]
    fn partial_batches_leave_missing_records_untouched() {
        let only = FetchStep::Only(vec![1]);
        let mut session = server().with_script(vec![only.clone(), only]).session();
        let progress = Progress::new("bodies", 2);
        let cancel = CancelFlag::default();

        let out = fetcher(&progress, &cancel)
            .fetch(&mut session, records(&[1, 2]))
            .unwrap();

        assert!(out.get("INBOX", 1).unwrap().body.is_some());
        assert!(out.get("INBOX", 2).unwrap().body.is_none());
        assert_eq!(out.len(), 2);
        assert_eq!(progress.done(), 2);
    }

    #[test]
    fn cancellation_returns_records_unchanged() {
        let mut session = server().session();
        let progress = Progress::new("bodies", 4);
        let cancel = CancelFlag::default();
        cancel.cancel();

        let out = fetcher(&progress, &cancel)
            .fetch(&mut session, records(&[1, 2, 3, 4]))
            .unwrap();

        assert_eq!(out.len(), 4);
        assert!(out.iter().all(|r| r.body.is_none()));
        assert!(session.fetch_calls().is_empty());
    }
}
