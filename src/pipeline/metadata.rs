use log::{debug, warn};

use crate::domain::email::EmailRecords;
use crate::error::Result;
use crate::mail::batch::{METADATA_QUERY, RetryPolicy, batch_fetch, plan_batches};
use crate::mail::decoders::recipient_from_headers;
use crate::mail::session::MailSession;

/// Fills in `received_at` and `recipient` for every record, one batch at
/// a time. Items that cannot be matched to a record are skipped.
pub fn fetch_metadata<S: MailSession + ?Sized>(
    session: &mut S,
    mut records: EmailRecords,
    batch_size: usize,
    policy: &RetryPolicy,
) -> Result<EmailRecords> {
    for batch in plan_batches(&records, batch_size) {
        let outcome = batch_fetch(session, &batch, METADATA_QUERY, policy)?;
        for (uid, item) in outcome.items {
            let Some(record) = records.get_mut(&batch.mailbox, uid) else {
                warn!("no record for '{}', UID {uid}", batch.mailbox);
                continue;
            };
            if item.internal_date.is_none() {
                debug!("no usable INTERNALDATE for '{}', UID {uid}", batch.mailbox);
            }
            record.received_at = item.internal_date;
            record.recipient = item.header.as_deref().and_then(recipient_from_headers);
        }
    }

    if let Some(first) = records.first() {
        debug!(
            "(first record) mailbox: {} / UID: {} / received: {} / to: {:?}",
            first.mailbox(),
            first.uid(),
            first.received_at_text("%Y-%m-%d %H:%M"),
            first.recipient
        );
    }
    Ok(records)
}
