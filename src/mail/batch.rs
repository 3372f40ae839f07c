use log::{debug, warn};
use std::collections::{BTreeSet, HashMap};
use std::thread;
use std::time::Duration;

use crate::domain::email::{EmailRecords, Uid};
use crate::error::{Error, Result};
use crate::mail::response::FetchedItem;
use crate::mail::session::MailSession;

/// Recipient header plus the server's received timestamp.
pub const METADATA_QUERY: &str = "(BODY.PEEK[HEADER.FIELDS (TO)] INTERNALDATE)";
/// The whole raw message.
pub const FULL_MESSAGE_QUERY: &str = "(RFC822)";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    pub delay: Duration,
    /// Fraction of a batch that may stay unfetched before the batch is
    /// treated as failed. 1.0 never fails on partial loss.
    pub max_missing_ratio: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            delay: Duration::from_secs(1),
            max_missing_ratio: 1.0,
        }
    }
}

/// UIDs of one mailbox fetched in a single round-trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchBatch {
    pub mailbox: String,
    pub uids: Vec<Uid>,
}

/// Cuts the record set into per-mailbox batches of at most `size` UIDs.
pub fn plan_batches(records: &EmailRecords, size: usize) -> Vec<FetchBatch> {
    let size = size.max(1);
    records
        .uids_by_mailbox()
        .into_iter()
        .flat_map(|(mailbox, uids)| {
            uids.chunks(size)
                .map(|chunk| FetchBatch {
                    mailbox: mailbox.clone(),
                    uids: chunk.to_vec(),
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub items: HashMap<Uid, FetchedItem>,
    /// UIDs still unanswered after the last attempt.
    pub missing: Vec<Uid>,
}

pub fn ensure_parentheses(query: &str) -> String {
    let query = query.trim();
    if query.starts_with('(') && query.ends_with(')') {
        query.to_string()
    } else {
        format!("({query})")
    }
}

fn uid_set(uids: &BTreeSet<Uid>) -> String {
    uids.iter()
        .map(Uid::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Fetches `batch`, re-requesting only the UIDs not yet answered.
///
/// Each attempt is one UID FETCH for the outstanding set. Items the server
/// sends for UIDs outside that set are dropped. Between attempts the
/// calling thread sleeps for `policy.delay`.
///
/// If the final attempt is rejected by the server the whole batch fails
/// with [`Error::Fetch`]. If it succeeds but some UIDs never arrived, the
/// partial result is returned with `missing` set and a warning logged,
/// unless the missing share exceeds `policy.max_missing_ratio`.
///
/// A mailbox that cannot be selected yields an empty outcome.
pub fn batch_fetch<S: MailSession + ?Sized>(
    session: &mut S,
    batch: &FetchBatch,
    query: &str,
    policy: &RetryPolicy,
) -> Result<BatchOutcome> {
    let mut outcome = BatchOutcome::default();
    if batch.uids.is_empty() || !session.select_mailbox(&batch.mailbox, true) {
        return Ok(outcome);
    }

    let query = ensure_parentheses(query);
    let mut outstanding: BTreeSet<Uid> = batch.uids.iter().copied().collect();
    let requested = outstanding.len();

    for attempt in 0..=policy.max_retries {
        let uids = uid_set(&outstanding);
        match session.uid_fetch(&uids, &query) {
            Ok(fetched) => {
                for item in fetched {
                    let Some(uid) = item.uid else {
                        debug!("dropping fetch item without UID");
                        continue;
                    };
                    if !outstanding.remove(&uid) {
                        debug!("dropping unrequested UID {uid} from '{}'", batch.mailbox);
                        continue;
                    }
                    outcome.items.insert(uid, item);
                }
            }
            Err(source) if attempt == policy.max_retries => {
                return Err(Error::Fetch {
                    mailbox: batch.mailbox.clone(),
                    uids,
                    source,
                });
            }
            Err(e) => {
                warn!(
                    "fetch attempt {} of {} failed in '{}': {e}",
                    attempt + 1,
                    policy.max_retries + 1,
                    batch.mailbox
                );
            }
        }

        if outstanding.is_empty() {
            break;
        }
        if attempt < policy.max_retries {
            debug!(
                "{} UIDs outstanding in '{}', retrying in {:?}",
                outstanding.len(),
                batch.mailbox,
                policy.delay
            );
            thread::sleep(policy.delay);
        }
    }

    outcome.missing = outstanding.into_iter().collect();
    if !outcome.missing.is_empty() {
        warn!(
            "some UIDs could not be fetched from '{}': {:?}",
            batch.mailbox, outcome.missing
        );
        let ratio = outcome.missing.len() as f64 / requested as f64;
        if ratio > policy.max_missing_ratio {
            return Err(Error::TooManyMissing {
                mailbox: batch.mailbox.clone(),
                requested,
                missing: outcome.missing,
            });
        }
    }
    Ok(outcome)
}
