use clap::ValueEnum;
use log::{debug, warn};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::domain::email::EmailRecords;

/// Ordering by received date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[serde(alias = "ascending")]
    #[value(alias = "ascending")]
    Asc,
    #[default]
    #[serde(alias = "descending")]
    #[value(alias = "descending")]
    Desc,
    #[serde(alias = "random")]
    #[value(alias = "random")]
    Rand,
}

/// How many records to keep: `min(available, requested, max_count)`, with
/// an absent request meaning `max_count`.
pub fn effective_limit(available: usize, requested: Option<usize>, max_count: usize) -> usize {
    let requested = requested.unwrap_or(max_count);
    let limit = available.min(requested).min(max_count);
    if limit == max_count && (available > max_count || requested > max_count) {
        warn!(
            "message count capped at the system maximum of {max_count} \
             (available: {available}, requested: {requested})"
        );
    }
    limit
}

/// Orders the records and keeps the first `effective_limit` of them.
/// Records without a received date count as the oldest.
pub fn rank_and_limit(
    records: EmailRecords,
    order: SortOrder,
    requested: Option<usize>,
    max_count: usize,
) -> EmailRecords {
    let limit = effective_limit(records.len(), requested, max_count);
    let mut items = records.into_vec();
    match order {
        SortOrder::Asc => items.sort_by(|a, b| a.received_at.cmp(&b.received_at)),
        SortOrder::Desc => items.sort_by(|a, b| b.received_at.cmp(&a.received_at)),
        SortOrder::Rand => items.shuffle(&mut rand::thread_rng()),
    }
    items.truncate(limit);
    debug!("order: {order:?} / limit: {limit}");
    items.into_iter().collect()
}
