use log::{error, info, warn};
use std::thread;

use crate::domain::email::EmailRecords;
use crate::error::{Error, Result};
use crate::mail::session::{Connector, with_session};
use crate::pipeline::body::BodyFetcher;

/// Splits `records` into `workers` even shares and fetches each share on
/// its own thread and session. Finished shares are merged back by key.
///
/// Every worker runs to completion; if any of them failed, the first
/// error is returned after the others have been joined.
pub fn fetch_bodies_parallel<C: Connector + ?Sized>(
    connector: &C,
    records: EmailRecords,
    workers: usize,
    fetcher: &BodyFetcher<'_>,
) -> Result<EmailRecords> {
    if records.is_empty() {
        warn!("no messages to fetch");
        return Ok(records);
    }

    let mut merged = records.clone();
    let shares = records.split_evenly(workers);
    info!(
        "fetching {} bodies with {} workers (shares: {:?})",
        merged.len(),
        shares.len(),
        shares.iter().map(EmailRecords::len).collect::<Vec<_>>()
    );

    let results = thread::scope(|scope| {
        let mut handles = Vec::with_capacity(shares.len());
        for (i, share) in shares.into_iter().enumerate() {
            if share.is_empty() {
                continue;
            }
            let handle = thread::Builder::new()
                .name(format!("body-worker-{i}"))
                .spawn_scoped(scope, move || {
                    with_session(connector, |session| fetcher.fetch(session, share))
                })?;
            handles.push((i, handle));
        }

        Ok::<_, Error>(
            handles
                .into_iter()
                .map(|(i, handle)| (i, handle.join()))
                .collect::<Vec<_>>(),
        )
    })?;

    let mut first_error = None;
    for (i, joined) in results {
        match joined {
            Ok(Ok(part)) => merged.merge(part),
            Ok(Err(e)) => {
                error!("body worker {i} failed: {e}");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
            Err(_) => {
                error!("body worker {i} panicked");
                if first_error.is_none() {
                    first_error = Some(Error::WorkerPanicked(i));
                }
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(merged),
    }
}
