pub mod body;
pub mod discovery;
pub mod metadata;
pub mod orchestrator;
pub mod progress;
pub mod ranking;
pub mod resolver;

use log::{debug, info};
use std::time::Instant;

use crate::domain::email::EmailRecords;
use crate::error::Result;
use crate::mail::batch::RetryPolicy;
use crate::mail::session::{Connector, SessionGuard};
use body::BodyFetcher;
use discovery::SearchCriteria;
use progress::{CancelFlag, Progress};
use ranking::SortOrder;

/// Everything one fetch run needs besides the connection itself.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub target_mailboxes: Vec<String>,
    pub ignored_mailboxes: Vec<String>,
    pub criteria: SearchCriteria,
    pub batch_size: usize,
    pub max_count: usize,
    pub multi_threaded: bool,
    pub workers: usize,
    pub order: SortOrder,
    pub retry: RetryPolicy,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            target_mailboxes: Vec::new(),
            ignored_mailboxes: Vec::new(),
            criteria: SearchCriteria::default(),
            batch_size: 100,
            max_count: 1000,
            multi_threaded: false,
            workers: 4,
            order: SortOrder::Desc,
            retry: RetryPolicy::default(),
        }
    }
}

fn timed<T>(stage: &str, f: impl FnOnce() -> T) -> T {
    let start = Instant::now();
    let out = f();
    debug!("{stage} took {:.3}s", start.elapsed().as_secs_f64());
    out
}

/// Runs resolve, discovery, metadata, ranking and body fetch.
///
/// The first four stages share one session. In multi-threaded mode that
/// session is logged out before the body workers open their own.
pub fn run_fetch<C: Connector + ?Sized>(
    connector: &C,
    settings: &FetchSettings,
    limit: Option<usize>,
    cancel: &CancelFlag,
) -> Result<EmailRecords> {
    let mut session = SessionGuard::new(connector.connect()?);

    let mailboxes = timed("resolve", || {
        resolver::resolve(
            &mut *session,
            &settings.target_mailboxes,
            &settings.ignored_mailboxes,
        )
    })?;
    info!(
        "searching {} mailboxes: {:?}",
        mailboxes.len(),
        mailboxes.iter().map(|m| m.display()).collect::<Vec<_>>()
    );

    let records = timed("discovery", || {
        discovery::discover(&mut *session, &mailboxes, &settings.criteria)
    })?;
    info!("found {} messages", records.len());

    let records = timed("metadata", || {
        metadata::fetch_metadata(&mut *session, records, settings.batch_size, &settings.retry)
    })?;

    let records = ranking::rank_and_limit(records, settings.order, limit, settings.max_count);
    info!("selected {} messages ({:?})", records.len(), settings.order);

    let progress = Progress::new("bodies", records.len());
    let fetcher = BodyFetcher {
        batch_size: settings.batch_size,
        policy: settings.retry,
        progress: &progress,
        cancel,
    };

    let records = if settings.multi_threaded && settings.workers > 1 {
        drop(session);
        timed("bodies", || {
            orchestrator::fetch_bodies_parallel(connector, records, settings.workers, &fetcher)
        })?
    } else {
        timed("bodies", || fetcher.fetch(&mut *session, records))?
    };
    info!(
        "fetched {} of {} bodies ({} processed)",
        records.with_body_count(),
        records.len(),
        progress.done().min(progress.total())
    );
    Ok(records)
}
