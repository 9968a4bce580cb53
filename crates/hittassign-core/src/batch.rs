//! Bounded, fail-aware batches of tasks.
//!
//! Sibling statements and the iterations of a `foreach` run as a batch: at
//! most `limit` members are in flight at once, members are admitted in order,
//! and the first failure stops admission. Members already running are left to
//! finish and their outcomes are discarded.

use std::future::Future;
use std::num::NonZeroUsize;

use tokio::task::{JoinError, JoinSet};
use tracing::debug;

use crate::error::RuntimeError;

/// Runs `spawn(item)` for every item with at most `limit` tasks in flight.
///
/// Returns the first failure observed, or `Ok(())` once every item has run.
pub async fn run_bounded<T, F, Fut>(
    items: impl IntoIterator<Item = T>,
    limit: NonZeroUsize,
    mut spawn: F,
) -> Result<(), RuntimeError>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<(), RuntimeError>> + Send + 'static,
{
    let mut in_flight = JoinSet::new();
    let mut failure: Option<RuntimeError> = None;

    for (index, item) in items.into_iter().enumerate() {
        while in_flight.len() >= limit.get() {
            if let Some(joined) = in_flight.join_next().await {
                record(&mut failure, joined);
            }
        }
        // Members that finished while we waited may include a failure.
        while let Some(joined) = in_flight.try_join_next() {
            record(&mut failure, joined);
        }
        if failure.is_some() {
            debug!(admitted = index, "batch member failed, not admitting further items");
            break;
        }
        in_flight.spawn(spawn(item));
    }

    while let Some(joined) = in_flight.join_next().await {
        record(&mut failure, joined);
    }

    failure.map_or(Ok(()), Err)
}

/// Keeps the first failure; later ones are dropped.
fn record(failure: &mut Option<RuntimeError>, joined: Result<Result<(), RuntimeError>, JoinError>) {
    let outcome = joined.unwrap_or_else(|e| Err(RuntimeError::TaskPanicked(e.to_string())));
    if let Err(e) = outcome {
        failure.get_or_insert(e);
    }
}
