//! Bounded-concurrency runner used for both reconciliation phases.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Run `worker` over every item with at most `limit` invocations in flight.
///
/// A fixed set of runners races for the next unclaimed index through a shared
/// cursor, so each item is claimed exactly once but completion order is
/// unspecified. The first worker error resolves the whole call with that
/// error; items already claimed by other runners may still have completed by
/// then. Empty input resolves immediately without invoking the worker.
pub async fn run_with_concurrency<'a, T, E, F, Fut>(
    items: &'a [T],
    limit: usize,
    worker: F,
) -> Result<(), E>
where
    F: Fn(&'a T) -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    if items.is_empty() {
        return Ok(());
    }

    let cursor = AtomicUsize::new(0);
    let cursor = &cursor;
    let worker = &worker;
    let runner_count = limit.max(1).min(items.len());

    let runners = (0..runner_count).map(|_| async move {
        loop {
            let claimed = cursor.fetch_add(1, Ordering::SeqCst);
            match items.get(claimed) {
                Some(item) => worker(item).await?,
                None => break,
            }
        }
        Ok(())
    });

    futures::future::try_join_all(runners).await.map(|_| ())
}
