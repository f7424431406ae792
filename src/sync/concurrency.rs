//! Bounded fan-out over a list of work items

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Spawn one task per item and let at most `max_concurrency` of them run `f`
/// at the same time. Returns once every task has finished.
///
/// `f` is expected to handle its own failures. A panicking task is logged and
/// does not stop the others. `max_concurrency` must be at least 1; the range
/// is enforced by config validation, not here.
pub async fn run_bounded<T, I, F, Fut>(items: I, max_concurrency: usize, f: F)
where
    I: IntoIterator<Item = T>,
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let gate = Arc::new(Semaphore::new(max_concurrency));
    let f = Arc::new(f);
    let mut tasks = JoinSet::new();

    for item in items {
        let gate = Arc::clone(&gate);
        let f = Arc::clone(&f);
        tasks.spawn(async move {
            let _permit = gate.acquire_owned().await.ok();
            f(item).await;
        });
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            tracing::error!("sync worker stopped unexpectedly: {}", e);
        }
    }
}
