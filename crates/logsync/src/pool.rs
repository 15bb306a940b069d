//! Bounded fan-out of streams to [`EventFetcher`]s.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Result, SyncError};
use crate::fetcher::EventFetcher;
use crate::types::{StreamDescriptor, Window};

/// Runs fetchers over a queue of streams with at most `max_workers` in flight.
///
/// The worker count is sized for the single-writer store, not the remote
/// quota: the rate limiters gate remote calls on their own.
#[derive(Clone)]
pub struct WorkerPool {
    fetcher: EventFetcher,
    max_workers: usize,
}

impl WorkerPool {
    /// Creates a pool. A `max_workers` of zero is treated as one.
    #[must_use]
    pub fn new(fetcher: EventFetcher, max_workers: usize) -> Self {
        Self {
            fetcher,
            max_workers: max_workers.max(1),
        }
    }

    /// Maximum concurrent fetches.
    #[must_use]
    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Fetches every stream of `group`, returning the first failure.
    ///
    /// A failure cancels the remaining work, and every worker has finished
    /// before this returns. Failures after the first are logged.
    ///
    /// # Errors
    ///
    /// Returns the first worker error, [`SyncError::Cancelled`] if `cancel`
    /// fires, or [`SyncError::Worker`] if a worker task dies.
    pub async fn run(
        &self,
        cancel: &CancellationToken,
        group: &str,
        window: &Window,
        streams: Vec<StreamDescriptor>,
    ) -> Result<()> {
        if streams.is_empty() {
            return Ok(());
        }

        let workers = self.max_workers.min(streams.len());
        let queue = Arc::new(Mutex::new(VecDeque::from(streams)));
        let group: Arc<str> = Arc::from(group);
        let token = cancel.child_token();
        let mut tasks = JoinSet::new();

        debug!(group = %group, workers, "starting fetch workers");
        for worker in 0..workers {
            let queue = Arc::clone(&queue);
            let group = Arc::clone(&group);
            let token = token.clone();
            let fetcher = self.fetcher.clone();
            let window = *window;
            tasks.spawn(async move {
                loop {
                    if token.is_cancelled() {
                        return Err(SyncError::Cancelled);
                    }
                    let next = queue.lock().pop_front();
                    let Some(stream) = next else {
                        debug!(worker, "queue drained");
                        return Ok(());
                    };
                    debug!(worker, stream = %stream.name, "fetching stream");
                    fetcher.fetch(&token, &group, &stream.name, &window).await?;
                }
            });
        }

        let mut first: Option<SyncError> = None;
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined
                .map_err(|e| SyncError::Worker(e.to_string()))
                .and_then(|res| res);
            let Err(err) = outcome else {
                continue;
            };
            if first.is_none() {
                token.cancel();
                first = Some(err);
            } else if !err.is_cancelled() {
                warn!(group = %group, error = %err, "worker failed after the first error");
            }
        }

        if let Some(err) = first {
            return Err(err);
        }
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::config::RetryPolicy;
    use crate::progress::SyncCounters;
    use crate::rate_limit::RateLimiter;
    use crate::sink::RecordSink;
    use crate::store::MemoryStore;
    use crate::testing::{EventScript, FakeApi, at, envelope};
    use crate::traits::RecordStore;
    use crate::types::RawEvent;

    fn one_page(pod: &str) -> EventScript {
        EventScript::Pages(vec![vec![RawEvent::new(1_000, envelope(pod, "line"))]])
    }

    fn pool(
        api: &Arc<FakeApi>,
        store: &Arc<MemoryStore>,
        max_workers: usize,
    ) -> (WorkerPool, Arc<SyncCounters>) {
        let counters = Arc::new(SyncCounters::new());
        let fetcher = EventFetcher::new(
            api.clone(),
            Arc::new(RateLimiter::per_second("events", 10_000)),
            RecordSink::new(store.clone(), RetryPolicy::default()),
            counters.clone(),
            "prod",
            100,
        );
        (WorkerPool::new(fetcher, max_workers), counters)
    }

    fn streams(names: &[&str]) -> Vec<StreamDescriptor> {
        names.iter().map(|n| StreamDescriptor::new(*n, at(100))).collect()
    }

    fn window() -> Window {
        Window::new(at(0), at(1_000)).unwrap()
    }

    #[tokio::test]
    async fn drains_every_stream() {
        let mut api = FakeApi::new();
        for name in ["s1", "s2", "s3", "s4", "s5"] {
            api = api.with_events(name, one_page(name));
        }
        let api = Arc::new(api);
        let store = Arc::new(MemoryStore::new());
        let (pool, counters) = pool(&api, &store, 3);
        let token = CancellationToken::new();

        pool.run(&token, "app", &window(), streams(&["s1", "s2", "s3", "s4", "s5"]))
            .await
            .unwrap();

        assert_eq!(store.len().unwrap(), 5);
        assert_eq!(counters.snapshot().streams_scanned, 5);
    }

    #[tokio::test]
    async fn concurrency_never_exceeds_bound() {
        let mut api = FakeApi::new().with_event_delay(Duration::from_millis(10));
        let names = ["s1", "s2", "s3", "s4", "s5", "s6", "s7"];
        for name in names {
            api = api.with_events(name, one_page(name));
        }
        let api = Arc::new(api);
        let store = Arc::new(MemoryStore::new());
        let (pool, _) = pool(&api, &store, 3);
        let token = CancellationToken::new();

        pool.run(&token, "app", &window(), streams(&names)).await.unwrap();

        assert!(api.max_in_flight() <= 3, "saw {} in flight", api.max_in_flight());
        assert_eq!(store.len().unwrap(), names.len());
    }

    #[tokio::test]
    async fn first_error_wins_and_nothing_keeps_running() {
        let mut api = FakeApi::new().with_event_delay(Duration::from_millis(5));
        for name in ["s1", "s2", "s4", "s5"] {
            api = api.with_events(name, EventScript::Endless);
        }
        let api = Arc::new(
            api.with_events("s3", EventScript::Fail("connection reset".to_string())),
        );
        let store = Arc::new(MemoryStore::new());
        let counters = Arc::new(SyncCounters::new());
        let fetcher = EventFetcher::new(
            api.clone(),
            Arc::new(RateLimiter::per_second("events", 10_000)),
            RecordSink::new(store.clone(), RetryPolicy::default()),
            counters,
            "prod",
            usize::MAX,
        );
        let pool = WorkerPool::new(fetcher, 3);
        let token = CancellationToken::new();

        let err = pool
            .run(&token, "app", &window(), streams(&["s1", "s2", "s3", "s4", "s5"]))
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Api(_)), "unexpected error: {err}");
        assert_eq!(api.in_flight(), 0);
        // The caller's token is untouched by an internal failure.
        assert!(!token.is_cancelled());

        let calls_after = api.event_calls("s1") + api.event_calls("s2");
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(api.event_calls("s1") + api.event_calls("s2"), calls_after);
    }

    #[tokio::test]
    async fn parent_cancellation_returns_cancelled() {
        let api = Arc::new(
            FakeApi::new()
                .with_event_delay(Duration::from_millis(5))
                .with_events("s1", EventScript::Endless)
                .with_events("s2", EventScript::Endless),
        );
        let store = Arc::new(MemoryStore::new());
        let counters = Arc::new(SyncCounters::new());
        let fetcher = EventFetcher::new(
            api.clone(),
            Arc::new(RateLimiter::per_second("events", 10_000)),
            RecordSink::new(store.clone(), RetryPolicy::default()),
            counters,
            "prod",
            usize::MAX,
        );
        let pool = WorkerPool::new(fetcher, 1);
        let token = CancellationToken::new();

        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(40)).await;
                token.cancel();
            })
        };

        let err = tokio::time::timeout(
            Duration::from_secs(5),
            pool.run(&token, "app", &window(), streams(&["s1", "s2"])),
        )
        .await
        .unwrap()
        .unwrap_err();
        canceller.await.unwrap();

        assert!(err.is_cancelled());
        assert_eq!(api.in_flight(), 0);
        // One worker: the second stream was never started.
        assert_eq!(api.event_calls("s2"), 0);
    }

    #[tokio::test]
    async fn empty_stream_list_is_a_no_op() {
        let api = Arc::new(FakeApi::new());
        let store = Arc::new(MemoryStore::new());
        let (pool, _) = pool(&api, &store, 3);
        let token = CancellationToken::new();
        pool.run(&token, "app", &window(), Vec::new()).await.unwrap();
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn zero_workers_is_clamped() {
        let api = Arc::new(FakeApi::new());
        let store = Arc::new(MemoryStore::new());
        let (pool, _) = pool(&api, &store, 0);
        assert_eq!(pool.max_workers(), 1);
    }
}
