//! Retrying async facade over a [`RecordStore`].
//!
//! The local store admits one writer at a time, so concurrent fetchers can be
//! turned away with [`StorageError::Busy`]. [`RecordSink`] retries those
//! failures with exponential backoff; any other failure is returned at once.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::RetryPolicy;
use crate::error::{StorageError, StorageResult};
use crate::traits::{PurgeFilter, RecordStore};
use crate::types::{LogQuery, LogRecord, Window};

/// Async, retrying handle to a record store. Cheap to clone.
#[derive(Clone)]
pub struct RecordSink {
    store: Arc<dyn RecordStore>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for RecordSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordSink")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl RecordSink {
    /// Wraps `store` with the given retry policy.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// The wrapped backend.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Persists one record.
    pub async fn add_log(
        &self,
        cancel: &CancellationToken,
        record: LogRecord,
    ) -> StorageResult<()> {
        self.with_retry(cancel, "insert", move |store| store.insert(&record))
            .await
    }

    /// Reads the records matching `query`, in backend order.
    pub async fn query(
        &self,
        cancel: &CancellationToken,
        query: LogQuery,
    ) -> StorageResult<Vec<LogRecord>> {
        self.with_retry(cancel, "query", move |store| store.query(&query))
            .await
    }

    /// Deletes every record.
    pub async fn purge_all(&self, cancel: &CancellationToken) -> StorageResult<u64> {
        self.with_retry(cancel, "purge_all", |store| store.purge_all())
            .await
    }

    /// Deletes the records of matching pods inside `window`.
    pub async fn purge_window(
        &self,
        cancel: &CancellationToken,
        profile: &str,
        group: &str,
        pod: &str,
        window: Window,
    ) -> StorageResult<u64> {
        let filter = PurgeFilter {
            profile: profile.to_string(),
            group: group.to_string(),
            pod: pod.to_string(),
            window: Some(window),
        };
        self.with_retry(cancel, "purge_window", move |store| store.purge(&filter))
            .await
    }

    /// Deletes every record of matching pods, whatever their time.
    pub async fn purge_pod(
        &self,
        cancel: &CancellationToken,
        profile: &str,
        group: &str,
        pod: &str,
    ) -> StorageResult<u64> {
        let filter = PurgeFilter {
            profile: profile.to_string(),
            group: group.to_string(),
            pod: pod.to_string(),
            window: None,
        };
        self.with_retry(cancel, "purge_pod", move |store| store.purge(&filter))
            .await
    }

    /// Makes accepted writes durable. Not retried and not cancellable.
    pub async fn flush(&self) -> StorageResult<()> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.flush())
            .await
            .map_err(|e| StorageError::Backend(format!("storage task failed: {e}")))?
    }

    /// Runs `op` on the blocking pool, retrying contention with backoff.
    async fn with_retry<T, F>(
        &self,
        cancel: &CancellationToken,
        op_name: &'static str,
        op: F,
    ) -> StorageResult<T>
    where
        F: Fn(&dyn RecordStore) -> StorageResult<T> + Send + Sync + 'static,
        T: Send + 'static,
    {
        let op = Arc::new(op);
        let mut attempt = 0u32;
        loop {
            let store = Arc::clone(&self.store);
            let call = Arc::clone(&op);
            let result = tokio::task::spawn_blocking(move || call(store.as_ref()))
                .await
                .map_err(|e| StorageError::Backend(format!("storage task failed: {e}")))?;

            match result {
                Ok(value) => return Ok(value),
                Err(err) if err.is_busy() => {
                    attempt += 1;
                    if attempt >= self.retry.max_attempts {
                        return Err(StorageError::Exhausted {
                            attempts: attempt,
                            source: Box::new(err),
                        });
                    }
                    let delay = self.retry.delay_for(attempt - 1);
                    debug!(
                        op = op_name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "store busy, backing off"
                    );
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => return Err(StorageError::Cancelled),
                        () = tokio::time::sleep(delay) => {}
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }
}
