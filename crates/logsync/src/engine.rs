//! The invocation boundary: one [`LogSync`] per process.
//!
//! [`LogSync`] wires the rate budget, discovery, the worker pool and the
//! record sink together from a [`SyncConfig`]. Every sync flushes the store
//! before returning, whether it succeeded, failed or was cancelled.

use std::sync::Arc;

use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::discovery::StreamDiscovery;
use crate::error::{Result, SyncError};
use crate::fetcher::EventFetcher;
use crate::pagination::PaginatedLister;
use crate::pool::WorkerPool;
use crate::progress::{NoopProgress, ProgressSink, SyncCounters, Tee};
use crate::query::QueryEngine;
use crate::rate_limit::RateBudget;
use crate::sink::RecordSink;
use crate::traits::{LogApi, RecordStore};
use crate::types::{LogQuery, LogRecord, SyncReport, SyncRequest, Window};

/// Container Insights application log groups.
const APPLICATION_GROUP_PATTERN: &str = r"^/aws/containerinsights/.+/application$";

/// Synchronizes remote log groups into a local store and answers queries.
pub struct LogSync {
    config: SyncConfig,
    api: Arc<dyn LogApi>,
    budget: RateBudget,
    sink: RecordSink,
    discovery: StreamDiscovery,
    query: QueryEngine,
    application_group: Regex,
}

impl LogSync {
    /// Builds an engine over `api` and `store`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] if `config` does not validate.
    pub fn new(
        config: SyncConfig,
        api: Arc<dyn LogApi>,
        store: Arc<dyn RecordStore>,
    ) -> Result<Self> {
        config.validate()?;
        let application_group = Regex::new(APPLICATION_GROUP_PATTERN)
            .map_err(|e| SyncError::InvalidConfig(format!("application group pattern: {e}")))?;

        let budget = RateBudget::from_config(&config);
        let sink = RecordSink::new(store, config.retry);
        let lister = PaginatedLister::from_config(Arc::clone(&budget.listing), &config);
        let discovery = StreamDiscovery::new(Arc::clone(&api), lister);
        let query = QueryEngine::new(sink.clone());

        Ok(Self {
            config,
            api,
            budget,
            sink,
            discovery,
            query,
            application_group,
        })
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// The retrying store handle.
    #[must_use]
    pub fn sink(&self) -> &RecordSink {
        &self.sink
    }

    /// Read access to persisted records.
    #[must_use]
    pub fn query_engine(&self) -> &QueryEngine {
        &self.query
    }

    /// Synchronizes one group. See [`LogSync::sync_with_progress`].
    pub async fn sync(
        &self,
        cancel: &CancellationToken,
        request: &SyncRequest,
    ) -> Result<SyncReport> {
        self.sync_with_progress(cancel, request, Arc::new(NoopProgress))
            .await
    }

    /// Discovers the matching streams of the requested group and stores
    /// their events inside the window, reporting to `progress` as it goes.
    ///
    /// Records written before a failure stay in the store.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error: a missing group, a listing or fetch
    /// failure, storage failure, the depth cap, or cancellation.
    pub async fn sync_with_progress(
        &self,
        cancel: &CancellationToken,
        request: &SyncRequest,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<SyncReport> {
        info!(
            profile = %request.profile,
            group = %request.group,
            filter = %request.stream_filter,
            start = %request.window.start(),
            end = %request.window.end(),
            "sync started"
        );
        let counters = Arc::new(SyncCounters::new());
        let progress: Arc<dyn ProgressSink> = Arc::new(Tee {
            first: counters.clone(),
            second: progress,
        });

        let outcome = self.run(cancel, request, progress).await;
        let flushed = self.sink.flush().await;

        match outcome {
            Ok(()) => {
                flushed?;
                let report = counters.snapshot();
                info!(
                    group = %request.group,
                    streams = report.streams_scanned,
                    saved = report.records_saved,
                    skipped = report.records_skipped,
                    "sync finished"
                );
                Ok(report)
            }
            Err(err) => {
                if let Err(flush_err) = flushed {
                    warn!(error = %flush_err, "flush after failed sync also failed");
                }
                info!(group = %request.group, error = %err, "sync stopped");
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        cancel: &CancellationToken,
        request: &SyncRequest,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<()> {
        let streams = self
            .discovery
            .find(
                cancel,
                &request.group,
                &request.stream_filter,
                &request.window,
                progress.as_ref(),
            )
            .await?;
        if streams.is_empty() {
            debug!(group = %request.group, "no streams to fetch");
            return Ok(());
        }

        let fetcher = EventFetcher::new(
            Arc::clone(&self.api),
            Arc::clone(&self.budget.events),
            self.sink.clone(),
            progress,
            request.profile.clone(),
            self.config.max_pagination_depth,
        );
        WorkerPool::new(fetcher, self.config.max_workers)
            .run(cancel, &request.group, &request.window, streams)
            .await
    }

    /// Every group name visible to the API.
    pub async fn list_groups(&self, cancel: &CancellationToken) -> Result<Vec<String>> {
        self.discovery.list_groups(cancel).await
    }

    /// The only Container Insights application group, if exactly one exists.
    pub async fn find_group_auto(&self, cancel: &CancellationToken) -> Result<Option<String>> {
        let mut candidates: Vec<String> = self
            .list_groups(cancel)
            .await?
            .into_iter()
            .filter(|g| self.application_group.is_match(g))
            .collect();
        if candidates.len() == 1 {
            Ok(candidates.pop())
        } else {
            debug!(candidates = candidates.len(), "no unique application group");
            Ok(None)
        }
    }

    /// Stored records matching `query`, oldest first.
    pub async fn query(
        &self,
        cancel: &CancellationToken,
        query: LogQuery,
    ) -> Result<Vec<LogRecord>> {
        self.query.query(cancel, query).await
    }

    /// Deletes every stored record.
    pub async fn purge_all(&self, cancel: &CancellationToken) -> Result<u64> {
        let removed = self.sink.purge_all(cancel).await?;
        info!(removed, "purged all records");
        Ok(removed)
    }

    /// Deletes the records of matching pods inside `window`.
    pub async fn purge_window(
        &self,
        cancel: &CancellationToken,
        profile: &str,
        group: &str,
        pod: &str,
        window: Window,
    ) -> Result<u64> {
        let removed = self
            .sink
            .purge_window(cancel, profile, group, pod, window)
            .await?;
        info!(profile, group, pod, removed, "purged records in window");
        Ok(removed)
    }

    /// Deletes every record of matching pods.
    pub async fn purge_pod(
        &self,
        cancel: &CancellationToken,
        profile: &str,
        group: &str,
        pod: &str,
    ) -> Result<u64> {
        let removed = self.sink.purge_pod(cancel, profile, group, pod).await?;
        info!(profile, group, pod, removed, "purged pod records");
        Ok(removed)
    }
}
