//! Per-stream event retrieval.
//!
//! Events are read oldest first inside the window, page by page, each page
//! admitted by the event rate limiter. Every event is parsed and handed to the
//! [`RecordSink`]; a malformed event is logged and skipped.

use std::collections::HashSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::envelope;
use crate::error::{Result, SyncError};
use crate::progress::ProgressSink;
use crate::rate_limit::RateLimiter;
use crate::sink::RecordSink;
use crate::traits::LogApi;
use crate::types::Window;

/// Counts for one fetched stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// Pages requested
    pub pages: usize,
    /// Records persisted
    pub saved: u64,
    /// Malformed events skipped
    pub skipped: u64,
}

/// Fetches and persists the events of one stream. Cheap to clone.
#[derive(Clone)]
pub struct EventFetcher {
    api: Arc<dyn LogApi>,
    limiter: Arc<RateLimiter>,
    sink: RecordSink,
    progress: Arc<dyn ProgressSink>,
    profile: String,
    max_depth: usize,
}

impl EventFetcher {
    /// Creates a fetcher that stamps records with `profile`.
    #[must_use]
    pub fn new(
        api: Arc<dyn LogApi>,
        limiter: Arc<RateLimiter>,
        sink: RecordSink,
        progress: Arc<dyn ProgressSink>,
        profile: impl Into<String>,
        max_depth: usize,
    ) -> Self {
        Self {
            api,
            limiter,
            sink,
            progress,
            profile: profile.into(),
            max_depth,
        }
    }

    /// Fetches every event of `stream` inside `window`.
    ///
    /// The walk ends without error when the server returns no cursor, a
    /// cursor already seen in this walk, or an empty page.
    ///
    /// # Errors
    ///
    /// Fails on API errors, non-retryable or exhausted storage errors,
    /// cancellation, and when the depth cap is passed.
    pub async fn fetch(
        &self,
        cancel: &CancellationToken,
        group: &str,
        stream: &str,
        window: &Window,
    ) -> Result<FetchStats> {
        let mut cursor: Option<String> = None;
        let mut seen: HashSet<String> = HashSet::new();
        let mut stats = FetchStats::default();

        loop {
            if stats.pages > self.max_depth {
                return Err(SyncError::PaginationExceeded { depth: stats.pages });
            }
            stats.pages += 1;

            self.limiter.acquire(cancel).await?;
            let page = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(SyncError::Cancelled),
                page = self.api.list_events(group, stream, window, cursor.as_deref()) => page?,
            };

            let page_len = page.items.len();
            for raw in &page.items {
                match envelope::parse_record(raw, &self.profile, group) {
                    Ok(record) => {
                        self.sink.add_log(cancel, record).await?;
                        stats.saved += 1;
                        self.progress.record_saved();
                    }
                    Err(err) => {
                        warn!(
                            stream,
                            timestamp_ms = raw.timestamp_ms,
                            error = %err,
                            "skipping event that is not a container log envelope"
                        );
                        stats.skipped += 1;
                        self.progress.record_skipped();
                    }
                }
            }
            debug!(stream, page = stats.pages, events = page_len, "fetched event page");

            let Some(next) = page.next_cursor else {
                break;
            };
            // The previous cursor is in `seen`, so this also catches an echo.
            if page_len == 0 || !seen.insert(next.clone()) {
                break;
            }
            cursor = Some(next);
        }

        self.progress.stream_scanned();
        debug!(
            stream,
            pages = stats.pages,
            saved = stats.saved,
            skipped = stats.skipped,
            "stream fetched"
        );
        Ok(stats)
    }
}
