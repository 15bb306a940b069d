//! Advisory progress counters.
//!
//! Progress sinks are fire-and-forget: the engine calls them on its critical
//! path, so implementations must not block.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::SyncReport;

/// Receives progress notifications from a sync.
pub trait ProgressSink: Send + Sync {
    /// A stream was returned by the listing.
    fn stream_seen(&self) {}

    /// A stream passed discovery and will be fetched.
    fn stream_matched(&self) {}

    /// Every page of a stream has been fetched.
    fn stream_scanned(&self) {}

    /// A record reached the store.
    fn record_saved(&self) {}

    /// A malformed record was skipped.
    fn record_skipped(&self) {}
}

/// Ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {}

/// Lock-free counters for every notification.
#[derive(Debug, Default)]
pub struct SyncCounters {
    streams_seen: AtomicU64,
    streams_matched: AtomicU64,
    streams_scanned: AtomicU64,
    records_saved: AtomicU64,
    records_skipped: AtomicU64,
}

impl SyncCounters {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Streams returned by the listing so far.
    #[must_use]
    pub fn streams_seen(&self) -> u64 {
        self.streams_seen.load(Ordering::Relaxed)
    }

    /// Current values as a report.
    #[must_use]
    pub fn snapshot(&self) -> SyncReport {
        SyncReport {
            streams_matched: self.streams_matched.load(Ordering::Relaxed),
            streams_scanned: self.streams_scanned.load(Ordering::Relaxed),
            records_saved: self.records_saved.load(Ordering::Relaxed),
            records_skipped: self.records_skipped.load(Ordering::Relaxed),
        }
    }
}

impl ProgressSink for SyncCounters {
    fn stream_seen(&self) {
        self.streams_seen.fetch_add(1, Ordering::Relaxed);
    }

    fn stream_matched(&self) {
        self.streams_matched.fetch_add(1, Ordering::Relaxed);
    }

    fn stream_scanned(&self) {
        self.streams_scanned.fetch_add(1, Ordering::Relaxed);
    }

    fn record_saved(&self) {
        self.records_saved.fetch_add(1, Ordering::Relaxed);
    }

    fn record_skipped(&self) {
        self.records_skipped.fetch_add(1, Ordering::Relaxed);
    }
}

/// Forwards every notification to two sinks.
pub(crate) struct Tee {
    pub(crate) first: Arc<dyn ProgressSink>,
    pub(crate) second: Arc<dyn ProgressSink>,
}

impl ProgressSink for Tee {
    fn stream_seen(&self) {
        self.first.stream_seen();
        self.second.stream_seen();
    }

    fn stream_matched(&self) {
        self.first.stream_matched();
        self.second.stream_matched();
    }

    fn stream_scanned(&self) {
        self.first.stream_scanned();
        self.second.stream_scanned();
    }

    fn record_saved(&self) {
        self.first.record_saved();
        self.second.record_saved();
    }

    fn record_skipped(&self) {
        self.first.record_skipped();
        self.second.record_skipped();
    }
}
