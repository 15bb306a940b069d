//! Core types shared by the engine and the storage backends.
//!
//! This module provides:
//! - [`LogRecord`] - A persisted container log line
//! - [`StreamDescriptor`] - A stream discovered in a group
//! - [`Window`] - Closed UTC interval bounding a sync or query
//! - [`Page`] / [`RawEvent`] - Remote listing results
//! - [`LogQuery`] - Read filter over persisted records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// A container log line persisted in the local store.
///
/// Records carry no unique key, so a retried sync may store duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Credential profile the record was fetched with
    pub profile: String,
    /// Log group the record came from
    pub group: String,
    /// Pod name
    pub pod: String,
    /// Container name
    pub container: String,
    /// Kubernetes namespace
    pub namespace: String,
    /// When the event was emitted
    pub event_time: DateTime<Utc>,
    /// The log line itself
    pub message: String,
}

impl LogRecord {
    /// Checks whether this record satisfies a query.
    ///
    /// Profile and group match exactly, the pod name must contain the pod
    /// filter, and the event time must fall inside the closed window.
    #[must_use]
    pub fn matches(&self, query: &LogQuery) -> bool {
        self.profile == query.profile
            && self.group == query.group
            && self.pod.contains(&query.pod)
            && query.window.contains(self.event_time)
    }
}

/// A stream of a group as reported by the listing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescriptor {
    /// Stream name
    pub name: String,
    /// Timestamp of the newest event in the stream
    pub last_event_time: DateTime<Utc>,
}

impl StreamDescriptor {
    /// Creates a descriptor.
    #[must_use]
    pub fn new(name: impl Into<String>, last_event_time: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            last_event_time,
        }
    }
}

/// Closed time interval, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl Window {
    /// Creates a window, rejecting `start > end`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidWindow`] if the bounds are inverted.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start > end {
            return Err(SyncError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// Start of the window.
    #[must_use]
    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// End of the window.
    #[must_use]
    pub const fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Start as epoch milliseconds, the unit remote APIs expect.
    #[must_use]
    pub fn start_millis(&self) -> i64 {
        self.start.timestamp_millis()
    }

    /// End as epoch milliseconds.
    #[must_use]
    pub fn end_millis(&self) -> i64 {
        self.end.timestamp_millis()
    }

    /// Returns true if `t` lies inside the window.
    #[must_use]
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t <= self.end
    }
}

/// An event exactly as the remote API returns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    /// Epoch milliseconds
    pub timestamp_ms: i64,
    /// Unparsed message body
    pub message: String,
}

impl RawEvent {
    /// Creates a raw event.
    #[must_use]
    pub fn new(timestamp_ms: i64, message: impl Into<String>) -> Self {
        Self {
            timestamp_ms,
            message: message.into(),
        }
    }
}

/// One page of a cursor-paginated listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Items in delivery order
    pub items: Vec<T>,
    /// Continuation token, `None` on the last page
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    /// A page followed by more results.
    #[must_use]
    pub fn new(items: Vec<T>, next_cursor: Option<String>) -> Self {
        Self { items, next_cursor }
    }

    /// The final page of a listing.
    #[must_use]
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_cursor: None,
        }
    }
}

/// Read filter over persisted records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogQuery {
    /// Exact profile
    pub profile: String,
    /// Exact group
    pub group: String,
    /// Pod name substring (empty matches every pod)
    pub pod: String,
    /// Inclusive time window
    pub window: Window,
}

impl LogQuery {
    /// Creates a query over every pod of a group.
    #[must_use]
    pub fn new(profile: impl Into<String>, group: impl Into<String>, window: Window) -> Self {
        Self {
            profile: profile.into(),
            group: group.into(),
            pod: String::new(),
            window,
        }
    }

    /// Restricts the query to pods whose name contains `pod`.
    #[must_use]
    pub fn with_pod(mut self, pod: impl Into<String>) -> Self {
        self.pod = pod.into();
        self
    }
}

/// Parameters of one synchronization run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    /// Profile stamped on every stored record
    pub profile: String,
    /// Log group to synchronize
    pub group: String,
    /// Stream name substring (empty keeps every stream)
    pub stream_filter: String,
    /// Events outside this window are not requested
    pub window: Window,
}

/// Outcome of a successful synchronization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Streams that passed discovery
    pub streams_matched: u64,
    /// Streams fully fetched
    pub streams_scanned: u64,
    /// Records written to the store
    pub records_saved: u64,
    /// Malformed records that were skipped
    pub records_skipped: u64,
}
