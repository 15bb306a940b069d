//! Collaborator seams: the remote log API and record storage backends.
//!
//! [`LogApi`] abstracts the vendor's log-query service behind cursor-paginated
//! listings. [`RecordStore`] abstracts the local single-writer store; the
//! engine never talks to it directly but through [`crate::RecordSink`], which
//! adds the contention retry policy.

use std::future::Future;
use std::pin::Pin;

use crate::error::{ApiError, StorageResult};
use crate::types::{LogQuery, LogRecord, Page, RawEvent, StreamDescriptor, Window};

/// Result type returned by [`LogApi`] calls.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Remote, rate-limited, cursor-paginated log query service.
///
/// Implementations perform exactly one remote call per method invocation.
/// Rate limiting and cursor walking are the caller's job.
pub trait LogApi: Send + Sync {
    /// Lists log group names.
    fn list_groups<'a>(
        &'a self,
        cursor: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = ApiResult<Page<String>>> + Send + 'a>>;

    /// Lists the streams of a group, most recent event first.
    fn list_streams<'a>(
        &'a self,
        group: &'a str,
        cursor: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = ApiResult<Page<StreamDescriptor>>> + Send + 'a>>;

    /// Lists the events of a stream inside `window`, oldest first.
    fn list_events<'a>(
        &'a self,
        group: &'a str,
        stream: &'a str,
        window: &'a Window,
        cursor: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = ApiResult<Page<RawEvent>>> + Send + 'a>>;
}

/// Selects records to delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeFilter {
    /// Exact profile
    pub profile: String,
    /// Exact group
    pub group: String,
    /// Pod name substring (empty matches every pod)
    pub pod: String,
    /// Inclusive window; `None` deletes regardless of time
    pub window: Option<Window>,
}

impl PurgeFilter {
    /// Returns true if `record` should be deleted.
    #[must_use]
    pub fn matches(&self, record: &LogRecord) -> bool {
        record.profile == self.profile
            && record.group == self.group
            && record.pod.contains(&self.pod)
            && self.window.is_none_or(|w| w.contains(record.event_time))
    }
}

/// Durable record storage that permits one writer at a time.
///
/// Calls may block briefly; async callers go through [`crate::RecordSink`],
/// which runs them on the blocking pool. Writers that lose the race for the
/// write slot get [`crate::StorageError::Busy`].
pub trait RecordStore: Send + Sync {
    /// Appends one record.
    fn insert(&self, record: &LogRecord) -> StorageResult<()>;

    /// Returns every record matching `query`, in any order.
    fn query(&self, query: &LogQuery) -> StorageResult<Vec<LogRecord>>;

    /// Deletes every record. Returns the number removed.
    fn purge_all(&self) -> StorageResult<u64>;

    /// Deletes the records selected by `filter`. Returns the number removed.
    fn purge(&self, filter: &PurgeFilter) -> StorageResult<u64>;

    /// Makes every accepted write durable.
    fn flush(&self) -> StorageResult<()>;

    /// Number of stored records.
    fn len(&self) -> StorageResult<usize>;

    /// Returns true if the store holds no records.
    fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }
}
