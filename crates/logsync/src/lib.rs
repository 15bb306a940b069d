//! # logsync
//!
//! Rate-limited synchronization of remote container logs into a local store.
//!
//! This crate provides:
//!
//! - [`LogSync`] - Invocation boundary: sync, query and purge
//! - [`RateLimiter`] / [`RateBudget`] - Token-bucket admission per API category
//! - [`PaginatedLister`] - Bounded cursor walker with a cycle guard
//! - [`StreamDiscovery`] - Finds the streams of a group worth fetching
//! - [`EventFetcher`] - Fetches, parses and stores one stream's events
//! - [`WorkerPool`] - Bounded fan-out with first-error-wins
//! - [`RecordSink`] - Retrying facade over a [`RecordStore`] backend
//! - [`QueryEngine`] - Ordered reads of persisted records
//! - [`MemoryStore`] - In-memory [`RecordStore`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use logsync::{LogApi, LogSync, MemoryStore, SyncConfig, SyncRequest, Window};
//! use tokio_util::sync::CancellationToken;
//!
//! async fn run(api: Arc<dyn LogApi>) -> logsync::Result<()> {
//!     let sync = LogSync::new(SyncConfig::default(), api, Arc::new(MemoryStore::new()))?;
//!     let end = chrono::Utc::now();
//!     let request = SyncRequest {
//!         profile: "default".to_string(),
//!         group: "/aws/containerinsights/prod/application".to_string(),
//!         stream_filter: "api".to_string(),
//!         window: Window::new(end - chrono::Duration::hours(1), end)?,
//!     };
//!     let report = sync.sync(&CancellationToken::new(), &request).await?;
//!     println!("saved {} records", report.records_saved);
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod discovery;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod fetcher;
pub mod pagination;
pub mod pool;
pub mod progress;
pub mod query;
pub mod rate_limit;
pub mod sink;
pub mod store;
pub mod traits;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export main types
pub use config::{RetryPolicy, SyncConfig};
pub use discovery::StreamDiscovery;
pub use engine::LogSync;
pub use envelope::EnvelopeError;
pub use error::{ApiError, Result, StorageError, StorageResult, SyncError};
pub use fetcher::{EventFetcher, FetchStats};
pub use pagination::{PaginatedLister, WalkEnd};
pub use pool::WorkerPool;
pub use progress::{NoopProgress, ProgressSink, SyncCounters};
pub use query::QueryEngine;
pub use rate_limit::{RateBudget, RateLimiter};
pub use sink::RecordSink;
pub use store::MemoryStore;
pub use traits::{ApiResult, LogApi, PurgeFilter, RecordStore};
pub use types::{
    LogQuery, LogRecord, Page, RawEvent, StreamDescriptor, SyncReport, SyncRequest, Window,
};
