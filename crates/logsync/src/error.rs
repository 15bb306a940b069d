//! Error types for the synchronization engine.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors returned by a remote log API implementation.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The remote service rejected the call because its quota was exceeded.
    #[error("request throttled by remote log service")]
    Throttled,

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote service answered with an error.
    #[error("service error {code}: {message}")]
    Service {
        /// Vendor error code.
        code: String,
        /// Human readable description.
        message: String,
    },
}

/// Errors raised by record storage backends and the retrying sink.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The single writer slot is held by someone else. Retryable.
    #[error("store is busy (database is locked)")]
    Busy,

    /// Every retry attempt ended in contention.
    #[error("store still busy after {attempts} attempts: {source}")]
    Exhausted {
        /// Number of attempts made.
        attempts: u32,
        /// The last contention failure.
        #[source]
        source: Box<StorageError>,
    },

    /// Non-retryable backend failure.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A stored record could not be encoded or decoded.
    #[error("record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Cancelled while waiting between attempts.
    #[error("storage operation cancelled")]
    Cancelled,
}

impl StorageError {
    /// Returns true for contention failures that are worth retrying.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        matches!(self, Self::Busy)
    }
}

/// Errors that can terminate a synchronization or query.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The requested log group does not exist.
    #[error("log group {group} not found")]
    GroupNotFound {
        /// The missing group name.
        group: String,
    },

    /// The cancellation token fired at a suspension point.
    #[error("operation cancelled")]
    Cancelled,

    /// A cursor walk went deeper than the configured depth cap.
    #[error("pagination depth exceeded ({depth} pages)")]
    PaginationExceeded {
        /// Depth at which the walk was aborted.
        depth: usize,
    },

    /// The remote log API failed.
    #[error("log API error: {0}")]
    Api(#[from] ApiError),

    /// The local store failed.
    #[error("storage error: {0}")]
    Storage(StorageError),

    /// A window whose start is after its end.
    #[error("invalid window: start {start} is after end {end}")]
    InvalidWindow {
        /// Requested start.
        start: DateTime<Utc>,
        /// Requested end.
        end: DateTime<Utc>,
    },

    /// Configuration rejected by validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A worker task panicked or was aborted.
    #[error("worker task failed: {0}")]
    Worker(String),
}

impl From<StorageError> for SyncError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Cancelled => Self::Cancelled,
            other => Self::Storage(other),
        }
    }
}

impl SyncError {
    /// Returns true if this error is the cancellation signal rather than a failure.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Result type alias for storage backend operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let err = SyncError::GroupNotFound {
            group: "/aws/containerinsights/prod/application".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "log group /aws/containerinsights/prod/application not found"
        );

        let err = SyncError::PaginationExceeded { depth: 1001 };
        assert_eq!(err.to_string(), "pagination depth exceeded (1001 pages)");

        let err = SyncError::Cancelled;
        assert_eq!(err.to_string(), "operation cancelled");
    }

    #[test]
    fn exhausted_wraps_last_failure() {
        let err = StorageError::Exhausted {
            attempts: 3,
            source: Box::new(StorageError::Busy),
        };
        assert!(err.to_string().contains("3 attempts"));
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("store is busy (database is locked)"));
    }

    #[test]
    fn only_busy_is_retryable() {
        assert!(StorageError::Busy.is_busy());
        assert!(!StorageError::Backend("disk full".to_string()).is_busy());
        assert!(!StorageError::Cancelled.is_busy());
    }

    #[test]
    fn storage_cancellation_maps_to_cancelled() {
        let err: SyncError = StorageError::Cancelled.into();
        assert!(err.is_cancelled());

        let err: SyncError = StorageError::Busy.into();
        assert!(matches!(err, SyncError::Storage(StorageError::Busy)));
    }

    #[test]
    fn api_error_conversion() {
        let err: SyncError = ApiError::Throttled.into();
        assert!(err.to_string().contains("throttled"));

        let err: SyncError = ApiError::Service {
            code: "ResourceNotFoundException".to_string(),
            message: "stream gone".to_string(),
        }
        .into();
        assert!(err.to_string().contains("ResourceNotFoundException"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SyncError>();
        assert_send_sync::<StorageError>();
        assert_send_sync::<ApiError>();
    }
}
