//! Error types for the sled store.

use std::time::Duration;

use logsync::StorageError;
use thiserror::Error;

/// Errors raised by [`crate::SledLogStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Sled reported a failure.
    #[error("database error: {0}")]
    Db(#[from] sled::Error),

    /// Creating the database directory failed.
    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Another writer held the write slot for the whole busy timeout.
    #[error("database is locked (waited {waited:?})")]
    Busy {
        /// How long the writer waited.
        waited: Duration,
    },

    /// The store path could not be resolved.
    #[error("invalid store path: {0}")]
    InvalidPath(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

impl From<StoreError> for StorageError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Busy { .. } => Self::Busy,
            StoreError::Serialization(e) => Self::Serialization(e),
            other => Self::Backend(other.to_string()),
        }
    }
}
