//! # logsync-store
//!
//! Durable single-writer record storage for `logsync` on an embedded sled
//! database.
//!
//! This crate provides:
//!
//! - [`SledLogStore`] - [`logsync::RecordStore`] backed by sled
//! - [`StoreConfig`] - Location, cache size and busy timeout
//! - [`StoreError`] - Backend errors, convertible to [`logsync::StorageError`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use logsync::{RecordSink, RetryPolicy};
//! use logsync_store::{SledLogStore, StoreConfig};
//!
//! let store = SledLogStore::open(&StoreConfig::default())?;
//! let sink = RecordSink::new(Arc::new(store), RetryPolicy::default());
//! # Ok::<(), logsync_store::StoreError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
mod keys;
pub mod sled_store;

pub use config::{StoreConfig, DEFAULT_DB_NAME};
pub use error::{Result, StoreError};
pub use sled_store::SledLogStore;
