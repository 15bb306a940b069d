//! Store configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sled::Config as SledConfig;

/// File name of the default database, created in the home directory.
pub const DEFAULT_DB_NAME: &str = ".logsync.db";

/// Configuration for a [`crate::SledLogStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database directory.
    pub path: PathBuf,
    /// Sled page cache size in bytes.
    pub cache_capacity_bytes: u64,
    /// How long a writer waits for the write slot before reporting busy.
    pub busy_timeout: Duration,
    /// Delete the database when the store is dropped.
    pub temporary: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: Self::default_path(),
            cache_capacity_bytes: 64 * 1024 * 1024,
            busy_timeout: Duration::from_secs(5),
            temporary: false,
        }
    }
}

impl StoreConfig {
    /// `$HOME/.logsync.db`, or `./.logsync.db` when `HOME` is unset.
    #[must_use]
    pub fn default_path() -> PathBuf {
        std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_default()
            .join(DEFAULT_DB_NAME)
    }

    /// A persistent store at `path`.
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// A store that is removed when dropped.
    #[must_use]
    pub fn temporary() -> Self {
        Self {
            temporary: true,
            ..Self::default()
        }
    }

    /// Sets the busy timeout.
    #[must_use]
    pub const fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Sets the cache size.
    #[must_use]
    pub const fn with_cache_capacity(mut self, bytes: u64) -> Self {
        self.cache_capacity_bytes = bytes;
        self
    }

    pub(crate) fn sled_config(&self) -> SledConfig {
        let config = SledConfig::new().cache_capacity(self.cache_capacity_bytes);
        if self.temporary {
            config.temporary(true)
        } else {
            config.path(&self.path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.cache_capacity_bytes, 64 * 1024 * 1024);
        assert_eq!(config.busy_timeout, Duration::from_secs(5));
        assert!(!config.temporary);
        assert!(config.path.ends_with(DEFAULT_DB_NAME));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: StoreConfig =
            serde_json::from_str(r#"{"path": "/var/lib/logsync/db", "temporary": true}"#).unwrap();
        assert_eq!(config.path, PathBuf::from("/var/lib/logsync/db"));
        assert!(config.temporary);
        assert_eq!(config.busy_timeout, Duration::from_secs(5));
    }

    #[test]
    fn builders() {
        let config = StoreConfig::at("/tmp/x")
            .with_busy_timeout(Duration::from_millis(50))
            .with_cache_capacity(1024);
        assert_eq!(config.path, PathBuf::from("/tmp/x"));
        assert_eq!(config.busy_timeout, Duration::from_millis(50));
        assert_eq!(config.cache_capacity_bytes, 1024);
    }
}
