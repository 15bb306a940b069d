//! Sled-backed [`RecordStore`].
//!
//! Sled itself accepts concurrent writers, but the store keeps the
//! single-writer contract of the engine: every write takes the write slot and
//! gives up with [`StoreError::Busy`] after the busy timeout. Reads never wait.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use logsync::{LogQuery, LogRecord, PurgeFilter, RecordStore, StorageResult, Window};
use parking_lot::{Mutex, MutexGuard};
use sled::{Batch, Db, Tree};
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::keys;

/// Tree holding JSON-encoded records.
const RECORDS_TREE: &str = "records";

/// Durable record store on an embedded sled database.
#[derive(Debug)]
pub struct SledLogStore {
    db: Db,
    records: Tree,
    write_slot: Mutex<()>,
    busy_timeout: Duration,
    path: Option<PathBuf>,
}

impl SledLogStore {
    /// Opens (or creates) the store described by `config`.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let path = if config.temporary {
            None
        } else {
            if config.path.as_os_str().is_empty() {
                return Err(StoreError::InvalidPath("empty path".to_string()));
            }
            // sled does not create intermediate directories.
            if let Some(parent) = config.path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            Some(config.path.clone())
        };

        let db = config.sled_config().open()?;
        let records = db.open_tree(RECORDS_TREE)?;
        info!(
            path = ?path,
            records = records.len(),
            "opened log store"
        );

        Ok(Self {
            db,
            records,
            write_slot: Mutex::new(()),
            busy_timeout: config.busy_timeout,
            path,
        })
    }

    /// Opens an ephemeral store that disappears when dropped.
    pub fn open_temporary() -> Result<Self> {
        Self::open(&StoreConfig::temporary())
    }

    /// Database directory, `None` for temporary stores.
    #[must_use]
    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }

    fn write_slot(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_slot
            .try_lock_for(self.busy_timeout)
            .ok_or(StoreError::Busy {
                waited: self.busy_timeout,
            })
    }

    fn scan(&self, profile: &str, group: &str, window: Option<&Window>) -> sled::Iter {
        match window {
            Some(window) => {
                let (lo, hi) = keys::window_bounds(profile, group, window);
                self.records.range(lo..=hi)
            }
            None => self.records.scan_prefix(keys::scope_prefix(profile, group)),
        }
    }

    fn insert_record(&self, record: &LogRecord) -> Result<()> {
        let value = serde_json::to_vec(record)?;
        let _slot = self.write_slot()?;
        let seq = self.db.generate_id()?;
        let key = keys::record_key(
            &record.profile,
            &record.group,
            record.event_time.timestamp_millis(),
            seq,
        );
        self.records.insert(key, value)?;
        Ok(())
    }

    fn query_records(&self, query: &LogQuery) -> Result<Vec<LogRecord>> {
        let mut found = Vec::new();
        for entry in self.scan(&query.profile, &query.group, Some(&query.window)) {
            let (_, value) = entry?;
            let record: LogRecord = serde_json::from_slice(&value)?;
            if record.matches(query) {
                found.push(record);
            }
        }
        Ok(found)
    }

    fn purge_matching(&self, filter: &PurgeFilter) -> Result<u64> {
        let _slot = self.write_slot()?;
        let mut batch = Batch::default();
        let mut removed = 0u64;
        for entry in self.scan(&filter.profile, &filter.group, filter.window.as_ref()) {
            let (key, value) = entry?;
            let record: LogRecord = serde_json::from_slice(&value)?;
            if filter.matches(&record) {
                batch.remove(key);
                removed += 1;
            }
        }
        self.records.apply_batch(batch)?;
        debug!(
            profile = %filter.profile,
            group = %filter.group,
            pod = %filter.pod,
            removed,
            "purged records"
        );
        Ok(removed)
    }

    fn clear(&self) -> Result<u64> {
        let _slot = self.write_slot()?;
        let removed = self.records.len() as u64;
        self.records.clear()?;
        debug!(removed, "cleared records");
        Ok(removed)
    }

    fn flush_db(&self) -> Result<()> {
        let bytes = self.db.flush()?;
        debug!(bytes, "flushed log store");
        Ok(())
    }
}

impl RecordStore for SledLogStore {
    fn insert(&self, record: &LogRecord) -> StorageResult<()> {
        self.insert_record(record).map_err(Into::into)
    }

    fn query(&self, query: &LogQuery) -> StorageResult<Vec<LogRecord>> {
        self.query_records(query).map_err(Into::into)
    }

    fn purge_all(&self) -> StorageResult<u64> {
        self.clear().map_err(Into::into)
    }

    fn purge(&self, filter: &PurgeFilter) -> StorageResult<u64> {
        self.purge_matching(filter).map_err(Into::into)
    }

    fn flush(&self) -> StorageResult<()> {
        self.flush_db().map_err(Into::into)
    }

    fn len(&self) -> StorageResult<usize> {
        Ok(self.records.len())
    }
}
