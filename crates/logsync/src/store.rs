//! In-memory record store.
//!
//! [`MemoryStore`] keeps records in a `RwLock<Vec<_>>` for ephemeral runs and
//! tests. Faults can be queued to simulate a contended single-writer backend.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::error::{StorageError, StorageResult};
use crate::traits::{PurgeFilter, RecordStore};
use crate::types::{LogQuery, LogRecord};

/// Thread-safe in-memory [`RecordStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Records in insertion order
    records: RwLock<Vec<LogRecord>>,
    /// Failures returned by upcoming insert, query and purge calls, oldest first
    faults: Mutex<VecDeque<StorageError>>,
    /// Write calls received, including failed ones
    write_attempts: AtomicU64,
    flushes: AtomicU64,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` data calls fail with [`StorageError::Busy`].
    pub fn fail_next_with_busy(&self, n: usize) {
        let mut faults = self.faults.lock();
        for _ in 0..n {
            faults.push_back(StorageError::Busy);
        }
    }

    /// Makes the next data call fail with `err`.
    pub fn inject_fault(&self, err: StorageError) {
        self.faults.lock().push_back(err);
    }

    /// Write calls received so far, including the ones that failed.
    #[must_use]
    pub fn write_attempts(&self) -> u64 {
        self.write_attempts.load(Ordering::Relaxed)
    }

    /// Number of completed flushes.
    #[must_use]
    pub fn flushes(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    /// Snapshot of every stored record in insertion order.
    #[must_use]
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.read().clone()
    }

    fn take_fault(&self) -> StorageResult<()> {
        match self.faults.lock().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn begin_write(&self) -> StorageResult<()> {
        self.write_attempts.fetch_add(1, Ordering::Relaxed);
        self.take_fault()
    }
}

impl RecordStore for MemoryStore {
    fn insert(&self, record: &LogRecord) -> StorageResult<()> {
        self.begin_write()?;
        self.records.write().push(record.clone());
        Ok(())
    }

    fn query(&self, query: &LogQuery) -> StorageResult<Vec<LogRecord>> {
        self.take_fault()?;
        Ok(self
            .records
            .read()
            .iter()
            .filter(|r| r.matches(query))
            .cloned()
            .collect())
    }

    fn purge_all(&self) -> StorageResult<u64> {
        self.begin_write()?;
        let mut records = self.records.write();
        let removed = records.len() as u64;
        records.clear();
        Ok(removed)
    }

    fn purge(&self, filter: &PurgeFilter) -> StorageResult<u64> {
        self.begin_write()?;
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|r| !filter.matches(r));
        Ok((before - records.len()) as u64)
    }

    fn flush(&self) -> StorageResult<()> {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn len(&self) -> StorageResult<usize> {
        Ok(self.records.read().len())
    }
}
