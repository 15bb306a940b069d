//! Read-only retrieval of persisted records.

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::Result;
use crate::sink::RecordSink;
use crate::types::{LogQuery, LogRecord, Window};

/// Answers record queries, oldest first.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    sink: RecordSink,
}

impl QueryEngine {
    /// Creates an engine reading through `sink`.
    #[must_use]
    pub fn new(sink: RecordSink) -> Self {
        Self { sink }
    }

    /// Records matching `query`, ascending by event time.
    ///
    /// Records sharing an event time keep the order the backend returned.
    ///
    /// # Errors
    ///
    /// Propagates storage failures once the busy retries are used up.
    pub async fn query(
        &self,
        cancel: &CancellationToken,
        query: LogQuery,
    ) -> Result<Vec<LogRecord>> {
        let mut records = self.sink.query(cancel, query).await?;
        records.sort_by_key(|r| r.event_time);
        debug!(count = records.len(), "query answered");
        Ok(records)
    }

    /// Records of `profile`/`group` whose pod contains `pod`, with
    /// `begin <= event_time <= end`.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::SyncError::InvalidWindow`] if `begin > end`, and
    /// on storage failures.
    pub async fn between(
        &self,
        cancel: &CancellationToken,
        profile: &str,
        group: &str,
        pod: &str,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<LogRecord>> {
        let window = Window::new(begin, end)?;
        self.query(cancel, LogQuery::new(profile, group, window).with_pod(pod))
            .await
    }
}
