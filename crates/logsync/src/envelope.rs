//! Container log envelope parsing.
//!
//! The cluster's log forwarder wraps every container line in a JSON envelope:
//!
//! ```json
//! {"log": "GET /health 200\n", "stream": "stdout",
//!  "kubernetes": {"pod_name": "api-7f9c", "container_name": "api", "namespace_name": "default"}}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::types::{LogRecord, RawEvent};

/// Why a raw event could not be turned into a record.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The message body is not a JSON envelope.
    #[error("malformed log envelope: {0}")]
    Json(#[from] serde_json::Error),

    /// The event timestamp is outside the representable range.
    #[error("event timestamp out of range: {0}ms")]
    Timestamp(i64),
}

// Absent and null fields both read as empty.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default, deserialize_with = "null_as_default")]
    log: String,
    #[serde(default, deserialize_with = "null_as_default")]
    kubernetes: KubernetesMeta,
}

#[derive(Debug, Default, Deserialize)]
struct KubernetesMeta {
    #[serde(default, deserialize_with = "null_as_default")]
    pod_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    container_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    namespace_name: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Converts epoch milliseconds to a UTC instant.
#[must_use]
pub fn event_time(timestamp_ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(timestamp_ms)
}

/// Parses a raw event into a record stamped with `profile` and `group`.
pub fn parse_record(
    raw: &RawEvent,
    profile: &str,
    group: &str,
) -> Result<LogRecord, EnvelopeError> {
    let envelope: Envelope = serde_json::from_str(&raw.message)?;
    let event_time =
        event_time(raw.timestamp_ms).ok_or(EnvelopeError::Timestamp(raw.timestamp_ms))?;

    Ok(LogRecord {
        profile: profile.to_string(),
        group: group.to_string(),
        pod: envelope.kubernetes.pod_name,
        container: envelope.kubernetes.container_name,
        namespace: envelope.kubernetes.namespace_name,
        event_time,
        message: envelope.log.trim_end_matches(['\n', '\r']).to_string(),
    })
}
