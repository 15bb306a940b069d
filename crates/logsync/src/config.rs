//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// Retry policy applied to store writes that hit contention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles on every further attempt.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
        }
    }
}

impl RetryPolicy {
    /// Backoff to sleep after the given zero-based failed attempt.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << attempt.min(16))
    }
}

/// Configuration for a [`crate::LogSync`] engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Listing calls (groups, streams) allowed per second.
    pub listing_rate_per_sec: u32,
    /// Event fetch calls allowed per second.
    pub event_rate_per_sec: u32,
    /// Maximum number of pages one cursor walk may request.
    pub max_pagination_depth: usize,
    /// Listing walks stop once they have accumulated this many items.
    pub max_listing_results: usize,
    /// Streams fetched concurrently. Sized for the single-writer store.
    pub max_workers: usize,
    /// Store contention retry policy.
    pub retry: RetryPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            listing_rate_per_sec: 10,
            event_rate_per_sec: 30,
            max_pagination_depth: 1000,
            max_listing_results: 10_000,
            max_workers: 3,
            retry: RetryPolicy::default(),
        }
    }
}

impl SyncConfig {
    /// Sets the listing and event rates.
    #[must_use]
    pub const fn with_rates(mut self, listing_per_sec: u32, event_per_sec: u32) -> Self {
        self.listing_rate_per_sec = listing_per_sec;
        self.event_rate_per_sec = event_per_sec;
        self
    }

    /// Sets the pagination depth cap.
    #[must_use]
    pub const fn with_max_pagination_depth(mut self, depth: usize) -> Self {
        self.max_pagination_depth = depth;
        self
    }

    /// Sets the listing result cap.
    #[must_use]
    pub const fn with_max_listing_results(mut self, results: usize) -> Self {
        self.max_listing_results = results;
        self
    }

    /// Sets the worker count.
    #[must_use]
    pub const fn with_max_workers(mut self, workers: usize) -> Self {
        self.max_workers = workers;
        self
    }

    /// Sets the store retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Checks that every limit is usable.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] describing the first bad field.
    pub fn validate(&self) -> Result<()> {
        if self.listing_rate_per_sec == 0 || self.event_rate_per_sec == 0 {
            return Err(SyncError::InvalidConfig(
                "rate limits must be at least 1 call per second".to_string(),
            ));
        }
        if self.max_workers == 0 {
            return Err(SyncError::InvalidConfig(
                "max_workers must be at least 1".to_string(),
            ));
        }
        if self.max_listing_results == 0 {
            return Err(SyncError::InvalidConfig(
                "max_listing_results must be at least 1".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(SyncError::InvalidConfig(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
