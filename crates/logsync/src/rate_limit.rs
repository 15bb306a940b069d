//! Token bucket admission control for remote API calls.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};

/// Token bucket state.
#[derive(Debug)]
struct TokenBucket {
    /// Current tokens available.
    tokens: u64,
    /// Instant the bucket was last credited.
    last_refill: Instant,
    /// Time it takes to earn one token.
    per_token: Duration,
    /// Maximum tokens (equal to the per-second rate).
    capacity: u64,
}

impl TokenBucket {
    fn new(rate_per_sec: u32) -> Self {
        let rate = u64::from(rate_per_sec.max(1));
        Self {
            tokens: rate, // Start full
            last_refill: Instant::now(),
            per_token: Duration::from_secs(1) / rate as u32,
            capacity: rate,
        }
    }

    /// Credit the tokens earned since the last refill, keeping the remainder.
    fn refill(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_refill);
        let earned = (elapsed.as_nanos() / self.per_token.as_nanos().max(1)) as u64;
        if earned == 0 {
            return;
        }
        self.tokens = self.tokens.saturating_add(earned).min(self.capacity);
        if self.tokens == self.capacity {
            self.last_refill = now;
        } else {
            self.last_refill += self.per_token * earned as u32;
        }
    }

    /// Takes a token, or reports how long until one is earned.
    fn try_take(&mut self) -> std::result::Result<(), Duration> {
        let now = Instant::now();
        self.refill(now);
        if self.tokens > 0 {
            self.tokens -= 1;
            Ok(())
        } else {
            let since = now.duration_since(self.last_refill);
            Err(self
                .per_token
                .saturating_sub(since)
                .max(Duration::from_millis(1)))
        }
    }
}

/// Process-wide limiter for one category of remote calls.
///
/// Refills at a fixed rate with a capacity equal to that rate. Waiters are
/// served best-effort; a waiter may starve under sustained overload until
/// its token is cancelled.
#[derive(Debug)]
pub struct RateLimiter {
    name: &'static str,
    bucket: Mutex<TokenBucket>,
}

impl RateLimiter {
    /// Creates a limiter admitting `rate` calls per second.
    #[must_use]
    pub fn per_second(name: &'static str, rate: u32) -> Self {
        Self {
            name,
            bucket: Mutex::new(TokenBucket::new(rate)),
        }
    }

    /// Category name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Waits for a token.
    ///
    /// Returns [`SyncError::Cancelled`] without consuming anything if the
    /// token fires first.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<()> {
        loop {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            let wait = match self.bucket.lock().try_take() {
                Ok(()) => return Ok(()),
                Err(wait) => wait,
            };
            trace!(limiter = self.name, wait_ms = wait.as_millis() as u64, "rate limited");
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(SyncError::Cancelled),
                () = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// Takes a token only if one is immediately available.
    pub fn try_acquire(&self) -> bool {
        self.bucket.lock().try_take().is_ok()
    }

    /// Tokens currently available.
    #[must_use]
    pub fn available(&self) -> u64 {
        let mut bucket = self.bucket.lock();
        bucket.refill(Instant::now());
        bucket.tokens
    }
}

/// The two independent budgets shared by every worker.
#[derive(Debug, Clone)]
pub struct RateBudget {
    /// Gates group and stream listing calls.
    pub listing: Arc<RateLimiter>,
    /// Gates event fetch calls.
    pub events: Arc<RateLimiter>,
}

impl RateBudget {
    /// Creates both limiters.
    #[must_use]
    pub fn new(listing_rate: u32, event_rate: u32) -> Self {
        Self {
            listing: Arc::new(RateLimiter::per_second("listing", listing_rate)),
            events: Arc::new(RateLimiter::per_second("events", event_rate)),
        }
    }

    /// Creates both limiters from configuration.
    #[must_use]
    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.listing_rate_per_sec, config.event_rate_per_sec)
    }
}
