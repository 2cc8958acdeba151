//! Bounded retry with full-jitter exponential backoff.

use std::time::Duration;

/// Retry budget and backoff shape for one logical fetch.
///
/// The delay for attempt `n` is drawn uniformly from
/// `[0, min(max_delay, base_delay * 2^n)]` (full jitter). Only HTTP 5xx/429
/// and retryable transport failures are retried at this layer; other
/// statuses and decode failures are terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of re-attempts. Total attempts = `max_retries + 1`.
    /// Zero is valid and means a single attempt with no sleeps.
    pub max_retries: u32,
    /// Backoff ceiling for attempt 0.
    pub base_delay: Duration,
    /// Upper bound on any backoff ceiling.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    /// Single attempt, no sleeps.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Statuses that signal transient backend trouble.
    pub const fn is_retryable_status(status: u16) -> bool {
        status == 429 || (status >= 500 && status < 600)
    }

    /// Deterministic upper bound for the delay of a given attempt (0-based).
    pub fn ceiling(&self, attempt: u32) -> Duration {
        let shift = attempt.min(32);
        let uncapped = self
            .base_delay
            .as_millis()
            .saturating_mul(1u128 << shift);
        let capped = uncapped.min(self.max_delay.as_millis());
        Duration::from_millis(capped.min(u128::from(u64::MAX)) as u64)
    }

    /// Full-jitter delay: uniform in `[0, ceiling(attempt)]`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let ceiling_ms = self.ceiling(attempt).as_millis() as u64;
        Duration::from_millis(fastrand::u64(0..=ceiling_ms))
    }
}
