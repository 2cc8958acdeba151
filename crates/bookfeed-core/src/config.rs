//! Client configuration.
//!
//! One structure enumerates every recognized option with its default; it is
//! validated once, when the client is constructed, not at call sites.

use std::time::Duration;

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::error::ValidationError;
use crate::retry::RetryPolicy;

/// Default per-attempt transport deadline.
pub const DEFAULT_TIMEOUT_MS: u64 = 3_000;

/// Default cap on pages fetched per pass.
pub const DEFAULT_MAX_PAGES: u32 = 10;

/// Default full-pass retries when pagination tokens diverge.
pub const DEFAULT_CONSISTENCY_ATTEMPTS: u32 = 2;

/// Default scheduler republish interval.
pub const DEFAULT_SCHEDULE_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for one ingestion client bound to one endpoint.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Paginated order-book resource this client is bound to.
    pub base_url: String,
    /// Value sent in the client identifier header on every request.
    pub client_id: String,
    /// Per-attempt transport deadline in milliseconds.
    pub timeout_ms: u64,
    pub retry: RetryPolicy,
    pub breaker: CircuitBreakerConfig,
    /// Upper bound on pages fetched in one pass, regardless of what the
    /// page-count header declares.
    pub max_pages: u32,
    /// Full passes attempted before falling back to a degraded single page.
    pub consistency_attempts: u32,
    /// Scheduler tick interval. Clamped to the scheduler's floor at
    /// construction, never rejected.
    pub schedule_interval: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client_id: String::from("bookfeed/0.1.0"),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            retry: RetryPolicy::default(),
            breaker: CircuitBreakerConfig::default(),
            max_pages: DEFAULT_MAX_PAGES,
            consistency_attempts: DEFAULT_CONSISTENCY_ATTEMPTS,
            schedule_interval: DEFAULT_SCHEDULE_INTERVAL,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ValidationError::InvalidBaseUrl {
                value: self.base_url.clone(),
            });
        }
        if self.timeout_ms == 0 {
            return Err(ValidationError::ZeroTimeout);
        }
        if self.breaker.failure_threshold == 0 {
            return Err(ValidationError::ZeroFailureThreshold);
        }
        if self.max_pages == 0 {
            return Err(ValidationError::ZeroMaxPages);
        }
        if self.consistency_attempts == 0 {
            return Err(ValidationError::ZeroConsistencyAttempts);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = ClientConfig::new("https://api.example.test/orders");
        config.validate().expect("defaults are valid");
    }

    #[test]
    fn rejects_non_http_base_url() {
        let config = ClientConfig::new("ftp://api.example.test/orders");
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    fn rejects_zero_bounds() {
        let mut config = ClientConfig::new("https://api.example.test/orders");
        config.timeout_ms = 0;
        assert!(matches!(config.validate(), Err(ValidationError::ZeroTimeout)));

        let mut config = ClientConfig::new("https://api.example.test/orders");
        config.max_pages = 0;
        assert!(matches!(
            config.validate(),
            Err(ValidationError::ZeroMaxPages)
        ));

        let mut config = ClientConfig::new("https://api.example.test/orders");
        config.consistency_attempts = 0;
        assert!(matches!(
            config.validate(),
            Err(ValidationError::ZeroConsistencyAttempts)
        ));
    }
}
