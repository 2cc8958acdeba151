use thiserror::Error;

use crate::metrics::MetricsSnapshot;

/// Validation and contract errors exposed by `bookfeed-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("market id cannot be empty")]
    EmptyMarket,
    #[error("market id length {len} exceeds max {max}")]
    MarketTooLong { len: usize, max: usize },
    #[error("market id contains invalid character '{ch}' at index {index}")]
    MarketInvalidChar { ch: char, index: usize },

    #[error("order kind cannot be empty")]
    EmptyKind,
    #[error("unknown order side '{value}', expected one of buy, sell")]
    InvalidSide { value: String },

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },

    #[error("base url must start with http:// or https://: '{value}'")]
    InvalidBaseUrl { value: String },
    #[error("request timeout must be greater than zero")]
    ZeroTimeout,
    #[error("circuit failure threshold must be greater than zero")]
    ZeroFailureThreshold,
    #[error("max pages must be greater than zero")]
    ZeroMaxPages,
    #[error("consistency attempts must be greater than zero")]
    ZeroConsistencyAttempts,
}

/// Terminal outcome of one logical fetch, after internal retries are spent.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The endpoint's circuit is open; no transport attempt was made.
    ///
    /// Carries the latest metrics so callers can degrade gracefully
    /// (serve the last good snapshot with an explicit staleness signal).
    #[error("circuit open for '{endpoint}': {reason}")]
    CircuitOpen {
        endpoint: String,
        reason: String,
        metrics: Box<MetricsSnapshot>,
    },

    /// The upstream answered with a terminal status.
    #[error("upstream returned status {status}: {snippet}")]
    Upstream { status: u16, snippet: String },

    /// The transport failed on every permitted attempt.
    #[error("transport failure after {attempts} attempt(s): {message}")]
    Transport { attempts: u32, message: String },

    /// The response body was not valid JSON. Never retried.
    #[error("response body is not valid JSON: {0}")]
    Decode(String),
}

impl FetchError {
    pub const fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }
}

/// I/O failure in the persistent cache-entry store.
///
/// Always degraded to a cache miss by the fetcher; never fails a fetch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("cache store failure: {0}")]
pub struct CacheStoreError(String);

impl CacheStoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
