//! Running counters for one ingestion client.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::Serialize;

use crate::circuit_breaker::{CircuitSnapshot, CircuitState};

#[derive(Debug, Default, Clone)]
struct LastObserved {
    last_status: Option<u16>,
    last_url: Option<String>,
    last_rate_limit_remaining: Option<u64>,
    last_rate_limit_reset: Option<u64>,
}

/// Counters mutated by the fetcher; read through [`snapshot`](Self::snapshot).
#[derive(Debug, Default)]
pub struct ClientMetrics {
    total_requests: AtomicU64,
    total_retries: AtomicU64,
    total_cache_hits_304: AtomicU64,
    observed: Mutex<LastObserved>,
}

impl ClientMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retry(&self) {
        self.total_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_hit_304(&self) {
        self.total_cache_hits_304.fetch_add(1, Ordering::Relaxed);
    }

    /// Records the latest observed response. Rate-limit budget fields are
    /// observational only; absent headers leave the previous values intact.
    pub(crate) fn record_response(
        &self,
        status: u16,
        url: &str,
        rate_limit_remaining: Option<u64>,
        rate_limit_reset: Option<u64>,
    ) {
        let mut observed = self
            .observed
            .lock()
            .expect("metrics lock is not poisoned");
        observed.last_status = Some(status);
        observed.last_url = Some(url.to_owned());
        if rate_limit_remaining.is_some() {
            observed.last_rate_limit_remaining = rate_limit_remaining;
        }
        if rate_limit_reset.is_some() {
            observed.last_rate_limit_reset = rate_limit_reset;
        }
    }

    pub fn snapshot(&self, circuit: CircuitSnapshot) -> MetricsSnapshot {
        let observed = self
            .observed
            .lock()
            .expect("metrics lock is not poisoned")
            .clone();

        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            total_cache_hits_304: self.total_cache_hits_304.load(Ordering::Relaxed),
            total_retries: self.total_retries.load(Ordering::Relaxed),
            last_rate_limit_remaining: observed.last_rate_limit_remaining,
            last_rate_limit_reset: observed.last_rate_limit_reset,
            last_status: observed.last_status,
            last_url: observed.last_url,
            circuit_state: circuit.state,
            circuit_opened_reason: circuit.opened_reason,
        }
    }
}

/// Point-in-time metrics view handed to callers and error payloads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub total_cache_hits_304: u64,
    pub total_retries: u64,
    pub last_rate_limit_remaining: Option<u64>,
    pub last_rate_limit_reset: Option<u64>,
    pub last_status: Option<u16>,
    pub last_url: Option<String>,
    pub circuit_state: CircuitState,
    pub circuit_opened_reason: Option<String>,
}
