//! Per-endpoint circuit breaker.
//!
//! One breaker instance is bound to one external endpoint for the lifetime
//! of its client; independent instances have independent state, so call
//! sites must share the instance to get coherent protection.

use std::fmt::{Display, Formatter};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;

/// Runtime circuit state for upstream calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

impl Display for CircuitState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Circuit breaker thresholds and timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// Minimum time the circuit stays open before a probe is admitted.
    pub min_open_duration: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            min_open_duration: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
struct CircuitInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
    opened_reason: Option<String>,
}

impl Default for CircuitInner {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            probe_in_flight: false,
            opened_reason: None,
        }
    }
}

/// Point-in-time view of a breaker, for metrics and error payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub opened_reason: Option<String>,
}

/// Thread-safe circuit breaker state machine.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<CircuitInner>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(CircuitInner::default()),
        }
    }

    /// Returns whether a call may proceed.
    ///
    /// Closed admits everything. Open fails fast until `min_open_duration`
    /// has elapsed, then transitions to half-open and admits exactly one
    /// probe; further calls are rejected until the probe reports back via
    /// [`record_success`](Self::record_success) or
    /// [`record_failure`](Self::record_failure).
    pub fn try_acquire(&self) -> bool {
        let mut inner = self
            .inner
            .lock()
            .expect("circuit breaker lock is not poisoned");
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => !inner.probe_in_flight,
            CircuitState::Open => {
                let cooled_down = inner
                    .opened_at
                    .map(|opened_at| opened_at.elapsed() >= self.config.min_open_duration)
                    .unwrap_or(false);

                if cooled_down {
                    inner.state = CircuitState::HalfOpen;
                    inner.probe_in_flight = true;
                    inner.opened_at = None;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self
            .inner
            .lock()
            .expect("circuit breaker lock is not poisoned");
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.probe_in_flight = false;
        inner.opened_reason = None;
    }

    /// Records one failure for the whole logical call.
    ///
    /// `reason` describes the terminal failure (last status or transport
    /// message) and is surfaced through [`CircuitSnapshot::opened_reason`]
    /// while the circuit stays open.
    pub fn record_failure(&self, reason: &str) {
        let mut inner = self
            .inner
            .lock()
            .expect("circuit breaker lock is not poisoned");
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        inner.probe_in_flight = false;

        if inner.state == CircuitState::HalfOpen
            || inner.consecutive_failures >= self.config.failure_threshold
        {
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
            inner.opened_reason = Some(format!(
                "{} consecutive failure(s); last: {reason}",
                inner.consecutive_failures
            ));
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner
            .lock()
            .expect("circuit breaker lock is not poisoned")
            .state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.inner
            .lock()
            .expect("circuit breaker lock is not poisoned")
            .consecutive_failures
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let inner = self
            .inner
            .lock()
            .expect("circuit breaker lock is not poisoned");
        CircuitSnapshot {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            opened_reason: inner.opened_reason.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, open_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: threshold,
            min_open_duration: Duration::from_millis(open_ms),
        })
    }

    #[test]
    fn opens_after_threshold_failures() {
        let breaker = breaker(2, 10);

        assert_eq!(breaker.state(), CircuitState::Closed);
        breaker.record_failure("http status 500");
        assert_eq!(breaker.state(), CircuitState::Closed);
        breaker.record_failure("http status 500");
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.try_acquire());
    }

    #[test]
    fn success_resets_consecutive_failures() {
        let breaker = breaker(3, 10);

        breaker.record_failure("http status 502");
        breaker.record_failure("http status 502");
        assert_eq!(breaker.consecutive_failures(), 2);

        breaker.record_success();
        assert_eq!(breaker.consecutive_failures(), 0);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn open_rejects_until_cooldown_elapses() {
        let breaker = breaker(1, 50);

        breaker.record_failure("http status 500");
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.try_acquire());

        std::thread::sleep(Duration::from_millis(60));
        assert!(breaker.try_acquire());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn half_open_admits_exactly_one_probe() {
        let breaker = breaker(1, 1);

        breaker.record_failure("http status 500");
        std::thread::sleep(Duration::from_millis(2));

        assert!(breaker.try_acquire());
        // Probe in flight: everyone else fails fast.
        assert!(!breaker.try_acquire());
        assert!(!breaker.try_acquire());

        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.try_acquire());
    }

    #[test]
    fn failed_probe_reopens_with_fresh_cooldown() {
        let breaker = breaker(1, 1);

        breaker.record_failure("http status 500");
        std::thread::sleep(Duration::from_millis(2));
        assert!(breaker.try_acquire());

        breaker.record_failure("connection failed");
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(breaker.consecutive_failures(), 2);
        assert!(!breaker.try_acquire());
    }

    #[test]
    fn snapshot_carries_opened_reason() {
        let breaker = breaker(1, 10);

        breaker.record_failure("http status 503");
        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.state, CircuitState::Open);
        assert_eq!(snapshot.consecutive_failures, 1);
        let reason = snapshot.opened_reason.expect("reason recorded");
        assert!(reason.contains("http status 503"), "reason: {reason}");

        breaker.record_success();
        assert!(breaker.snapshot().opened_reason.is_none());
    }
}
