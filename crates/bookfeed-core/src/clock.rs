//! Injectable time sources, so retry backoff and timestamp stamping are
//! deterministic under test.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::domain::UtcDateTime;

/// Time source for timestamps and elapsed-time checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn now_utc(&self) -> UtcDateTime;
}

/// Wall-clock time.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn now_utc(&self) -> UtcDateTime {
        UtcDateTime::now()
    }
}

/// Suspending delay primitive used between retry attempts.
pub trait Delay: Send + Sync {
    fn sleep<'a>(
        &'a self,
        duration: Duration,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

/// Production delay backed by the tokio timer.
#[derive(Debug, Default)]
pub struct TokioDelay;

impl Delay for TokioDelay {
    fn sleep<'a>(
        &'a self,
        duration: Duration,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Delay that completes immediately and records what was requested.
/// Keeps retry tests fast while still exposing the backoff choices.
#[derive(Debug, Default)]
pub struct NoopDelay {
    recorded: Mutex<Vec<Duration>>,
}

impl NoopDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<Duration> {
        self.recorded
            .lock()
            .expect("noop delay lock is not poisoned")
            .clone()
    }
}

impl Delay for NoopDelay {
    fn sleep<'a>(
        &'a self,
        duration: Duration,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        self.recorded
            .lock()
            .expect("noop delay lock is not poisoned")
            .push(duration);
        Box::pin(async {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_delay_records_requested_durations() {
        let delay = NoopDelay::new();

        delay.sleep(Duration::from_millis(100)).await;
        delay.sleep(Duration::from_millis(250)).await;

        assert_eq!(
            delay.recorded(),
            vec![Duration::from_millis(100), Duration::from_millis(250)]
        );
    }
}
