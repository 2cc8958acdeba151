//! Background republishing of the latest consistent snapshot.
//!
//! Request-serving code never fetches; it reads the latest-snapshot slot.
//! The slot has one writer (the scheduler) and any number of readers, and
//! readers always observe a whole snapshot — the Arc is swapped under the
//! lock, never mutated in place, and the lock is never held across an await.

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::domain::{MarketId, Snapshot};
use crate::snapshot::{SnapshotFetch, SnapshotFetcher};

/// Floor for the republish interval, to avoid thrashing the upstream.
pub const MIN_SCHEDULE_INTERVAL: Duration = Duration::from_secs(5);

/// Single-writer / multi-reader slot holding the newest snapshot.
///
/// Absent until the first successful pass completes; left untouched when a
/// pass fails, so readers keep a stale-but-available snapshot.
#[derive(Debug, Default)]
pub struct LatestSnapshot {
    slot: RwLock<Option<Arc<Snapshot>>>,
}

impl LatestSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-blocking read of the newest published snapshot.
    pub fn get(&self) -> Option<Arc<Snapshot>> {
        self.slot
            .read()
            .expect("latest snapshot lock is not poisoned")
            .clone()
    }

    pub(crate) fn publish(&self, snapshot: Arc<Snapshot>) {
        let mut slot = self
            .slot
            .write()
            .expect("latest snapshot lock is not poisoned");
        *slot = Some(snapshot);
    }
}

/// Periodic driver for [`SnapshotFetcher`].
pub struct SnapshotScheduler {
    fetcher: Arc<SnapshotFetcher>,
    selector: MarketId,
    interval: Duration,
    latest: Arc<LatestSnapshot>,
}

impl SnapshotScheduler {
    pub fn new(
        fetcher: Arc<SnapshotFetcher>,
        selector: MarketId,
        interval: Duration,
        latest: Arc<LatestSnapshot>,
    ) -> Self {
        let interval = if interval < MIN_SCHEDULE_INTERVAL {
            tracing::warn!(
                requested_ms = interval.as_millis() as u64,
                floor_ms = MIN_SCHEDULE_INTERVAL.as_millis() as u64,
                "schedule interval below floor; clamping"
            );
            MIN_SCHEDULE_INTERVAL
        } else {
            interval
        };

        Self {
            fetcher,
            selector,
            interval,
            latest,
        }
    }

    /// Runs one ingestion pass and publishes on success.
    ///
    /// Failures are logged and swallowed: the previous snapshot stays
    /// available and the host process is never taken down by a tick.
    pub async fn run_once(&self) {
        let started = Instant::now();
        match self.fetcher.fetch_snapshot(&self.selector).await {
            Ok(SnapshotFetch::Fresh(snapshot)) => {
                let metrics = self.fetcher.metrics();
                tracing::info!(
                    duration_ms = started.elapsed().as_millis() as u64,
                    records = snapshot.record_count(),
                    last_modified = snapshot.last_modified.as_deref().unwrap_or("-"),
                    degraded = snapshot.degraded,
                    total_requests = metrics.total_requests,
                    total_retries = metrics.total_retries,
                    cache_hits_304 = metrics.total_cache_hits_304,
                    "snapshot published"
                );
                self.latest.publish(Arc::new(snapshot));
            }
            Ok(SnapshotFetch::NotModified { last_modified }) => {
                tracing::debug!(
                    duration_ms = started.elapsed().as_millis() as u64,
                    last_modified = last_modified.as_deref().unwrap_or("-"),
                    "snapshot unchanged; keeping previous"
                );
            }
            Err(error) => {
                tracing::warn!(
                    %error,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "snapshot pass failed; previous snapshot stays available"
                );
            }
        }
    }

    /// Spawns the periodic task: one pass immediately, then one per
    /// interval. A pass runs inline in the loop, so ticks never overlap; a
    /// tick that comes due mid-pass is skipped, not queued.
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.run_once().await;
                    }
                    _ = shutdown_rx.changed() => {
                        tracing::info!("snapshot scheduler shutting down");
                        break;
                    }
                }
            }
        });

        SchedulerHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Handle for stopping a spawned scheduler.
///
/// Dropping the handle also stops the task (the shutdown channel closes);
/// prefer [`shutdown`](Self::shutdown) to let an in-flight pass finish.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stops the timer and waits for the task; an in-flight pass completes
    /// (or times out at the transport deadline) before this returns.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}
