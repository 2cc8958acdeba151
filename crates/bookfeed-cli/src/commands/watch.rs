use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use bookfeed_core::{
    LatestSnapshot, MarketId, MetricsSnapshot, SnapshotFetcher, SnapshotScheduler, UtcDateTime,
};

use crate::cli::WatchArgs;
use crate::commands::render_json;
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct WatchSummary {
    last_fetched_at: Option<UtcDateTime>,
    last_record_count: Option<usize>,
    metrics: MetricsSnapshot,
}

/// Runs the scheduler until Ctrl-C, then prints a final summary.
pub async fn run(
    args: &WatchArgs,
    snapshots: Arc<SnapshotFetcher>,
    pretty: bool,
) -> Result<(), CliError> {
    let selector = MarketId::parse(&args.market)?;
    let latest = Arc::new(LatestSnapshot::new());

    let scheduler = SnapshotScheduler::new(
        Arc::clone(&snapshots),
        selector,
        Duration::from_secs(args.interval_secs),
        Arc::clone(&latest),
    );
    let handle = scheduler.spawn();

    tokio::signal::ctrl_c().await?;
    tracing::info!("interrupt received; stopping scheduler");
    handle.shutdown().await;

    let published = latest.get();
    let summary = WatchSummary {
        last_fetched_at: published.as_ref().map(|snapshot| snapshot.fetched_at),
        last_record_count: published.as_ref().map(|snapshot| snapshot.record_count()),
        metrics: snapshots.metrics(),
    };
    render_json(&summary, pretty)
}
