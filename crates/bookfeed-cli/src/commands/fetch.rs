use std::sync::Arc;

use serde::Serialize;

use bookfeed_core::{MarketId, MetricsSnapshot, Snapshot, SnapshotFetch, SnapshotFetcher};

use crate::cli::FetchArgs;
use crate::commands::render_json;
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct FetchResponseData {
    snapshot: Option<Snapshot>,
    not_modified: bool,
    last_modified: Option<String>,
    metrics: MetricsSnapshot,
}

pub async fn run(
    args: &FetchArgs,
    snapshots: &Arc<SnapshotFetcher>,
    pretty: bool,
) -> Result<(), CliError> {
    let selector = MarketId::parse(&args.market)?;

    let outcome = snapshots.fetch_snapshot(&selector).await?;
    let data = match outcome {
        SnapshotFetch::Fresh(snapshot) => FetchResponseData {
            last_modified: snapshot.last_modified.clone(),
            snapshot: Some(snapshot),
            not_modified: false,
            metrics: snapshots.metrics(),
        },
        SnapshotFetch::NotModified { last_modified } => FetchResponseData {
            snapshot: None,
            not_modified: true,
            last_modified,
            metrics: snapshots.metrics(),
        },
    };

    render_json(&data, pretty)
}
