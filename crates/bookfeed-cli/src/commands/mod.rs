mod fetch;
mod watch;

use std::sync::Arc;
use std::time::Duration;

use bookfeed_core::{
    CacheEntryStore, ClientConfig, HttpFetcher, MemoryCacheStore, ReqwestTransport, RetryPolicy,
    SnapshotFetcher,
};
use bookfeed_store::DuckDbCacheStore;

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub async fn run(cli: &Cli) -> Result<(), CliError> {
    let config = client_config(cli);
    let store: Arc<dyn CacheEntryStore> = match &cli.store_path {
        Some(path) => Arc::new(DuckDbCacheStore::open(path)?),
        None => Arc::new(MemoryCacheStore::new()),
    };
    let fetcher = Arc::new(HttpFetcher::new(
        &config,
        Arc::new(ReqwestTransport::new()),
        store,
    )?);
    let snapshots = Arc::new(SnapshotFetcher::new(&config, fetcher));

    match &cli.command {
        Command::Fetch(args) => fetch::run(args, &snapshots, cli.pretty).await,
        Command::Watch(args) => watch::run(args, snapshots, cli.pretty).await,
    }
}

fn client_config(cli: &Cli) -> ClientConfig {
    let mut config = ClientConfig::new(&cli.base_url);
    config.client_id = cli.client_id.clone();
    config.timeout_ms = cli.timeout_ms;
    config.retry = RetryPolicy {
        max_retries: cli.max_retries,
        ..RetryPolicy::default()
    };
    config.max_pages = cli.max_pages;
    if let Command::Watch(args) = &cli.command {
        config.schedule_interval = Duration::from_secs(args.interval_secs);
    }
    config
}

pub(crate) fn render<T: serde::Serialize>(value: &T, pretty: bool) -> Result<(), CliError> {
    let output = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{output}");
    Ok(())
}

pub(crate) use render as render_json;
