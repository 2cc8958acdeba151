//! CLI argument definitions for bookfeed.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `fetch` | One consistent snapshot, printed as JSON |
//! | `watch` | Background scheduler republishing the latest snapshot |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--base-url` | (required) | Paginated order-book resource |
//! | `--client-id` | `bookfeed/0.1.0` | Client identifier header value |
//! | `--timeout-ms` | `3000` | Per-attempt transport deadline |
//! | `--max-retries` | `2` | Retry budget per logical call |
//! | `--max-pages` | `10` | Page cap per pass |
//! | `--store-path` | (none) | DuckDB cache file; in-memory when absent |
//! | `--pretty` | `false` | Pretty-print JSON output |

use clap::{Args, Parser, Subcommand};

/// Resilient order-book snapshot ingestion.
///
/// Fetches paginated order-book data through a conditional-GET cache, a
/// bounded retry policy, and a per-endpoint circuit breaker, and assembles
/// internally consistent snapshots.
#[derive(Debug, Parser)]
#[command(name = "bookfeed", author, version, about = "Resilient order-book snapshot ingestion")]
pub struct Cli {
    /// Base URL of the paginated order-book resource.
    #[arg(long, global = true, default_value = "https://api.example.test/orders")]
    pub base_url: String,

    /// Value sent in the x-client-id header on every request.
    #[arg(long, global = true, default_value = "bookfeed/0.1.0")]
    pub client_id: String,

    /// Per-attempt transport deadline in milliseconds.
    #[arg(long, global = true, default_value_t = 3000)]
    pub timeout_ms: u64,

    /// Retry budget per logical call (0 disables retries).
    #[arg(long, global = true, default_value_t = 2)]
    pub max_retries: u32,

    /// Upper bound on pages fetched per pass.
    #[arg(long, global = true, default_value_t = 10)]
    pub max_pages: u32,

    /// DuckDB file for the persistent conditional-GET cache.
    /// When absent, an in-memory cache is used and validators are lost on exit.
    #[arg(long, global = true)]
    pub store_path: Option<std::path::PathBuf>,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch one consistent snapshot and print it as JSON.
    ///
    /// # Examples
    ///
    ///   bookfeed fetch eu-central
    ///   bookfeed fetch eu-central --max-pages 4 --pretty
    Fetch(FetchArgs),

    /// Run the background scheduler until interrupted, republishing the
    /// latest consistent snapshot on an interval.
    ///
    /// # Examples
    ///
    ///   bookfeed watch eu-central --interval-secs 60
    Watch(WatchArgs),
}

/// Arguments for the `fetch` command.
#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Market/region selector (e.g. eu-central).
    pub market: String,
}

/// Arguments for the `watch` command.
#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Market/region selector (e.g. eu-central).
    pub market: String,

    /// Republish interval in seconds (clamped to the scheduler floor).
    #[arg(long, default_value_t = 60)]
    pub interval_secs: u64,
}
