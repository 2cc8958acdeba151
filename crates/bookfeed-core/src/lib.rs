//! # Bookfeed Core
//!
//! Resilient ingestion of paginated order-book data from a rate-limited,
//! occasionally flaky HTTP API. Downstream consumers get one internally
//! consistent snapshot at a time; backend instability never cascades past
//! this crate.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | Conditional-GET cache entries and the store contract |
//! | [`circuit_breaker`] | Per-endpoint circuit breaker |
//! | [`clock`] | Injectable clock and delay primitives |
//! | [`config`] | Client configuration, validated once |
//! | [`domain`] | Market ids, order records, snapshots, timestamps |
//! | [`error`] | Error taxonomy |
//! | [`fetcher`] | Conditional, retrying, circuit-broken JSON fetcher |
//! | [`metrics`] | Running request/retry/cache counters |
//! | [`retry`] | Bounded full-jitter backoff |
//! | [`scheduler`] | Background republishing + latest-snapshot slot |
//! | [`snapshot`] | Multi-page consistency verification |
//! | [`transport`] | HTTP transport abstraction (reqwest + scripted) |
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────┐
//! │ SnapshotScheduler  │──── publishes ───▶ LatestSnapshot (readers)
//! └─────────┬──────────┘
//!           ▼
//! ┌────────────────────┐
//! │  SnapshotFetcher   │  page-by-page, one freshness token per pass
//! └─────────┬──────────┘
//!           ▼
//! ┌────────────────────┐   ┌────────────────┐   ┌─────────────────┐
//! │    HttpFetcher     │──▶│ CircuitBreaker │   │ CacheEntryStore │
//! │ (retry + caching)  │   └────────────────┘   └─────────────────┘
//! └─────────┬──────────┘
//!           ▼
//! ┌────────────────────┐
//! │     Transport      │  reqwest in production, scripted in tests
//! └────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use bookfeed_core::{
//!     ClientConfig, HttpFetcher, MarketId, MemoryCacheStore, ReqwestTransport,
//!     SnapshotFetch, SnapshotFetcher,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::new("https://api.example.test/orders");
//!     let fetcher = Arc::new(HttpFetcher::new(
//!         &config,
//!         Arc::new(ReqwestTransport::new()),
//!         Arc::new(MemoryCacheStore::new()),
//!     )?);
//!     let snapshots = SnapshotFetcher::new(&config, fetcher);
//!
//!     let selector = MarketId::parse("eu-central")?;
//!     if let SnapshotFetch::Fresh(snapshot) = snapshots.fetch_snapshot(&selector).await? {
//!         println!("{} records as of {}", snapshot.record_count(), snapshot.fetched_at);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod circuit_breaker;
pub mod clock;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetcher;
pub mod metrics;
pub mod retry;
pub mod scheduler;
pub mod snapshot;
pub mod transport;

// Re-export commonly used types at crate root for convenience

// Cache
pub use cache::{cache_key, canonical_url, CacheEntry, CacheEntryStore, MemoryCacheStore};

// Circuit breaker
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitSnapshot, CircuitState};

// Clock and delay
pub use clock::{Clock, Delay, NoopDelay, SystemClock, TokioDelay};

// Configuration
pub use config::{
    ClientConfig, DEFAULT_CONSISTENCY_ATTEMPTS, DEFAULT_MAX_PAGES, DEFAULT_SCHEDULE_INTERVAL,
    DEFAULT_TIMEOUT_MS,
};

// Domain models
pub use domain::{parse_http_date, MarketId, OrderSide, Snapshot, SnapshotRecord, UtcDateTime};

// Error types
pub use error::{CacheStoreError, FetchError, ValidationError};

// Fetcher
pub use fetcher::{
    CacheMode, FetchResult, HttpFetcher, CLIENT_ID_HEADER, ETAG_HEADER, EXPIRES_HEADER,
    IF_NONE_MATCH_HEADER, LAST_MODIFIED_HEADER, RATE_LIMIT_REMAINING_HEADER,
    RATE_LIMIT_RESET_HEADER, TOTAL_PAGES_HEADER,
};

// Metrics
pub use metrics::{ClientMetrics, MetricsSnapshot};

// Retry
pub use retry::RetryPolicy;

// Scheduler
pub use scheduler::{LatestSnapshot, SchedulerHandle, SnapshotScheduler, MIN_SCHEDULE_INTERVAL};

// Snapshot assembly
pub use snapshot::{SnapshotFetch, SnapshotFetcher};

// Transport
pub use transport::{
    HttpMethod, HttpRequest, HttpResponse, ReqwestTransport, ScriptedTransport, Transport,
    TransportError,
};
