//! Multi-page consistency verification.
//!
//! A snapshot is only useful when every page was read from the same
//! generation of the upstream resource. Pages are fetched strictly in
//! order — never in parallel — both to bound rate-limit usage and to keep
//! the freshness comparison meaningful.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;

use crate::clock::{Clock, SystemClock};
use crate::config::ClientConfig;
use crate::domain::{MarketId, Snapshot, SnapshotRecord, UtcDateTime};
use crate::error::{FetchError, ValidationError};
use crate::fetcher::{CacheMode, FetchResult, HttpFetcher, LAST_MODIFIED_HEADER, TOTAL_PAGES_HEADER};
use crate::metrics::MetricsSnapshot;

/// Outcome of one snapshot request.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotFetch {
    /// A freshly assembled snapshot. `snapshot.degraded` marks the
    /// page-1-only fallback taken after the consistency retries ran out.
    Fresh(Snapshot),
    /// Page 1 answered `304 Not Modified`: the resource is unchanged since
    /// the cached validator, so the previous snapshot remains current and no
    /// further pages were spent against the rate budget.
    NotModified { last_modified: Option<String> },
}

#[derive(Debug, Deserialize)]
struct OrderPage {
    #[serde(default)]
    orders: Vec<RawOrder>,
}

/// Wire shape of one order-book row, before validation.
#[derive(Debug, Deserialize)]
struct RawOrder {
    market: String,
    kind: String,
    side: String,
    price: f64,
    quantity: f64,
    issued_at: String,
}

impl RawOrder {
    fn into_record(
        self,
        snapshot_ts: UtcDateTime,
    ) -> Result<SnapshotRecord, ValidationError> {
        let market = MarketId::parse(&self.market)?;
        let side = self.side.parse()?;
        let issued_at = UtcDateTime::parse(&self.issued_at)?;
        SnapshotRecord::new(
            market,
            self.kind,
            side,
            self.price,
            self.quantity,
            issued_at,
            snapshot_ts,
        )
    }
}

enum PassOutcome {
    Consistent {
        orders: Vec<RawOrder>,
        last_modified: Option<String>,
    },
    NotModified {
        last_modified: Option<String>,
    },
    Inconsistent {
        expected: Option<String>,
        observed: Option<String>,
    },
}

/// Assembles one internally consistent read of the paginated resource.
pub struct SnapshotFetcher {
    fetcher: Arc<HttpFetcher>,
    base_url: String,
    max_pages: u32,
    consistency_attempts: u32,
    clock: Arc<dyn Clock>,
}

impl SnapshotFetcher {
    pub fn new(config: &ClientConfig, fetcher: Arc<HttpFetcher>) -> Self {
        Self::with_clock(config, fetcher, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: &ClientConfig,
        fetcher: Arc<HttpFetcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            fetcher,
            base_url: config.base_url.clone(),
            max_pages: config.max_pages,
            consistency_attempts: config.consistency_attempts,
            clock,
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.fetcher.metrics()
    }

    /// Fetches all pages, verifying that every page carries the freshness
    /// token captured from page 1. An inconsistent pass is discarded whole
    /// and re-run from page 1, since the underlying data may have changed.
    /// After `consistency_attempts` inconsistent passes, one best-effort
    /// single-page snapshot is returned with `degraded = true`.
    pub async fn fetch_snapshot(
        &self,
        selector: &MarketId,
    ) -> Result<SnapshotFetch, FetchError> {
        for pass in 1..=self.consistency_attempts {
            match self.run_pass().await? {
                PassOutcome::Consistent {
                    orders,
                    last_modified,
                } => {
                    let snapshot = self.assemble(selector, orders, last_modified, false);
                    return Ok(SnapshotFetch::Fresh(snapshot));
                }
                PassOutcome::NotModified { last_modified } => {
                    return Ok(SnapshotFetch::NotModified { last_modified });
                }
                PassOutcome::Inconsistent { expected, observed } => {
                    tracing::warn!(
                        pass,
                        expected = expected.as_deref().unwrap_or("-"),
                        observed = observed.as_deref().unwrap_or("-"),
                        "pagination freshness tokens diverged; discarding pass"
                    );
                }
            }
        }

        // Best effort: a single page with no cross-page atomicity claim.
        let page = self.fetch_page(1, CacheMode::Bypass).await?;
        let last_modified = page.header(LAST_MODIFIED_HEADER).map(str::to_owned);
        let orders = parse_orders(&page)?;
        tracing::warn!(
            attempts = self.consistency_attempts,
            "pagination stayed inconsistent; returning degraded single-page snapshot"
        );
        Ok(SnapshotFetch::Fresh(self.assemble(
            selector,
            orders,
            last_modified,
            true,
        )))
    }

    async fn run_pass(&self) -> Result<PassOutcome, FetchError> {
        let first = self.fetch_page(1, CacheMode::Conditional).await?;
        if first.from_cache {
            return Ok(PassOutcome::NotModified {
                last_modified: first.header(LAST_MODIFIED_HEADER).map(str::to_owned),
            });
        }

        let target = first.header(LAST_MODIFIED_HEADER).map(str::to_owned);
        let declared = first
            .header(TOTAL_PAGES_HEADER)
            .and_then(|value| value.trim().parse::<u32>().ok())
            .filter(|&pages| pages >= 1)
            .unwrap_or(1);
        let pages = declared.min(self.max_pages);

        let mut orders = parse_orders(&first)?;
        for page in 2..=pages {
            let result = self.fetch_page(page, CacheMode::Bypass).await?;
            let token = result.header(LAST_MODIFIED_HEADER).map(str::to_owned);
            if token != target {
                return Ok(PassOutcome::Inconsistent {
                    expected: target,
                    observed: token,
                });
            }
            orders.extend(parse_orders(&result)?);
        }

        Ok(PassOutcome::Consistent {
            orders,
            last_modified: target,
        })
    }

    async fn fetch_page(&self, page: u32, mode: CacheMode) -> Result<FetchResult, FetchError> {
        let mut query = BTreeMap::new();
        query.insert(String::from("page"), page.to_string());
        self.fetcher
            .fetch_json_with(&self.base_url, &query, mode)
            .await
    }

    fn assemble(
        &self,
        selector: &MarketId,
        orders: Vec<RawOrder>,
        last_modified: Option<String>,
        degraded: bool,
    ) -> Snapshot {
        let snapshot_ts = self.clock.now_utc();
        let mut records = Vec::with_capacity(orders.len());
        let mut skipped = 0usize;

        for order in orders {
            match order.into_record(snapshot_ts) {
                Ok(record) if record.market == *selector => records.push(record),
                Ok(_) => {}
                Err(error) => {
                    skipped += 1;
                    tracing::debug!(%error, "skipping malformed order record");
                }
            }
        }

        if skipped > 0 {
            tracing::warn!(skipped, "order records failed validation and were skipped");
        }

        Snapshot {
            records,
            last_modified,
            fetched_at: snapshot_ts,
            degraded,
        }
    }
}

fn parse_orders(result: &FetchResult) -> Result<Vec<RawOrder>, FetchError> {
    if result.body.is_null() {
        return Ok(Vec::new());
    }
    serde_json::from_value::<OrderPage>(result.body.clone())
        .map(|page| page.orders)
        .map_err(|error| FetchError::Decode(error.to_string()))
}
