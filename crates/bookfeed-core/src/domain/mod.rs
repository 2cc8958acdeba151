//! Canonical domain types for order-book snapshots.

mod market;
mod models;
mod timestamp;

pub use market::MarketId;
pub use models::{OrderSide, Snapshot, SnapshotRecord};
pub use timestamp::{parse_http_date, UtcDateTime};
