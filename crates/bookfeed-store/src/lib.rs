//! DuckDB-backed persistence for bookfeed's conditional-GET cache.
//!
//! Implements [`bookfeed_core::CacheEntryStore`] over a single
//! `cache_entries` table with `INSERT OR REPLACE` upsert semantics.

pub mod duckdb;
pub mod error;
pub mod store;

pub use crate::duckdb::{DuckDbConnectionManager, PooledConnection};
pub use crate::error::StoreError;
pub use crate::store::DuckDbCacheStore;
