//! Persistent cache-entry store on DuckDB.

use std::path::PathBuf;

use ::duckdb::{params, Error as DuckDbError};

use bookfeed_core::{CacheEntry, CacheEntryStore, CacheStoreError, UtcDateTime};

use crate::duckdb::DuckDbConnectionManager;
use crate::error::StoreError;

const DEFAULT_POOL_SIZE: usize = 4;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS cache_entries (
    cache_key TEXT PRIMARY KEY,
    url TEXT NOT NULL,
    etag TEXT,
    expires_at TEXT,
    last_modified TEXT,
    fetched_at TEXT NOT NULL,
    http_status INTEGER NOT NULL
);
";

struct RawRow {
    cache_key: String,
    url: String,
    etag: Option<String>,
    expires_at: Option<String>,
    last_modified: Option<String>,
    fetched_at: String,
    http_status: i64,
}

/// One row per cache key; timestamps stored as RFC3339 text.
pub struct DuckDbCacheStore {
    manager: DuckDbConnectionManager,
}

impl DuckDbCacheStore {
    /// Opens (or creates) the store at `path` and ensures the schema exists.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or the schema
    /// cannot be created.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let manager = DuckDbConnectionManager::new(path, DEFAULT_POOL_SIZE);
        let connection = manager
            .acquire()
            .map_err(|error| StoreError::Connection(error.to_string()))?;
        connection
            .execute_batch(SCHEMA)
            .map_err(|error| StoreError::Query(error.to_string()))?;
        drop(connection);

        Ok(Self { manager })
    }

    fn get_entry(&self, cache_key: &str) -> Result<Option<CacheEntry>, StoreError> {
        let connection = self
            .manager
            .acquire()
            .map_err(|error| StoreError::Connection(error.to_string()))?;

        let mut statement = connection
            .prepare(
                "SELECT cache_key, url, etag, expires_at, last_modified, fetched_at, http_status
                 FROM cache_entries WHERE cache_key = ?",
            )
            .map_err(|error| StoreError::Query(error.to_string()))?;

        let row = statement.query_row(params![cache_key], |row| {
            Ok(RawRow {
                cache_key: row.get(0)?,
                url: row.get(1)?,
                etag: row.get(2)?,
                expires_at: row.get(3)?,
                last_modified: row.get(4)?,
                fetched_at: row.get(5)?,
                http_status: row.get(6)?,
            })
        });

        match row {
            Ok(raw) => Ok(Some(entry_from_row(raw)?)),
            Err(DuckDbError::QueryReturnedNoRows) => Ok(None),
            Err(error) => Err(StoreError::Query(error.to_string())),
        }
    }

    fn upsert_entry(&self, entry: &CacheEntry) -> Result<(), StoreError> {
        let connection = self
            .manager
            .acquire()
            .map_err(|error| StoreError::Connection(error.to_string()))?;

        connection
            .execute(
                "INSERT OR REPLACE INTO cache_entries
                 (cache_key, url, etag, expires_at, last_modified, fetched_at, http_status)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                params![
                    entry.cache_key,
                    entry.url,
                    entry.etag,
                    entry.expires_at.map(UtcDateTime::format_rfc3339),
                    entry.last_modified,
                    entry.fetched_at.format_rfc3339(),
                    i64::from(entry.http_status),
                ],
            )
            .map_err(|error| StoreError::Query(error.to_string()))?;

        Ok(())
    }
}

impl CacheEntryStore for DuckDbCacheStore {
    fn get(&self, cache_key: &str) -> Result<Option<CacheEntry>, CacheStoreError> {
        self.get_entry(cache_key).map_err(CacheStoreError::from)
    }

    fn upsert(&self, entry: &CacheEntry) -> Result<(), CacheStoreError> {
        self.upsert_entry(entry).map_err(CacheStoreError::from)
    }
}

fn entry_from_row(raw: RawRow) -> Result<CacheEntry, StoreError> {
    let fetched_at = UtcDateTime::parse(&raw.fetched_at)
        .map_err(|error| StoreError::InvalidData(error.to_string()))?;
    let expires_at = raw
        .expires_at
        .as_deref()
        .map(UtcDateTime::parse)
        .transpose()
        .map_err(|error| StoreError::InvalidData(error.to_string()))?;
    let http_status = u16::try_from(raw.http_status)
        .map_err(|_| StoreError::InvalidData(format!("http_status {}", raw.http_status)))?;

    Ok(CacheEntry {
        cache_key: raw.cache_key,
        url: raw.url,
        etag: raw.etag,
        expires_at,
        last_modified: raw.last_modified,
        fetched_at,
        http_status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, status: u16) -> CacheEntry {
        CacheEntry {
            cache_key: key.to_owned(),
            url: String::from("https://api.example.test/orders?page=1"),
            etag: Some(String::from("\"v1\"")),
            expires_at: Some(UtcDateTime::parse("2024-06-01T12:05:00Z").expect("valid")),
            last_modified: Some(String::from("Sat, 01 Jun 2024 12:00:00 GMT")),
            fetched_at: UtcDateTime::parse("2024-06-01T12:00:00Z").expect("valid"),
            http_status: status,
        }
    }

    #[test]
    fn round_trips_an_entry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = DuckDbCacheStore::open(dir.path().join("cache.duckdb")).expect("open");

        store.upsert(&entry("k1", 200)).expect("upsert");
        let stored = store.get("k1").expect("get").expect("present");

        assert_eq!(stored, entry("k1", 200));
    }

    #[test]
    fn upsert_is_last_write_wins() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = DuckDbCacheStore::open(dir.path().join("cache.duckdb")).expect("open");

        store.upsert(&entry("k1", 200)).expect("upsert");
        let mut updated = entry("k1", 200);
        updated.etag = Some(String::from("\"v2\""));
        updated.http_status = 304;
        store.upsert(&updated).expect("upsert");

        let stored = store.get("k1").expect("get").expect("present");
        assert_eq!(stored.etag.as_deref(), Some("\"v2\""));
        assert_eq!(stored.http_status, 304);
    }

    #[test]
    fn missing_key_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = DuckDbCacheStore::open(dir.path().join("cache.duckdb")).expect("open");

        assert!(store.get("absent").expect("get").is_none());
    }

    #[test]
    fn entries_survive_reopening_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cache.duckdb");

        {
            let store = DuckDbCacheStore::open(&path).expect("open");
            store.upsert(&entry("k1", 200)).expect("upsert");
        }

        let reopened = DuckDbCacheStore::open(&path).expect("reopen");
        let stored = reopened.get("k1").expect("get").expect("present");
        assert_eq!(stored.url, "https://api.example.test/orders?page=1");
    }

    #[test]
    fn optional_fields_round_trip_as_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = DuckDbCacheStore::open(dir.path().join("cache.duckdb")).expect("open");

        let mut sparse = entry("k2", 200);
        sparse.etag = None;
        sparse.expires_at = None;
        sparse.last_modified = None;
        store.upsert(&sparse).expect("upsert");

        let stored = store.get("k2").expect("get").expect("present");
        assert!(stored.etag.is_none());
        assert!(stored.expires_at.is_none());
        assert!(stored.last_modified.is_none());
    }
}
