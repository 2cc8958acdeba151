//! Conditional-GET cache entries and the store contract.
//!
//! One entry is kept per normalized request fingerprint. The store holds
//! validators and expiry metadata only, never response bodies; a later `304`
//! is interpreted against the entry by the fetcher. Expiry semantics belong
//! to callers via `expires_at` — there is no TTL eviction at this layer.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::UtcDateTime;
use crate::error::CacheStoreError;

/// Persisted metadata for one cached request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Hex SHA-256 of the normalized url+query fingerprint. Unique per entry.
    pub cache_key: String,
    pub url: String,
    pub etag: Option<String>,
    pub expires_at: Option<UtcDateTime>,
    pub last_modified: Option<String>,
    pub fetched_at: UtcDateTime,
    pub http_status: u16,
}

/// Canonical request form: url plus sorted, percent-encoded query pairs.
///
/// `BTreeMap` iteration order makes the fingerprint independent of the
/// order query parameters were supplied in.
pub fn canonical_url(url: &str, query: &BTreeMap<String, String>) -> String {
    if query.is_empty() {
        return url.to_owned();
    }

    let mut canonical = String::with_capacity(url.len() + 16);
    canonical.push_str(url);
    canonical.push('?');
    for (index, (name, value)) in query.iter().enumerate() {
        if index > 0 {
            canonical.push('&');
        }
        canonical.push_str(&urlencoding::encode(name));
        canonical.push('=');
        canonical.push_str(&urlencoding::encode(value));
    }
    canonical
}

/// Cache key for one normalized request.
pub fn cache_key(url: &str, query: &BTreeMap<String, String>) -> String {
    hex::encode(Sha256::digest(canonical_url(url, query).as_bytes()))
}

/// Persistent key-value contract for cache entries.
///
/// `upsert` is idempotent last-write-wins: it overwrites every field for the
/// key. Store failures must never fail a fetch; the fetcher degrades them to
/// a cache miss (read) or a skipped write, and logs.
pub trait CacheEntryStore: Send + Sync {
    fn get(&self, cache_key: &str) -> Result<Option<CacheEntry>, CacheStoreError>;
    fn upsert(&self, entry: &CacheEntry) -> Result<(), CacheStoreError>;
}

/// In-memory cache store for tests and cache-less runs.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    inner: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .expect("memory cache store lock is not poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheEntryStore for MemoryCacheStore {
    fn get(&self, cache_key: &str) -> Result<Option<CacheEntry>, CacheStoreError> {
        let inner = self
            .inner
            .lock()
            .expect("memory cache store lock is not poisoned");
        Ok(inner.get(cache_key).cloned())
    }

    fn upsert(&self, entry: &CacheEntry) -> Result<(), CacheStoreError> {
        let mut inner = self
            .inner
            .lock()
            .expect("memory cache store lock is not poisoned");
        inner.insert(entry.cache_key.clone(), entry.clone());
        Ok(())
    }
}
