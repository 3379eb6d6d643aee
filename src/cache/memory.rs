//! In-memory cache implementation using moka
//!
//! Provides a fast, thread-safe in-memory cache with per-entry TTL
//! support. Entries carry their own expiry so different key classes
//! (blog detail, listings, comment lists) can live different lengths
//! of time in the same cache instance.

use super::CacheStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default maximum cache capacity (number of entries)
const DEFAULT_MAX_CAPACITY: u64 = 10_000;

/// Cache entry wrapper that stores serialized JSON data
/// This allows us to store any serializable type in the cache
#[derive(Clone)]
struct CacheEntry {
    /// JSON-serialized value
    data: Arc<String>,
    /// TTL requested by the writer, consumed by the expiry policy
    ttl: Duration,
}

impl CacheEntry {
    fn new<T: Serialize>(value: &T, ttl: Duration) -> Result<Self> {
        let json = serde_json::to_string(value).context("Failed to serialize cache value")?;
        Ok(Self {
            data: Arc::new(json),
            ttl,
        })
    }

    fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.data).context("Failed to deserialize cache value")
    }
}

/// Expiry policy that reads each entry's own TTL
struct PerEntryExpiry;

impl Expiry<String, CacheEntry> for PerEntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-memory cache using moka
///
/// Values are stored as JSON strings to support generic types.
pub struct MemoryCache {
    cache: Cache<String, CacheEntry>,
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entry_count", &self.cache.entry_count())
            .finish()
    }
}

impl MemoryCache {
    /// Create a new memory cache with default capacity (10,000 entries)
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_CAPACITY)
    }

    /// Create a new memory cache with custom max capacity
    pub fn with_capacity(max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryExpiry)
            .build();

        Self { cache }
    }

    /// Get the current number of entries in the cache
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Flush pending maintenance work so counts and expirations settle
    pub async fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks().await;
    }

    /// Sorted snapshot of all keys starting with `prefix`
    fn matching_keys(&self, prefix: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .cache
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| (*key).clone())
            .collect();
        keys.sort();
        keys
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    /// Get a value from cache
    ///
    /// Returns `Ok(Some(value))` if the key exists and hasn't expired,
    /// `Ok(None)` if the key doesn't exist or has expired.
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        match self.cache.get(key).await {
            Some(entry) => {
                let value = entry.deserialize()?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Set a value in cache with TTL
    ///
    /// The value automatically expires after the specified TTL.
    /// If the key already exists, it is overwritten.
    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        let entry = CacheEntry::new(value, ttl)?;
        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    /// Delete a value from cache
    ///
    /// If the key doesn't exist, this is a no-op.
    async fn delete(&self, key: &str) -> Result<()> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    /// Fetch one page of keys starting with `prefix`
    ///
    /// The cursor is an offset into a sorted snapshot of the matching
    /// keys, mirroring the paged contract of the Redis store. Keys
    /// inserted between pages may be missed; that matches Redis SCAN
    /// semantics and is acceptable for invalidation.
    async fn scan_prefix(
        &self,
        cursor: u64,
        prefix: &str,
        count: usize,
    ) -> Result<(u64, Vec<String>)> {
        let keys = self.matching_keys(prefix);
        let start = cursor as usize;
        if start >= keys.len() {
            return Ok((0, Vec::new()));
        }

        let end = (start + count.max(1)).min(keys.len());
        let page = keys[start..end].to_vec();
        let next_cursor = if end >= keys.len() { 0 } else { end as u64 };
        Ok((next_cursor, page))
    }

    /// Delete a batch of keys
    async fn delete_many(&self, keys: &[String]) -> Result<()> {
        for key in keys {
            self.cache.invalidate(key).await;
        }
        Ok(())
    }
}
