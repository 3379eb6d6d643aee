//! Cache layer
//!
//! This module provides the caching abstraction for the Inkpost backend.
//! It supports:
//! - In-memory cache (moka) - default, for single-instance deployment
//! - Redis cache - optional, for distributed deployment
//!
//! The cache driver is selected based on configuration. Services never
//! talk to a cache store directly; they go through [`coordinator::CacheCoordinator`],
//! which adds per-call timeouts and absorbs store failures.
//!
//! # Usage
//!
//! ```rust,ignore
//! use inkpost::cache::{create_cache, Cache};
//! use inkpost::config::CacheConfig;
//!
//! let config = CacheConfig::default();
//! let cache = create_cache(&config).await?;
//! cache.set("key", &"value", Duration::from_secs(60)).await?;
//! ```

pub mod coordinator;
pub mod memory;
#[cfg(feature = "redis-cache")]
pub mod redis;

use anyhow::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{CacheConfig, CacheDriver};

/// Cache store trait
///
/// This trait defines the interface for cache implementations.
/// Note: Due to Rust's object safety rules, this trait cannot be used
/// as a trait object (`dyn CacheStore`). Use the `Cache` enum instead
/// for runtime polymorphism.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get a value from cache
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>>;

    /// Set a value in cache with TTL
    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration)
        -> Result<()>;

    /// Delete a value from cache
    async fn delete(&self, key: &str) -> Result<()>;

    /// Fetch one page of keys starting with `prefix`
    ///
    /// Returns the next cursor and the keys found on this page. A returned
    /// cursor of 0 means the iteration is complete. Callers must keep
    /// calling until they see cursor 0; a page may legitimately be empty
    /// before the iteration finishes.
    async fn scan_prefix(&self, cursor: u64, prefix: &str, count: usize)
        -> Result<(u64, Vec<String>)>;

    /// Delete a batch of keys
    async fn delete_many(&self, keys: &[String]) -> Result<()>;
}

pub use coordinator::CacheCoordinator;
pub use memory::MemoryCache;
#[cfg(feature = "redis-cache")]
pub use redis::RedisCache;

/// Unified cache enum for runtime polymorphism
///
/// Since `CacheStore` has generic methods, it cannot be used as a trait
/// object. This enum provides runtime polymorphism by wrapping concrete
/// cache implementations.
#[derive(Debug)]
pub enum Cache {
    /// In-memory cache using moka
    Memory(MemoryCache),
    /// Redis cache for distributed deployment
    #[cfg(feature = "redis-cache")]
    Redis(RedisCache),
}

#[async_trait]
impl CacheStore for Cache {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        match self {
            Cache::Memory(cache) => cache.get(key).await,
            #[cfg(feature = "redis-cache")]
            Cache::Redis(cache) => cache.get(key).await,
        }
    }

    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        match self {
            Cache::Memory(cache) => cache.set(key, value, ttl).await,
            #[cfg(feature = "redis-cache")]
            Cache::Redis(cache) => cache.set(key, value, ttl).await,
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match self {
            Cache::Memory(cache) => cache.delete(key).await,
            #[cfg(feature = "redis-cache")]
            Cache::Redis(cache) => cache.delete(key).await,
        }
    }

    async fn scan_prefix(
        &self,
        cursor: u64,
        prefix: &str,
        count: usize,
    ) -> Result<(u64, Vec<String>)> {
        match self {
            Cache::Memory(cache) => cache.scan_prefix(cursor, prefix, count).await,
            #[cfg(feature = "redis-cache")]
            Cache::Redis(cache) => cache.scan_prefix(cursor, prefix, count).await,
        }
    }

    async fn delete_many(&self, keys: &[String]) -> Result<()> {
        match self {
            Cache::Memory(cache) => cache.delete_many(keys).await,
            #[cfg(feature = "redis-cache")]
            Cache::Redis(cache) => cache.delete_many(keys).await,
        }
    }
}

/// Create a cache instance based on configuration
///
/// - `CacheDriver::Memory` - Creates an in-memory cache using moka
/// - `CacheDriver::Redis` - Creates a Redis cache (requires `redis-cache` feature)
///
/// # Errors
/// - Returns an error if Redis is configured but the `redis-cache` feature is not enabled
/// - Returns an error if Redis connection fails
pub async fn create_cache(config: &CacheConfig) -> Result<Arc<Cache>> {
    match config.driver {
        CacheDriver::Memory => {
            let cache = MemoryCache::new();
            Ok(Arc::new(Cache::Memory(cache)))
        }
        CacheDriver::Redis => {
            #[cfg(feature = "redis-cache")]
            {
                let redis_url = config.redis_url.as_ref().ok_or_else(|| {
                    anyhow::anyhow!(
                        "Redis URL is required when using Redis cache driver. \
                         Set 'redis_url' in cache configuration or use INKPOST_CACHE_REDIS_URL environment variable."
                    )
                })?;

                let cache = RedisCache::new(redis_url).await?;
                Ok(Arc::new(Cache::Redis(cache)))
            }

            #[cfg(not(feature = "redis-cache"))]
            {
                anyhow::bail!(
                    "Redis cache driver is configured but the 'redis-cache' feature is not enabled. \
                     Either enable the feature with `--features redis-cache` or use 'memory' cache driver."
                )
            }
        }
    }
}
