//! Redis cache implementation
//!
//! Provides a distributed cache using Redis for multi-instance deployments.
//!
//! - TTL-based expiration via SETEX
//! - Prefix invalidation via cursor-driven SCAN + DEL (not KEYS, which
//!   can block the server)

use super::CacheStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

/// Redis cache implementation
///
/// Values are stored as JSON strings to support generic types.
pub struct RedisCache {
    /// Multiplexed connection for async operations
    connection: MultiplexedConnection,
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache").finish_non_exhaustive()
    }
}

impl RedisCache {
    /// Create a new Redis cache with the given connection URL
    ///
    /// # Errors
    /// Returns an error if the connection cannot be established.
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url).context("Failed to create Redis client")?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .context("Failed to connect to Redis")?;

        Ok(Self { connection })
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    /// Get a value from Redis cache
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        let mut conn = self.connection.clone();

        let result: Option<String> = conn
            .get(key)
            .await
            .context("Failed to get value from Redis")?;

        match result {
            Some(json) => {
                let value =
                    serde_json::from_str(&json).context("Failed to deserialize cached value")?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Set a value in Redis cache with TTL
    ///
    /// Uses SETEX to atomically set the value with expiration.
    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        let mut conn = self.connection.clone();

        let json = serde_json::to_string(value).context("Failed to serialize cache value")?;

        // TTL is in seconds for Redis, minimum 1 second
        let ttl_secs = ttl.as_secs().max(1);

        let _: () = conn
            .set_ex(key, json, ttl_secs)
            .await
            .context("Failed to set value in Redis")?;

        Ok(())
    }

    /// Delete a value from Redis cache
    ///
    /// If the key doesn't exist, this is a no-op.
    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.connection.clone();

        let _: () = conn
            .del(key)
            .await
            .context("Failed to delete key from Redis")?;

        Ok(())
    }

    /// Fetch one page of keys starting with `prefix`
    ///
    /// Issues a single SCAN step. `COUNT` is a hint, so a page may hold
    /// fewer (even zero) keys while the cursor is still non-zero.
    async fn scan_prefix(
        &self,
        cursor: u64,
        prefix: &str,
        count: usize,
    ) -> Result<(u64, Vec<String>)> {
        let mut conn = self.connection.clone();
        let pattern = format!("{prefix}*");

        let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(&pattern)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await
            .context("Failed to scan keys in Redis")?;

        Ok((next_cursor, keys))
    }

    /// Delete a batch of keys with a single DEL
    async fn delete_many(&self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }

        let mut conn = self.connection.clone();

        let _: () = conn
            .del(keys)
            .await
            .context("Failed to delete keys from Redis")?;

        Ok(())
    }
}
