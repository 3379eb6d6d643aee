//! Cache coordinator
//!
//! Services never call a cache store directly. The coordinator wraps the
//! store with a per-call timeout and absorbs every cache failure: a slow
//! or broken cache degrades reads to the database instead of failing the
//! request. Cache problems are logged, never propagated.

use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;

use super::{Cache, CacheStore};

/// Keys fetched per SCAN page during prefix invalidation
const INVALIDATE_PAGE_SIZE: usize = 100;

/// Cache store wrapper that degrades instead of failing
///
/// Every call is bounded by `op_timeout`. Timeouts and store errors are
/// logged at warn level and swallowed: `get` reports a miss, mutations
/// report success. The database remains the source of truth either way.
#[derive(Debug, Clone)]
pub struct CacheCoordinator {
    store: Arc<Cache>,
    op_timeout: Duration,
}

impl CacheCoordinator {
    pub fn new(store: Arc<Cache>, op_timeout: Duration) -> Self {
        Self { store, op_timeout }
    }

    /// Get a value, treating any cache failure as a miss
    pub async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Option<T> {
        match timeout(self.op_timeout, self.store.get(key)).await {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                warn!(key, error = %e, "cache get failed, treating as miss");
                None
            }
            Err(_) => {
                warn!(key, timeout = ?self.op_timeout, "cache get timed out, treating as miss");
                None
            }
        }
    }

    /// Set a value; failures are logged and swallowed
    pub async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) {
        match timeout(self.op_timeout, self.store.set(key, value, ttl)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(key, error = %e, "cache set failed"),
            Err(_) => warn!(key, timeout = ?self.op_timeout, "cache set timed out"),
        }
    }

    /// Delete a key; failures are logged and swallowed
    pub async fn delete(&self, key: &str) {
        match timeout(self.op_timeout, self.store.delete(key)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(key, error = %e, "cache delete failed"),
            Err(_) => warn!(key, timeout = ?self.op_timeout, "cache delete timed out"),
        }
    }

    /// Delete every key starting with `prefix`
    ///
    /// Drives the store's paged scan until the cursor comes back as 0,
    /// deleting each page as it arrives. Each scan and delete step gets
    /// its own timeout. On any failure the loop stops; remaining stale
    /// entries age out through their TTL.
    pub async fn invalidate_prefix(&self, prefix: &str) {
        let mut cursor = 0u64;

        loop {
            let (next_cursor, keys) = match timeout(
                self.op_timeout,
                self.store.scan_prefix(cursor, prefix, INVALIDATE_PAGE_SIZE),
            )
            .await
            {
                Ok(Ok(page)) => page,
                Ok(Err(e)) => {
                    warn!(prefix, error = %e, "cache scan failed, aborting prefix invalidation");
                    return;
                }
                Err(_) => {
                    warn!(prefix, timeout = ?self.op_timeout, "cache scan timed out, aborting prefix invalidation");
                    return;
                }
            };

            if !keys.is_empty() {
                match timeout(self.op_timeout, self.store.delete_many(&keys)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        warn!(prefix, error = %e, "cache batch delete failed, aborting prefix invalidation");
                        return;
                    }
                    Err(_) => {
                        warn!(prefix, timeout = ?self.op_timeout, "cache batch delete timed out, aborting prefix invalidation");
                        return;
                    }
                }
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }
    }
}
