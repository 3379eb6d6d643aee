//! Detached task pool
//!
//! Counter adjustments and cache invalidation run after the
//! authoritative write, detached from the request that triggered them.
//! The pool wraps `tokio::spawn` with a per-task deadline, failure
//! logging and an in-flight counter so shutdown (and tests) can wait
//! for the queue to drain.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::timeout;
use tracing::warn;

/// Runs fire-and-forget maintenance work with a deadline
///
/// Tasks report failures through logs only; nothing they do can fail a
/// request that already returned. The database stays authoritative, so
/// a lost task means a stale cache entry or a skipped counter bump,
/// both repaired by later traffic or TTL expiry.
#[derive(Debug, Clone)]
pub struct TaskPool {
    default_timeout: Duration,
    inflight: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl TaskPool {
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            default_timeout,
            inflight: Arc::new(AtomicUsize::new(0)),
            idle: Arc::new(Notify::new()),
        }
    }

    /// Spawn a detached task with the pool's default deadline
    pub fn spawn<F>(&self, name: &'static str, fut: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.spawn_with_timeout(name, self.default_timeout, fut);
    }

    /// Spawn a detached task with a custom deadline
    pub fn spawn_with_timeout<F>(&self, name: &'static str, deadline: Duration, fut: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.inflight.fetch_add(1, Ordering::SeqCst);
        let inflight = Arc::clone(&self.inflight);
        let idle = Arc::clone(&self.idle);

        tokio::spawn(async move {
            match timeout(deadline, fut).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(task = name, error = %e, "background task failed"),
                Err(_) => warn!(task = name, ?deadline, "background task timed out"),
            }

            if inflight.fetch_sub(1, Ordering::SeqCst) == 1 {
                idle.notify_waiters();
            }
        });
    }

    /// Number of tasks currently running
    pub fn inflight(&self) -> usize {
        self.inflight.load(Ordering::SeqCst)
    }

    /// Wait until every spawned task has finished
    pub async fn wait_idle(&self) {
        loop {
            // Register for the notification before checking the counter,
            // otherwise a task finishing in between would be missed.
            let notified = self.idle.notified();
            if self.inflight.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}
