//! Read history repository
//!
//! Tracks which blogs each user has read and maintains the per-user tag
//! affinity counters that drive recommendations. Both tables use upserts
//! so re-reads bump timestamps and weights instead of erroring.

use crate::models::ReadHistory;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

/// Read history repository trait
#[async_trait]
pub trait ReadHistoryRepository: Send + Sync {
    /// Record that a user read a blog
    ///
    /// Re-reading refreshes `read_at` on the existing row.
    async fn record(&self, user_id: i64, blog_id: i64) -> Result<()>;

    /// Most recent reads for a user, newest first
    async fn list_for_user(&self, user_id: i64, limit: i64) -> Result<Vec<ReadHistory>>;

    /// Bump the affinity weight for each tag by one
    async fn bump_tag_affinity(&self, user_id: i64, tags: &[String]) -> Result<()>;

    /// The user's highest-weighted tags
    async fn top_tags(&self, user_id: i64, limit: i64) -> Result<Vec<String>>;
}

/// SQLx-based read history repository implementation
pub struct SqlxReadHistoryRepository {
    pool: SqlitePool,
}

impl SqlxReadHistoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: SqlitePool) -> Arc<dyn ReadHistoryRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ReadHistoryRepository for SqlxReadHistoryRepository {
    async fn record(&self, user_id: i64, blog_id: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO read_history (user_id, blog_id, read_at)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id, blog_id) DO UPDATE SET read_at = excluded.read_at
            "#,
        )
        .bind(user_id)
        .bind(blog_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to record read history")?;

        Ok(())
    }

    async fn list_for_user(&self, user_id: i64, limit: i64) -> Result<Vec<ReadHistory>> {
        let rows = sqlx::query(
            "SELECT id, user_id, blog_id, read_at \
             FROM read_history WHERE user_id = ? ORDER BY read_at DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list read history")?;

        Ok(rows
            .iter()
            .map(|row| {
                let read_at: DateTime<Utc> = row.get("read_at");
                ReadHistory {
                    id: row.get("id"),
                    user_id: row.get("user_id"),
                    blog_id: row.get("blog_id"),
                    read_at,
                }
            })
            .collect())
    }

    async fn bump_tag_affinity(&self, user_id: i64, tags: &[String]) -> Result<()> {
        for tag in tags {
            sqlx::query(
                r#"
                INSERT INTO tag_affinity (user_id, tag, weight)
                VALUES (?, ?, 1)
                ON CONFLICT(user_id, tag) DO UPDATE SET weight = weight + 1
                "#,
            )
            .bind(user_id)
            .bind(tag)
            .execute(&self.pool)
            .await
            .context("Failed to bump tag affinity")?;
        }

        Ok(())
    }

    async fn top_tags(&self, user_id: i64, limit: i64) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT tag FROM tag_affinity WHERE user_id = ? ORDER BY weight DESC, tag ASC LIMIT ?",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to get top tags")?;

        Ok(rows.iter().map(|row| row.get("tag")).collect())
    }
}
