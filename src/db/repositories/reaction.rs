//! Reaction repository
//!
//! Database operations for per-user blog reactions. The unique index on
//! (blog_id, user_id) is the authoritative duplicate guard: `add` reports
//! a unique violation as `Ok(false)` rather than an error, and the
//! service layer maps that to its duplicate-reaction case. Checking for
//! an existing row first and then inserting would leave a race window.

use crate::models::{Reaction, ReactionType};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

/// Reaction repository trait
#[async_trait]
pub trait ReactionRepository: Send + Sync {
    /// Insert a reaction row
    ///
    /// Returns `Ok(false)` when a row for (blog_id, user_id) already
    /// exists, regardless of its type.
    async fn add(&self, blog_id: i64, user_id: i64, reaction_type: ReactionType) -> Result<bool>;

    /// Get the user's reaction on a blog, if any
    async fn get(&self, blog_id: i64, user_id: i64) -> Result<Option<Reaction>>;

    /// Remove the user's reaction on a blog
    ///
    /// Returns false if no row existed.
    async fn remove(&self, blog_id: i64, user_id: i64) -> Result<bool>;

    /// Switch an existing reaction to the given type
    ///
    /// Returns false if the user has no reaction row on this blog.
    async fn set_type(
        &self,
        blog_id: i64,
        user_id: i64,
        reaction_type: ReactionType,
    ) -> Result<bool>;
}

/// SQLx-based reaction repository implementation
pub struct SqlxReactionRepository {
    pool: SqlitePool,
}

impl SqlxReactionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: SqlitePool) -> Arc<dyn ReactionRepository> {
        Arc::new(Self::new(pool))
    }
}

/// Convert a database row to a Reaction
fn row_to_reaction(row: &SqliteRow) -> Result<Reaction> {
    let type_str: String = row.get("reaction_type");
    let reaction_type = ReactionType::from_str(&type_str)
        .ok_or_else(|| anyhow::anyhow!("Unknown reaction type in database: {}", type_str))?;
    let created_at: DateTime<Utc> = row.get("created_at");

    Ok(Reaction {
        id: row.get("id"),
        blog_id: row.get("blog_id"),
        user_id: row.get("user_id"),
        reaction_type,
        created_at,
    })
}

#[async_trait]
impl ReactionRepository for SqlxReactionRepository {
    async fn add(&self, blog_id: i64, user_id: i64, reaction_type: ReactionType) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO reactions (blog_id, user_id, reaction_type, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(blog_id)
        .bind(user_id)
        .bind(reaction_type.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(true),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Ok(false),
            Err(e) => Err(e).context("Failed to add reaction"),
        }
    }

    async fn get(&self, blog_id: i64, user_id: i64) -> Result<Option<Reaction>> {
        let row = sqlx::query(
            "SELECT id, blog_id, user_id, reaction_type, created_at \
             FROM reactions WHERE blog_id = ? AND user_id = ?",
        )
        .bind(blog_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get reaction")?;

        row.as_ref().map(row_to_reaction).transpose()
    }

    async fn remove(&self, blog_id: i64, user_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM reactions WHERE blog_id = ? AND user_id = ?")
            .bind(blog_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .context("Failed to remove reaction")?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_type(
        &self,
        blog_id: i64,
        user_id: i64,
        reaction_type: ReactionType,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE reactions SET reaction_type = ? WHERE blog_id = ? AND user_id = ?",
        )
        .bind(reaction_type.as_str())
        .bind(blog_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .context("Failed to switch reaction type")?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;
    use crate::db::pool::create_test_pool;

    async fn setup() -> Arc<dyn ReactionRepository> {
        let pool = create_test_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        sqlx::query("INSERT INTO users (username) VALUES ('alice'), ('bob')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO blogs (author_id, title, content) VALUES (1, 't', 'c')")
            .execute(&pool)
            .await
            .unwrap();
        SqlxReactionRepository::boxed(pool)
    }

    #[tokio::test]
    async fn test_add_and_get() {
        let repo = setup().await;

        assert!(repo.add(1, 1, ReactionType::Like).await.unwrap());

        let reaction = repo.get(1, 1).await.unwrap().unwrap();
        assert_eq!(reaction.reaction_type, ReactionType::Like);
        assert_eq!(reaction.blog_id, 1);
        assert_eq!(reaction.user_id, 1);
    }

    #[tokio::test]
    async fn test_add_duplicate_reports_false() {
        let repo = setup().await;

        assert!(repo.add(1, 1, ReactionType::Like).await.unwrap());
        // Same type and opposite type both collide on the unique index
        assert!(!repo.add(1, 1, ReactionType::Like).await.unwrap());
        assert!(!repo.add(1, 1, ReactionType::Dislike).await.unwrap());

        // The original reaction survives
        let reaction = repo.get(1, 1).await.unwrap().unwrap();
        assert_eq!(reaction.reaction_type, ReactionType::Like);
    }

    #[tokio::test]
    async fn test_different_users_can_react() {
        let repo = setup().await;

        assert!(repo.add(1, 1, ReactionType::Like).await.unwrap());
        assert!(repo.add(1, 2, ReactionType::Dislike).await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_deletes_by_blog_and_user() {
        let repo = setup().await;
        repo.add(1, 1, ReactionType::Like).await.unwrap();

        assert!(repo.remove(1, 1).await.unwrap());
        assert!(repo.get(1, 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_nonexistent_reports_false() {
        let repo = setup().await;
        assert!(!repo.remove(1, 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_set_type_flips_existing_row() {
        let repo = setup().await;
        repo.add(1, 1, ReactionType::Like).await.unwrap();

        assert!(repo.set_type(1, 1, ReactionType::Dislike).await.unwrap());
        let reaction = repo.get(1, 1).await.unwrap().unwrap();
        assert_eq!(reaction.reaction_type, ReactionType::Dislike);
    }

    #[tokio::test]
    async fn test_set_type_without_row_reports_false() {
        let repo = setup().await;
        assert!(!repo.set_type(1, 1, ReactionType::Like).await.unwrap());
    }
}
