//! Comment repository
//!
//! Database operations for blog comments. The blog's comment_count
//! column is owned by the blog repository; this repository only manages
//! the comment rows themselves.

use crate::models::{Comment, CreateCommentInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

/// Comment repository trait
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Create a new comment
    async fn create(&self, input: &CreateCommentInput) -> Result<Comment>;

    /// Get comment by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>>;

    /// List all comments for a blog, oldest first
    async fn list_by_blog(&self, blog_id: i64) -> Result<Vec<Comment>>;

    /// Delete a comment; returns false if no such row
    async fn delete(&self, id: i64) -> Result<bool>;
}

/// SQLx-based comment repository implementation
pub struct SqlxCommentRepository {
    pool: SqlitePool,
}

impl SqlxCommentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: SqlitePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }
}

/// Convert a database row to a Comment
fn row_to_comment(row: &SqliteRow) -> Comment {
    let created_at: DateTime<Utc> = row.get("created_at");
    Comment {
        id: row.get("id"),
        blog_id: row.get("blog_id"),
        author_id: row.get("author_id"),
        content: row.get("content"),
        created_at,
    }
}

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn create(&self, input: &CreateCommentInput) -> Result<Comment> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO comments (blog_id, author_id, content, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(input.blog_id)
        .bind(input.author_id)
        .bind(&input.content)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to create comment")?;

        Ok(Comment {
            id: result.last_insert_rowid(),
            blog_id: input.blog_id,
            author_id: input.author_id,
            content: input.content.clone(),
            created_at: now,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>> {
        let row = sqlx::query(
            "SELECT id, blog_id, author_id, content, created_at FROM comments WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get comment by id")?;

        Ok(row.as_ref().map(row_to_comment))
    }

    async fn list_by_blog(&self, blog_id: i64) -> Result<Vec<Comment>> {
        let rows = sqlx::query(
            "SELECT id, blog_id, author_id, content, created_at \
             FROM comments WHERE blog_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(blog_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list comments")?;

        Ok(rows.iter().map(row_to_comment).collect())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete comment")?;

        Ok(result.rows_affected() > 0)
    }
}
