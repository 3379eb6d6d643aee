//! Blog repository
//!
//! Database operations for blog posts and their engagement counters.
//!
//! Counter columns are only ever changed through `update_metric`, which
//! issues an atomic in-place `SET col = col + delta`. Reading a row,
//! adding in Rust and writing it back would lose concurrent updates.

use crate::models::{Blog, CreateBlogInput, ListParams, MetricField, UpdateBlogInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

/// Blog repository trait
#[async_trait]
pub trait BlogRepository: Send + Sync {
    /// Create a new blog post
    async fn create(&self, input: &CreateBlogInput) -> Result<Blog>;

    /// Get blog by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Blog>>;

    /// List blogs with pagination and sorting
    async fn list(&self, params: &ListParams) -> Result<Vec<Blog>>;

    /// Count total blogs
    async fn count(&self) -> Result<i64>;

    /// List all blogs by an author, newest first
    async fn list_by_author(&self, author_id: i64) -> Result<Vec<Blog>>;

    /// Search blogs by keyword in title or tags
    async fn search(&self, keyword: &str, limit: i64) -> Result<Vec<Blog>>;

    /// Update a blog's editable fields
    async fn update(&self, id: i64, input: &UpdateBlogInput) -> Result<Blog>;

    /// Delete a blog; returns false if no such row
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Atomically adjust one engagement counter by `delta`
    ///
    /// Returns false if the blog does not exist.
    async fn update_metric(&self, id: i64, field: MetricField, delta: i64) -> Result<bool>;

    /// Blogs carrying any of `tags` that `user_id` has not read yet,
    /// most-viewed first
    async fn list_unread_by_tags(
        &self,
        user_id: i64,
        tags: &[String],
        limit: i64,
    ) -> Result<Vec<Blog>>;
}

/// SQLx-based blog repository implementation
pub struct SqlxBlogRepository {
    pool: SqlitePool,
}

impl SqlxBlogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: SqlitePool) -> Arc<dyn BlogRepository> {
        Arc::new(Self::new(pool))
    }
}

/// Convert a database row to a Blog
fn row_to_blog(row: &SqliteRow) -> Result<Blog> {
    let tags_json: String = row.get("tags");
    let tags: Vec<String> =
        serde_json::from_str(&tags_json).context("Failed to parse blog tags column")?;
    let created_at: DateTime<Utc> = row.get("created_at");
    let updated_at: DateTime<Utc> = row.get("updated_at");

    Ok(Blog {
        id: row.get("id"),
        author_id: row.get("author_id"),
        title: row.get("title"),
        content: row.get("content"),
        tags,
        view_count: row.get("view_count"),
        like_count: row.get("like_count"),
        dislike_count: row.get("dislike_count"),
        comment_count: row.get("comment_count"),
        created_at,
        updated_at,
    })
}

const BLOG_COLUMNS: &str = "id, author_id, title, content, tags, view_count, like_count, \
                            dislike_count, comment_count, created_at, updated_at";

#[async_trait]
impl BlogRepository for SqlxBlogRepository {
    async fn create(&self, input: &CreateBlogInput) -> Result<Blog> {
        let now = Utc::now();
        let tags_json =
            serde_json::to_string(&input.tags).context("Failed to serialize blog tags")?;

        let result = sqlx::query(
            r#"
            INSERT INTO blogs (author_id, title, content, tags, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(input.author_id)
        .bind(&input.title)
        .bind(&input.content)
        .bind(&tags_json)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to create blog")?;

        let id = result.last_insert_rowid();

        Ok(Blog {
            id,
            author_id: input.author_id,
            title: input.title.clone(),
            content: input.content.clone(),
            tags: input.tags.clone(),
            view_count: 0,
            like_count: 0,
            dislike_count: 0,
            comment_count: 0,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Blog>> {
        let row = sqlx::query(&format!("SELECT {BLOG_COLUMNS} FROM blogs WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get blog by id")?;

        row.as_ref().map(row_to_blog).transpose()
    }

    async fn list(&self, params: &ListParams) -> Result<Vec<Blog>> {
        // Sort column comes from an enum, never from user input
        let query = format!(
            "SELECT {BLOG_COLUMNS} FROM blogs ORDER BY {} DESC LIMIT ? OFFSET ?",
            params.sort.column()
        );

        let rows = sqlx::query(&query)
            .bind(params.limit as i64)
            .bind(params.offset() as i64)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list blogs")?;

        rows.iter().map(row_to_blog).collect()
    }

    async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM blogs")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count blogs")?;
        Ok(row.get("count"))
    }

    async fn list_by_author(&self, author_id: i64) -> Result<Vec<Blog>> {
        let rows = sqlx::query(&format!(
            "SELECT {BLOG_COLUMNS} FROM blogs WHERE author_id = ? ORDER BY created_at DESC"
        ))
        .bind(author_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list blogs by author")?;

        rows.iter().map(row_to_blog).collect()
    }

    async fn search(&self, keyword: &str, limit: i64) -> Result<Vec<Blog>> {
        let pattern = format!("%{}%", keyword);
        let rows = sqlx::query(&format!(
            "SELECT {BLOG_COLUMNS} FROM blogs \
             WHERE title LIKE ? OR tags LIKE ? \
             ORDER BY created_at DESC LIMIT ?"
        ))
        .bind(&pattern)
        .bind(&pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to search blogs")?;

        rows.iter().map(row_to_blog).collect()
    }

    async fn update(&self, id: i64, input: &UpdateBlogInput) -> Result<Blog> {
        // Fetch existing to merge with partial input
        let existing = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Blog not found: {}", id))?;

        let title = input.title.clone().unwrap_or(existing.title);
        let content = input.content.clone().unwrap_or(existing.content);
        let tags = input.tags.clone().unwrap_or(existing.tags);
        let tags_json = serde_json::to_string(&tags).context("Failed to serialize blog tags")?;
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE blogs SET title = ?, content = ?, tags = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&title)
        .bind(&content)
        .bind(&tags_json)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to update blog")?;

        Ok(Blog {
            title,
            content,
            tags,
            updated_at: now,
            ..existing
        })
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM blogs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete blog")?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_metric(&self, id: i64, field: MetricField, delta: i64) -> Result<bool> {
        // Column name comes from an enum, never from user input
        let query = format!(
            "UPDATE blogs SET {col} = {col} + ? WHERE id = ?",
            col = field.column()
        );

        let result = sqlx::query(&query)
            .bind(delta)
            .bind(id)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to update {} for blog {}", field, id))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_unread_by_tags(
        &self,
        user_id: i64,
        tags: &[String],
        limit: i64,
    ) -> Result<Vec<Blog>> {
        if tags.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; tags.len()].join(", ");
        let query = format!(
            "SELECT {BLOG_COLUMNS} FROM blogs b \
             WHERE EXISTS (SELECT 1 FROM json_each(b.tags) WHERE json_each.value IN ({placeholders})) \
               AND b.author_id != ? \
               AND b.id NOT IN (SELECT blog_id FROM read_history WHERE user_id = ?) \
             ORDER BY b.view_count DESC, b.like_count DESC \
             LIMIT ?"
        );

        let mut q = sqlx::query(&query);
        for tag in tags {
            q = q.bind(tag);
        }
        let rows = q
            .bind(user_id)
            .bind(user_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list unread blogs by tags")?;

        rows.iter().map(row_to_blog).collect()
    }
}
