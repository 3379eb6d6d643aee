//! Blog model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A published blog post with its engagement counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blog {
    pub id: i64,
    pub author_id: i64,
    pub title: String,
    pub content: String,
    /// Free-form tags, stored as a JSON array in the database
    pub tags: Vec<String>,
    pub view_count: i64,
    pub like_count: i64,
    pub dislike_count: i64,
    pub comment_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new blog post
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBlogInput {
    pub author_id: i64,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Input for updating an existing blog post
///
/// Only fields that are `Some` are applied; the rest keep their stored
/// values. Engagement counters are never updatable through this path.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateBlogInput {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl UpdateBlogInput {
    pub fn has_changes(&self) -> bool {
        self.title.is_some() || self.content.is_some() || self.tags.is_some()
    }
}

/// Engagement counter columns on a blog row
///
/// Counter adjustments go through atomic in-place updates keyed on this
/// enum, never through read-modify-write of a full row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricField {
    ViewCount,
    LikeCount,
    DislikeCount,
    CommentCount,
}

impl MetricField {
    /// Column name in the blogs table
    pub fn column(&self) -> &'static str {
        match self {
            MetricField::ViewCount => "view_count",
            MetricField::LikeCount => "like_count",
            MetricField::DislikeCount => "dislike_count",
            MetricField::CommentCount => "comment_count",
        }
    }
}

impl std::fmt::Display for MetricField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column())
    }
}

/// Sort field for blog listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    CreatedAt,
    ViewCount,
    LikeCount,
}

impl SortField {
    pub fn column(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::ViewCount => "view_count",
            SortField::LikeCount => "like_count",
        }
    }

    /// Stable name used in cache keys
    pub fn key_name(&self) -> &'static str {
        self.column()
    }
}

/// Pagination parameters for list endpoints
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ListParams {
    pub page: u32,
    pub limit: u32,
    #[serde(default)]
    pub sort: SortField,
}

impl ListParams {
    /// Create params with sane bounds: page >= 1, limit in 1..=100
    pub fn new(page: u32, limit: u32, sort: SortField) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, 100),
            sort,
        }
    }

    pub fn offset(&self) -> u32 {
        // Fields are public and deserializable, so a page of 0 can
        // reach here without going through new()'s clamping.
        (self.page.max(1) - 1) * self.limit
    }
}

impl Default for ListParams {
    fn default() -> Self {
        Self::new(1, 20, SortField::CreatedAt)
    }
}

/// Paginated result wrapper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total: i64, params: &ListParams) -> Self {
        Self {
            items,
            total,
            page: params.page,
            limit: params.limit,
        }
    }

    pub fn has_next(&self) -> bool {
        (self.page as i64) * (self.limit as i64) < self.total
    }
}
