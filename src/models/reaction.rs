//! Reaction model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::blog::MetricField;

/// The two reaction kinds a user can place on a blog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionType {
    Like,
    Dislike,
}

impl ReactionType {
    pub fn opposite(&self) -> Self {
        match self {
            ReactionType::Like => ReactionType::Dislike,
            ReactionType::Dislike => ReactionType::Like,
        }
    }

    /// The counter column this reaction kind contributes to
    pub fn metric(&self) -> MetricField {
        match self {
            ReactionType::Like => MetricField::LikeCount,
            ReactionType::Dislike => MetricField::DislikeCount,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionType::Like => "like",
            ReactionType::Dislike => "dislike",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "like" => Some(ReactionType::Like),
            "dislike" => Some(ReactionType::Dislike),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored reaction row
///
/// At most one row exists per (blog_id, user_id) pair; the database
/// enforces this with a unique index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    pub id: i64,
    pub blog_id: i64,
    pub user_id: i64,
    pub reaction_type: ReactionType,
    pub created_at: DateTime<Utc>,
}
