//! Read history model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A record of a user having read a blog post
///
/// One row per (user_id, blog_id) pair; re-reading bumps `read_at`
/// instead of inserting a duplicate. Read history feeds the per-user
/// tag affinity table that drives recommendations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadHistory {
    pub id: i64,
    pub user_id: i64,
    pub blog_id: i64,
    pub read_at: DateTime<Utc>,
}
