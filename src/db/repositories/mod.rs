//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles CRUD operations for a specific entity.

pub mod blog;
pub mod comment;
pub mod history;
pub mod reaction;
pub mod user;

pub use blog::{BlogRepository, SqlxBlogRepository};
pub use comment::{CommentRepository, SqlxCommentRepository};
pub use history::{ReadHistoryRepository, SqlxReadHistoryRepository};
pub use reaction::{ReactionRepository, SqlxReactionRepository};
pub use user::{SqlxUserRepository, UserRepository};
