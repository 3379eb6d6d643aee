//! Data models for the Inkpost backend

pub mod blog;
pub mod comment;
pub mod history;
pub mod reaction;
pub mod user;

pub use blog::{Blog, CreateBlogInput, ListParams, MetricField, PagedResult, SortField, UpdateBlogInput};
pub use comment::{Comment, CreateCommentInput};
pub use history::ReadHistory;
pub use reaction::{Reaction, ReactionType};
pub use user::{User, UserRole};
