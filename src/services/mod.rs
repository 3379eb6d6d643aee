//! Service layer
//!
//! Business logic sitting between the repositories and callers, plus
//! the task pool that runs work detached from the request path.

pub mod blog;
pub mod tasks;

pub use blog::{BlogService, BlogServiceError, BlogServiceSettings};
pub use tasks::TaskPool;
