//! Database layer
//!
//! SQLite-backed persistence for the Inkpost backend. The database is
//! the single source of truth; the cache layer only ever holds
//! disposable copies of what lives here.
//!
//! # Usage
//!
//! ```ignore
//! use inkpost::config::DatabaseConfig;
//! use inkpost::db::{create_pool, migrations};
//!
//! let config = DatabaseConfig::default();
//! let pool = create_pool(&config).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{create_pool, create_test_pool};
