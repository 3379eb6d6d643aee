//! User repository
//!
//! Database operations for users. Authentication lives in the consuming
//! application; this repository only covers what the engagement layer
//! needs, identity and role lookups for authorization checks.

use crate::models::{User, UserRole};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user
    async fn create(&self, username: &str, role: UserRole) -> Result<User>;

    /// Get user by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get just the role for a user
    async fn get_role(&self, id: i64) -> Result<Option<UserRole>>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: SqlitePool,
}

impl SqlxUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: SqlitePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

/// Convert a database row to a User
fn row_to_user(row: &SqliteRow) -> Result<User> {
    let role_str: String = row.get("role");
    let role = UserRole::from_str(&role_str)
        .ok_or_else(|| anyhow::anyhow!("Unknown user role in database: {}", role_str))?;
    let created_at: DateTime<Utc> = row.get("created_at");

    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        role,
        created_at,
    })
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, username: &str, role: UserRole) -> Result<User> {
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO users (username, role, created_at) VALUES (?, ?, ?)",
        )
        .bind(username)
        .bind(role.as_str())
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to create user")?;

        Ok(User {
            id: result.last_insert_rowid(),
            username: username.to_string(),
            role,
            created_at: now,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, username, role, created_at FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get user by id")?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn get_role(&self, id: i64) -> Result<Option<UserRole>> {
        let row = sqlx::query("SELECT role FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get user role")?;

        match row {
            Some(row) => {
                let role_str: String = row.get("role");
                let role = UserRole::from_str(&role_str).ok_or_else(|| {
                    anyhow::anyhow!("Unknown user role in database: {}", role_str)
                })?;
                Ok(Some(role))
            }
            None => Ok(None),
        }
    }
}
