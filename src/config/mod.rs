//! Configuration management
//!
//! This module handles loading and parsing configuration for the Inkpost
//! backend. Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
    /// Service timeout configuration
    #[serde(default)]
    pub service: ServiceConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database path (or `:memory:`)
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/inkpost.db".to_string()
}

/// Cache configuration
///
/// TTLs are split into three classes: blog detail entries live longest,
/// list/search/by-user entries refresh faster, comment lists fastest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache driver (memory or redis)
    #[serde(default)]
    pub driver: CacheDriver,
    /// Redis connection URL (required for the redis driver)
    #[serde(default)]
    pub redis_url: Option<String>,
    /// Per-call timeout for cache store operations, in seconds
    #[serde(default = "default_cache_op_timeout")]
    pub op_timeout_secs: u64,
    /// TTL for individual blog detail entries, in seconds
    #[serde(default = "default_detail_ttl")]
    pub detail_ttl_secs: u64,
    /// TTL for blog list/search/by-user entries, in seconds
    #[serde(default = "default_list_ttl")]
    pub list_ttl_secs: u64,
    /// TTL for comment list entries, in seconds
    #[serde(default = "default_comment_ttl")]
    pub comment_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            driver: CacheDriver::default(),
            redis_url: None,
            op_timeout_secs: default_cache_op_timeout(),
            detail_ttl_secs: default_detail_ttl(),
            list_ttl_secs: default_list_ttl(),
            comment_ttl_secs: default_comment_ttl(),
        }
    }
}

impl CacheConfig {
    /// Per-call cache operation timeout as a `Duration`
    pub fn op_timeout(&self) -> Duration {
        Duration::from_secs(self.op_timeout_secs)
    }

    /// Blog detail TTL as a `Duration`
    pub fn detail_ttl(&self) -> Duration {
        Duration::from_secs(self.detail_ttl_secs)
    }

    /// List/search/by-user TTL as a `Duration`
    pub fn list_ttl(&self) -> Duration {
        Duration::from_secs(self.list_ttl_secs)
    }

    /// Comment list TTL as a `Duration`
    pub fn comment_ttl(&self) -> Duration {
        Duration::from_secs(self.comment_ttl_secs)
    }
}

fn default_cache_op_timeout() -> u64 {
    2
}

fn default_detail_ttl() -> u64 {
    600
}

fn default_list_ttl() -> u64 {
    300
}

fn default_comment_ttl() -> u64 {
    120
}

/// Cache driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheDriver {
    /// In-memory cache (default)
    #[default]
    Memory,
    /// Redis cache
    Redis,
}

/// Service timeout configuration
///
/// Two deadline tiers: the request-scoped timeout governs the synchronous
/// authoritative path; the background timeout governs detached invalidation
/// and counter-adjustment tasks that outlive the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Timeout for the synchronous request path, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Timeout budget for detached background tasks, in seconds
    #[serde(default = "default_background_timeout")]
    pub background_timeout_secs: u64,
    /// Timeout budget for the detached view-count increment, in seconds
    #[serde(default = "default_view_count_timeout")]
    pub view_count_timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            background_timeout_secs: default_background_timeout(),
            view_count_timeout_secs: default_view_count_timeout(),
        }
    }
}

impl ServiceConfig {
    /// Request-scoped timeout as a `Duration`
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Background task timeout as a `Duration`
    pub fn background_timeout(&self) -> Duration {
        Duration::from_secs(self.background_timeout_secs)
    }

    /// View-count increment timeout as a `Duration`
    pub fn view_count_timeout(&self) -> Duration {
        Duration::from_secs(self.view_count_timeout_secs)
    }
}

fn default_request_timeout() -> u64 {
    30
}

fn default_background_timeout() -> u64 {
    10
}

fn default_view_count_timeout() -> u64 {
    5
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist or is empty, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - INKPOST_DATABASE_URL
    /// - INKPOST_CACHE_DRIVER
    /// - INKPOST_CACHE_REDIS_URL
    /// - INKPOST_CACHE_OP_TIMEOUT_SECS
    /// - INKPOST_REQUEST_TIMEOUT_SECS
    /// - INKPOST_BACKGROUND_TIMEOUT_SECS
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("INKPOST_DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(driver) = std::env::var("INKPOST_CACHE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "memory" => self.cache.driver = CacheDriver::Memory,
                "redis" => self.cache.driver = CacheDriver::Redis,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(redis_url) = std::env::var("INKPOST_CACHE_REDIS_URL") {
            self.cache.redis_url = Some(redis_url);
        }
        if let Ok(secs) = std::env::var("INKPOST_CACHE_OP_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse::<u64>() {
                self.cache.op_timeout_secs = secs;
            }
        }

        if let Ok(secs) = std::env::var("INKPOST_REQUEST_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse::<u64>() {
                self.service.request_timeout_secs = secs;
            }
        }
        if let Ok(secs) = std::env::var("INKPOST_BACKGROUND_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse::<u64>() {
                self.service.background_timeout_secs = secs;
            }
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared mutex for config tests that modify environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
