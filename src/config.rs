//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{CacheError, Result};

/// Default number of entries held by the memory layer
pub const DEFAULT_MEMORY_CAPACITY: usize = 1000;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Name of the cache instance
    pub name: String,
    /// Directory holding the on-disk entries, None = platform cache directory
    pub directory: Option<PathBuf>,
    /// Maximum number of entries kept in memory
    pub memory_capacity: usize,
    /// Default TTL in seconds for saved entries, None = never expires
    pub default_ttl: Option<u64>,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_NAME` - Cache instance name (default: "default")
    /// - `CACHE_DIR` - On-disk directory (default: platform cache dir joined with the name)
    /// - `CACHE_MEMORY_CAPACITY` - Maximum in-memory entries (default: 1000)
    /// - `CACHE_DEFAULT_TTL` - Default TTL in seconds (default: entries never expire)
    pub fn from_env() -> Self {
        Self {
            name: env::var("CACHE_NAME")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| "default".to_string()),
            directory: env::var("CACHE_DIR")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            memory_capacity: env::var("CACHE_MEMORY_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MEMORY_CAPACITY),
            default_ttl: env::var("CACHE_DEFAULT_TTL")
                .ok()
                .and_then(|v| v.parse().ok()),
        }
    }

    /// Returns the default TTL as a Duration.
    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl.map(Duration::from_secs)
    }

    // == Directory Resolution ==
    /// Resolves the directory the cache persists to.
    ///
    /// Uses the explicit directory when configured, otherwise the platform's
    /// user cache directory joined with the cache name.
    pub fn resolve_directory(&self) -> Result<PathBuf> {
        match &self.directory {
            Some(dir) => Ok(dir.clone()),
            None => platform_cache_directory(&self.name),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            directory: None,
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            default_ttl: None,
        }
    }
}

/// Returns `<platform cache dir>/<name>`.
pub fn platform_cache_directory(name: &str) -> Result<PathBuf> {
    dirs::cache_dir()
        .map(|dir| dir.join(name))
        .ok_or_else(|| {
            CacheError::DirectoryResolution(
                "platform does not provide a user cache directory".to_string(),
            )
        })
}
