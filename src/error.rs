//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use std::path::PathBuf;

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Disk read, write, delete or listing failure
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Stored bytes do not decode to the expected entry shape
    #[error("Codec error: {0}")]
    Codec(String),

    /// No entry is stored under the key
    #[error("Key not found: {0}")]
    NotFound(String),

    /// The platform could not supply a cache directory
    #[error("Unable to resolve cache directory: {0}")]
    DirectoryResolution(String),

    /// Key cannot be mapped to a file inside the cache directory
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// No Tokio runtime is available to schedule operations on
    #[error("Runtime unavailable: {0}")]
    Runtime(String),

    /// Background task ended before reporting a result
    #[error("Operation interrupted: {0}")]
    Interrupted(String),
}

impl CacheError {
    // == I/O Helper ==
    /// Wraps an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns true for the `NotFound` variant.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound(_))
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Codec(err.to_string())
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
