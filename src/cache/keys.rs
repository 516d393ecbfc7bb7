//! Key Mapping Module
//!
//! Maps cache keys to files inside the cache directory and back.

use std::path::{Path, PathBuf};

use crate::error::{CacheError, Result};

/// Extension given to every entry file
pub const FILE_EXTENSION: &str = "cache";

/// Longest key whose `<key>.cache` file name still fits in 255 bytes
pub const MAX_KEY_LENGTH: usize = 255 - (FILE_EXTENSION.len() + 1);

// == Key Path Mapper ==
/// Deterministic mapping from key to `<directory>/<key>.cache`.
#[derive(Debug, Clone)]
pub struct KeyPathMapper {
    directory: PathBuf,
}

impl KeyPathMapper {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Returns the storage path for a key. Pure; performs no I/O.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.directory.join(format!("{}.{}", key, FILE_EXTENSION))
    }

    /// Recovers the key from an entry file path, or None for foreign files.
    pub fn key_for(path: &Path) -> Option<String> {
        if path.extension()? != FILE_EXTENSION {
            return None;
        }
        path.file_stem()?.to_str().map(str::to_string)
    }
}

// == Key Validation ==
/// Rejects keys that would not map to exactly one file in the cache directory.
pub fn validate_key(key: &str) -> Result<()> {
    let reason = if key.is_empty() {
        Some("key cannot be empty")
    } else if key.len() > MAX_KEY_LENGTH {
        Some("key exceeds maximum length")
    } else if key == "." || key == ".." {
        Some("key cannot be a relative directory name")
    } else if key.contains(['/', '\\', '\0']) {
        Some("key cannot contain path separators or NUL")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(CacheError::InvalidKey(format!("{:?}: {}", key, reason))),
        None => Ok(()),
    }
}
