//! Cache Module
//!
//! Two-tier caching: a bounded in-memory layer in front of a durable
//! one-file-per-key disk layer, with lazily checked expiration.

mod codec;
mod disk;
mod engine;
mod entry;
mod keys;
mod memory;
mod stats;


// Re-export public types
pub use codec::{Codec, JsonCodec};
pub use disk::DiskStore;
pub use engine::{Cache, RemovalFailure, RemovalReport};
pub use entry::{distant_future, CacheEntry};
pub use keys::{validate_key, KeyPathMapper, FILE_EXTENSION, MAX_KEY_LENGTH};
pub use memory::{LruMemoryStore, MemoryStore};
pub use stats::CacheStats;
