//! Tiered Cache - A two-tier object cache
//!
//! Keeps values in a bounded in-memory layer backed by a durable on-disk
//! layer, with per-entry expiration and callback-based asynchronous access.
//!
//! ```no_run
//! # async fn demo() -> tiered_cache::Result<()> {
//! use tiered_cache::Cache;
//!
//! let cache: Cache<String> = Cache::open("greetings", "/tmp/greetings");
//! cache.save_async("hello".to_string(), "greeting", false).await?;
//! assert_eq!(cache.fetch_async("greeting").await.as_deref(), Some("hello"));
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{Cache, CacheEntry, CacheStats, Codec, JsonCodec, MemoryStore, RemovalReport};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
