//! Cache Engine Module
//!
//! Orchestrates the memory and disk layers behind the public save, fetch,
//! remove and remove-all operations. Every operation runs as a task on the
//! cache's Tokio runtime and reports through a completion callback.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::cache::codec::{Codec, JsonCodec};
use crate::cache::disk::DiskStore;
use crate::cache::keys::{validate_key, KeyPathMapper};
use crate::cache::memory::{LruMemoryStore, MemoryStore};
use crate::cache::{CacheEntry, CacheStats};
use crate::config::{platform_cache_directory, CacheConfig, DEFAULT_MEMORY_CAPACITY};
use crate::error::{CacheError, Result};

/// Handle to the runtime the caller is running on.
fn current_runtime() -> Result<Handle> {
    Handle::try_current().map_err(|e| CacheError::Runtime(e.to_string()))
}

// == Removal Report ==
/// Outcome of a best-effort `remove_all`.
#[derive(Debug, Default)]
pub struct RemovalReport {
    /// Keys whose files were deleted
    pub removed: Vec<String>,
    /// Keys that could not be deleted
    pub failures: Vec<RemovalFailure>,
}

/// A single failure during `remove_all`.
#[derive(Debug)]
pub struct RemovalFailure {
    /// Key being deleted, None when the directory itself could not be listed
    pub key: Option<String>,
    pub error: CacheError,
}

impl RemovalReport {
    /// Returns true when every on-disk entry was deleted.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

// == Cache ==
/// Two-tier cache of values of type `V`, encoded on disk with codec `C`.
///
/// Cloning yields another handle to the same cache. Tasks already scheduled
/// when the last handle is dropped end without invoking their callbacks.
pub struct Cache<V, C = JsonCodec> {
    inner: Arc<CacheInner<V, C>>,
    runtime: Handle,
    default_ttl: Option<Duration>,
}

struct CacheInner<V, C> {
    name: String,
    memory: Mutex<Box<dyn MemoryStore<V>>>,
    disk: DiskStore<V, C>,
    stats: Mutex<CacheStats>,
}

impl<V, C> Clone for Cache<V, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            runtime: self.runtime.clone(),
            default_ttl: self.default_ttl,
        }
    }
}

impl<V> Cache<V, JsonCodec>
where
    V: Serialize + DeserializeOwned + Clone + Send + 'static,
{
    // == Constructors ==
    /// Opens a JSON-encoded cache persisting to `cache_directory`.
    ///
    /// Pure configuration: nothing is created on disk until the first save.
    ///
    /// # Panics
    /// Panics when called outside a Tokio runtime.
    pub fn open(name: impl Into<String>, cache_directory: impl Into<PathBuf>) -> Self {
        Self::with_parts(
            name,
            cache_directory,
            LruMemoryStore::new(DEFAULT_MEMORY_CAPACITY),
            JsonCodec,
            Handle::current(),
        )
    }

    /// Like `open`, but fails with `CacheError::Runtime` outside a Tokio
    /// runtime instead of panicking.
    pub fn try_open(name: impl Into<String>, cache_directory: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self::with_parts(
            name,
            cache_directory,
            LruMemoryStore::new(DEFAULT_MEMORY_CAPACITY),
            JsonCodec,
            current_runtime()?,
        ))
    }

    /// Opens a cache under the platform's user cache directory, in a
    /// subdirectory named after the cache.
    pub fn open_default(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let directory = platform_cache_directory(&name)?;
        Self::try_open(name, directory)
    }

    /// Creates a cache from configuration.
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        let directory = config.resolve_directory()?;
        let cache = Self::with_parts(
            config.name.clone(),
            directory,
            LruMemoryStore::new(config.memory_capacity),
            JsonCodec,
            current_runtime()?,
        );

        Ok(match config.default_ttl() {
            Some(ttl) => cache.with_default_ttl(ttl),
            None => cache,
        })
    }
}

impl<V, C> Cache<V, C>
where
    V: Clone + Send + 'static,
    C: Codec<V>,
{
    /// Creates a cache from explicitly injected parts.
    ///
    /// # Arguments
    /// * `name` - Name of the cache instance
    /// * `directory` - Directory holding one file per key
    /// * `memory` - Bounded memory layer
    /// * `codec` - Encoding of entries on disk
    /// * `runtime` - Runtime every operation is scheduled on
    pub fn with_parts(
        name: impl Into<String>,
        directory: impl Into<PathBuf>,
        memory: impl MemoryStore<V>,
        codec: C,
        runtime: Handle,
    ) -> Self {
        let name = name.into();
        let mapper = KeyPathMapper::new(directory);
        info!(
            cache = %name,
            directory = %mapper.directory().display(),
            "Opened cache"
        );

        Self {
            inner: Arc::new(CacheInner {
                name,
                memory: Mutex::new(Box::new(memory)),
                disk: DiskStore::new(mapper, codec),
                stats: Mutex::new(CacheStats::new()),
            }),
            runtime,
            default_ttl: None,
        }
    }

    /// Sets the TTL applied by `save`. Without one, entries never expire.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    // == Accessors ==
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn directory(&self) -> &Path {
        self.inner.disk.mapper().directory()
    }

    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }

    /// Snapshot of lookup statistics, including existence checks made by
    /// non-updating saves.
    pub fn stats(&self) -> CacheStats {
        self.inner.stats().clone()
    }

    /// Number of entries currently held by the memory layer.
    pub fn memory_len(&self) -> usize {
        self.inner.memory().len()
    }

    // == Save ==
    /// Saves `value` under `key` with the cache's default TTL.
    ///
    /// When an unexpired entry already exists and `update` is false, nothing
    /// is written and the callback receives `Ok(())`. Otherwise the entry is
    /// written to memory, then to disk; a disk failure is reported but the
    /// memory layer keeps the new entry.
    pub fn save<F>(&self, value: V, key: impl Into<String>, update: bool, callback: F)
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        self.save_with_ttl(value, key, update, self.default_ttl, callback);
    }

    /// Saves `value` under `key`, expiring `ttl` from now (never when None).
    pub fn save_with_ttl<F>(
        &self,
        value: V,
        key: impl Into<String>,
        update: bool,
        ttl: Option<Duration>,
        callback: F,
    ) where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        let key = key.into();
        self.spawn(move |inner| async move {
            callback(inner.store(value, key, update, ttl).await);
        });
    }

    // == Fetch ==
    /// Fetches the value stored under `key`.
    ///
    /// Missing, undecodable and expired entries all yield `None`.
    pub fn fetch<F>(&self, key: impl Into<String>, callback: F)
    where
        F: FnOnce(Option<V>) + Send + 'static,
    {
        let key = key.into();
        self.spawn(move |inner| async move {
            let value = match validate_key(&key) {
                Ok(()) => inner.load(&key).await.map(CacheEntry::into_value),
                Err(_) => None,
            };
            callback(value);
        });
    }

    // == Remove Item ==
    /// Removes `key` from memory immediately, then deletes its file.
    ///
    /// The callback receives `NotFound` when no file existed.
    pub fn remove_item<F>(&self, key: impl Into<String>, callback: F)
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        let key = key.into();
        self.inner.memory().remove(&key);
        self.spawn(move |inner| async move {
            callback(inner.remove_from_disk(&key).await);
        });
    }

    // == Remove All ==
    /// Clears memory immediately, then deletes every entry file.
    ///
    /// Best effort: individual failures are collected in the report rather
    /// than aborting the sweep, and the callback never receives an error.
    pub fn remove_all<F>(&self, callback: F)
    where
        F: FnOnce(RemovalReport) + Send + 'static,
    {
        self.inner.memory().remove_all();
        self.spawn(move |inner| async move {
            callback(inner.purge_disk().await);
        });
    }

    // == Awaitable Forms ==
    pub async fn save_async(&self, value: V, key: impl Into<String>, update: bool) -> Result<()> {
        self.save_with_ttl_async(value, key, update, self.default_ttl)
            .await
    }

    pub async fn save_with_ttl_async(
        &self,
        value: V,
        key: impl Into<String>,
        update: bool,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.save_with_ttl(value, key, update, ttl, move |result| {
            let _ = tx.send(result);
        });
        rx.await
            .map_err(|_| CacheError::Interrupted("save".to_string()))?
    }

    pub async fn fetch_async(&self, key: impl Into<String>) -> Option<V> {
        let (tx, rx) = oneshot::channel();
        self.fetch(key, move |value| {
            let _ = tx.send(value);
        });
        rx.await.ok().flatten()
    }

    pub async fn remove_item_async(&self, key: impl Into<String>) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.remove_item(key, move |result| {
            let _ = tx.send(result);
        });
        rx.await
            .map_err(|_| CacheError::Interrupted("remove_item".to_string()))?
    }

    pub async fn remove_all_async(&self) -> Result<RemovalReport> {
        let (tx, rx) = oneshot::channel();
        self.remove_all(move |report| {
            let _ = tx.send(report);
        });
        rx.await
            .map_err(|_| CacheError::Interrupted("remove_all".to_string()))
    }

    // == Scheduling ==
    /// Runs `task` on the cache runtime if the cache is still alive when the
    /// task starts.
    fn spawn<F, Fut>(&self, task: F)
    where
        F: FnOnce(Arc<CacheInner<V, C>>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let weak = Arc::downgrade(&self.inner);
        self.runtime.spawn(async move {
            let Some(inner) = weak.upgrade() else {
                debug!("Cache dropped before task started, skipping");
                return;
            };
            task(inner).await;
        });
    }
}

impl<V, C> CacheInner<V, C>
where
    V: Clone + Send + 'static,
    C: Codec<V>,
{
    fn memory(&self) -> MutexGuard<'_, Box<dyn MemoryStore<V>>> {
        self.memory.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stats(&self) -> MutexGuard<'_, CacheStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // == Load ==
    /// Looks `key` up in memory, then on disk.
    ///
    /// A live disk hit is copied into memory. Expired entries are reported
    /// as absent but left in place.
    async fn load(&self, key: &str) -> Option<CacheEntry<V>> {
        let now = Utc::now();

        let cached = self.memory().get(key);
        if let Some(entry) = cached {
            if entry.is_expired(now) {
                debug!(cache = %self.name, key, "Memory entry expired");
                self.stats().record_miss();
                return None;
            }
            self.stats().record_memory_hit();
            return Some(entry);
        }

        match self.disk.read(key).await {
            Ok(entry) if entry.is_expired(now) => {
                debug!(cache = %self.name, key, "Disk entry expired");
                self.stats().record_miss();
                None
            }
            Ok(entry) => {
                self.memory().set(key.to_string(), entry.clone());
                self.stats().record_disk_hit();
                Some(entry)
            }
            Err(CacheError::NotFound(_)) => {
                self.stats().record_miss();
                None
            }
            Err(err) => {
                warn!(cache = %self.name, key, error = %err, "Ignoring unreadable disk entry");
                self.stats().record_miss();
                None
            }
        }
    }

    // == Store ==
    async fn store(&self, value: V, key: String, update: bool, ttl: Option<Duration>) -> Result<()> {
        validate_key(&key)?;

        if !update && self.load(&key).await.is_some() {
            debug!(cache = %self.name, key = %key, "Entry exists, leaving it in place");
            return Ok(());
        }

        let entry = CacheEntry::with_ttl(value, ttl);
        self.memory().set(key.clone(), entry.clone());

        // Encode before awaiting so the task never holds a borrow of the value
        let bytes = self.disk.encode(&entry)?;

        match self.disk.write_bytes(&key, bytes).await {
            Ok(()) => {
                debug!(cache = %self.name, key = %key, "Saved entry");
                Ok(())
            }
            Err(err) => {
                warn!(cache = %self.name, key = %key, error = %err, "Failed to persist entry");
                Err(err)
            }
        }
    }

    async fn remove_from_disk(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        self.disk.delete(key).await?;
        debug!(cache = %self.name, key, "Removed entry");
        Ok(())
    }

    // == Purge ==
    async fn purge_disk(&self) -> RemovalReport {
        let mut report = RemovalReport::default();

        let keys = match self.disk.list_keys().await {
            Ok(keys) => keys,
            Err(error) => {
                warn!(cache = %self.name, error = %error, "Failed to list cached entries");
                report.failures.push(RemovalFailure { key: None, error });
                return report;
            }
        };

        for key in keys {
            match self.disk.delete(&key).await {
                Ok(()) => report.removed.push(key),
                Err(error) => {
                    warn!(cache = %self.name, key = %key, error = %error, "Failed to remove entry");
                    report.failures.push(RemovalFailure {
                        key: Some(key),
                        error,
                    });
                }
            }
        }

        info!(
            cache = %self.name,
            removed = report.removed.len(),
            failed = report.failures.len(),
            "Cleared cache"
        );
        report
    }
}
