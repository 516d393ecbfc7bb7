//! Memory Store Module
//!
//! Volatile layer of the cache. The engine only depends on the `MemoryStore`
//! trait; `LruMemoryStore` is the bounded least-recently-used default.

use std::collections::{BTreeMap, HashMap};

use crate::cache::CacheEntry;

// == Memory Store Trait ==
/// Bounded key to entry associative store.
///
/// Implementations may silently evict other entries when full. No operation
/// fails and none are aware of expiration.
pub trait MemoryStore<V>: Send + 'static {
    /// Returns a copy of the entry stored under `key`.
    fn get(&mut self, key: &str) -> Option<CacheEntry<V>>;

    /// Inserts or replaces the entry stored under `key`.
    fn set(&mut self, key: String, entry: CacheEntry<V>);

    /// Removes `key`; removing an absent key is a no-op.
    fn remove(&mut self, key: &str);

    /// Removes every entry.
    fn remove_all(&mut self);

    /// Number of entries currently held.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// == LRU Memory Store ==
/// Memory store evicting the least recently used entry once at capacity.
///
/// Every `get` and `set` stamps the key with a fresh tick; the tick index
/// keeps keys ordered from oldest to newest use.
#[derive(Debug)]
pub struct LruMemoryStore<V> {
    /// Key to (entry, last-use tick)
    entries: HashMap<String, (CacheEntry<V>, u64)>,
    /// Last-use tick to key, oldest first
    recency: BTreeMap<u64, String>,
    next_tick: u64,
    capacity: usize,
    evictions: u64,
}

impl<V> LruMemoryStore<V> {
    // == Constructor ==
    /// Creates a store holding at most `capacity` entries.
    ///
    /// A capacity of zero disables the memory layer: `set` stores nothing.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            recency: BTreeMap::new(),
            next_tick: 0,
            capacity,
            evictions: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entries evicted to make room since creation.
    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    /// Key that would be evicted next.
    pub fn peek_oldest(&self) -> Option<&str> {
        self.recency.values().next().map(String::as_str)
    }

    // == Recency Tracking ==
    fn touch(&mut self, key: &str) {
        let tick = self.next_tick;
        self.next_tick += 1;
        if let Some((_, last_used)) = self.entries.get_mut(key) {
            self.recency.remove(&*last_used);
            *last_used = tick;
            self.recency.insert(tick, key.to_string());
        }
    }

    fn evict_oldest(&mut self) -> Option<String> {
        let (_, key) = self.recency.pop_first()?;
        self.entries.remove(&key);
        self.evictions += 1;
        Some(key)
    }
}

impl<V> MemoryStore<V> for LruMemoryStore<V>
where
    V: Clone + Send + 'static,
{
    fn get(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.get(key).map(|(entry, _)| entry.clone())?;
        self.touch(key);
        Some(entry)
    }

    fn set(&mut self, key: String, entry: CacheEntry<V>) {
        if self.capacity == 0 {
            return;
        }

        if let Some((existing, _)) = self.entries.get_mut(&key) {
            *existing = entry;
            self.touch(&key);
            return;
        }

        while self.entries.len() >= self.capacity {
            if self.evict_oldest().is_none() {
                break;
            }
        }

        let tick = self.next_tick;
        self.next_tick += 1;
        self.recency.insert(tick, key.clone());
        self.entries.insert(key, (entry, tick));
    }

    fn remove(&mut self, key: &str) {
        if let Some((_, tick)) = self.entries.remove(key) {
            self.recency.remove(&tick);
        }
    }

    fn remove_all(&mut self) {
        self.entries.clear();
        self.recency.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
