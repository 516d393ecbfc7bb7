//! Cache Statistics Module
//!
//! Tracks lookup outcomes per layer.

use serde::Serialize;

// == Cache Stats ==
/// Lookup counters for one cache instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups answered by the memory layer
    pub memory_hits: u64,
    /// Lookups that missed memory and were answered by the disk layer
    pub disk_hits: u64,
    /// Lookups that found nothing usable (absent, undecodable or expired)
    pub misses: u64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total hits across both layers.
    pub fn hits(&self) -> u64 {
        self.memory_hits + self.disk_hits
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits() + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits() as f64 / total as f64
        }
    }

    pub fn record_memory_hit(&mut self) {
        self.memory_hits += 1;
    }

    pub fn record_disk_hit(&mut self) {
        self.disk_hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }
}
