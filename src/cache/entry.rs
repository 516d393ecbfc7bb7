//! Cache Entry Module
//!
//! Defines the unit of storage shared by both layers: a value plus the
//! instant after which it is no longer valid.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::codec::Codec;
use crate::error::Result;

/// Seconds since the Unix epoch for 4001-01-01T00:00:00Z
const DISTANT_FUTURE_SECS: i64 = 64_092_211_200;

// == Cache Entry ==
/// A cached value together with its expiration date.
///
/// Entries are never mutated in place; saving a key again creates a new entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    value: V,
    expiration_date: DateTime<Utc>,
}

impl<V> CacheEntry<V> {
    // == Constructors ==
    /// Creates an entry expiring at the given instant. Past dates are accepted.
    pub fn new(value: V, expiration_date: DateTime<Utc>) -> Self {
        Self {
            value,
            expiration_date,
        }
    }

    /// Creates an entry that effectively never expires.
    pub fn never_expiring(value: V) -> Self {
        Self::new(value, distant_future())
    }

    /// Creates an entry expiring `ttl` from now, or never when `ttl` is None.
    ///
    /// A TTL too large to represent is treated as no expiration.
    pub fn with_ttl(value: V, ttl: Option<Duration>) -> Self {
        let expiration_date = ttl
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .unwrap_or_else(distant_future);
        Self::new(value, expiration_date)
    }

    // == Accessors ==
    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn into_value(self) -> V {
        self.value
    }

    pub fn expiration_date(&self) -> DateTime<Utc> {
        self.expiration_date
    }

    // == Expiration ==
    /// Returns true iff the expiration date is strictly before `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration_date < now
    }

    pub fn is_expired_now(&self) -> bool {
        self.is_expired(Utc::now())
    }

    /// Remaining lifetime, or None once expired.
    pub fn ttl_remaining(&self) -> Option<Duration> {
        (self.expiration_date - Utc::now()).to_std().ok()
    }

    // == Serialization ==
    /// Encodes the entry with the cache's codec.
    pub fn serialize<C: Codec<V>>(&self, codec: &C) -> Result<Vec<u8>> {
        codec.encode(self)
    }

    /// Decodes an entry with the cache's codec.
    pub fn deserialize<C: Codec<V>>(codec: &C, bytes: &[u8]) -> Result<Self> {
        codec.decode(bytes)
    }
}

/// The expiration date given to entries saved without a TTL.
pub fn distant_future() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(DISTANT_FUTURE_SECS, 0).unwrap_or(DateTime::<Utc>::MAX_UTC)
}
