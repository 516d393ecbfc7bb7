//! Codec Module
//!
//! Encodes and decodes cache entries for the disk layer. One codec is bound
//! to each cache instance, so the value type is fixed at compile time.

use serde::{de::DeserializeOwned, Serialize};

use crate::cache::CacheEntry;
use crate::error::Result;

// == Codec Trait ==
/// Injectable encode/decode pair for entries of value type `V`.
pub trait Codec<V>: Send + Sync + 'static {
    /// Encodes an entry into bytes.
    fn encode(&self, entry: &CacheEntry<V>) -> Result<Vec<u8>>;

    /// Decodes bytes into an entry, failing with `CacheError::Codec` when the
    /// payload does not match the expected shape.
    fn decode(&self, bytes: &[u8]) -> Result<CacheEntry<V>>;
}

// == JSON Codec ==
/// Stores entries as JSON objects: `{"value": ..., "expiration_date": "<RFC 3339>"}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl<V> Codec<V> for JsonCodec
where
    V: Serialize + DeserializeOwned,
{
    fn encode(&self, entry: &CacheEntry<V>) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(entry)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<CacheEntry<V>> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
