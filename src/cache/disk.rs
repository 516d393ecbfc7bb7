//! Disk Store Module
//!
//! Durable layer of the cache: one file per key under the cache directory,
//! holding the codec's encoding of a `CacheEntry`.

use std::io::{ErrorKind, Write};
use std::marker::PhantomData;
use std::path::Path;

use tempfile::NamedTempFile;
use tokio::fs;
use tracing::debug;

use crate::cache::codec::Codec;
use crate::cache::keys::KeyPathMapper;
use crate::cache::CacheEntry;
use crate::error::{CacheError, Result};

// == Disk Store ==
/// Reads and writes encoded entries at the paths given by a `KeyPathMapper`.
#[derive(Debug)]
pub struct DiskStore<V, C> {
    mapper: KeyPathMapper,
    codec: C,
    _value: PhantomData<fn() -> V>,
}

impl<V, C> DiskStore<V, C>
where
    C: Codec<V>,
{
    pub fn new(mapper: KeyPathMapper, codec: C) -> Self {
        Self {
            mapper,
            codec,
            _value: PhantomData,
        }
    }

    pub fn mapper(&self) -> &KeyPathMapper {
        &self.mapper
    }

    // == Write ==
    /// Encodes an entry with this store's codec.
    pub fn encode(&self, entry: &CacheEntry<V>) -> Result<Vec<u8>> {
        entry.serialize(&self.codec)
    }

    /// Encodes and writes the entry, replacing any existing file.
    pub async fn write(&self, key: &str, entry: &CacheEntry<V>) -> Result<()> {
        let bytes = self.encode(entry)?;
        self.write_bytes(key, bytes).await
    }

    /// Writes already encoded bytes under `key`, replacing any existing file.
    ///
    /// Each write goes to its own temporary file in the cache directory and
    /// is renamed into place, so concurrent writers of one key never share a
    /// partial file and the last rename wins. The temporary file is removed
    /// on any failure. The cache directory is created on first write.
    pub async fn write_bytes(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        let dir = self.mapper.directory().to_path_buf();
        let path = self.mapper.path_for(key);
        let len = bytes.len();

        tokio::task::spawn_blocking(move || persist_atomically(&dir, &path, &bytes))
            .await
            .map_err(|e| CacheError::Interrupted(format!("disk write: {}", e)))??;

        debug!(key, bytes = len, "Wrote entry to disk");
        Ok(())
    }

    // == Read ==
    /// Reads and decodes the entry stored under `key`.
    ///
    /// Fails with `NotFound` when no file exists and `Codec` when the file
    /// does not decode to an entry of this cache's value type.
    pub async fn read(&self, key: &str) -> Result<CacheEntry<V>> {
        let path = self.mapper.path_for(key);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(CacheError::NotFound(key.to_string()))
            }
            Err(e) => return Err(CacheError::io(&path, e)),
        };

        CacheEntry::deserialize(&self.codec, &bytes)
    }

    // == Delete ==
    /// Deletes the file stored under `key`; `NotFound` if there is none.
    pub async fn delete(&self, key: &str) -> Result<()> {
        let path = self.mapper.path_for(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(CacheError::NotFound(key.to_string())),
            Err(e) => Err(CacheError::io(&path, e)),
        }
    }

    // == List Keys ==
    /// Lists the keys materialized on disk, in no particular order.
    ///
    /// Files without the entry extension are ignored. A cache directory that
    /// does not exist yet holds no keys.
    pub async fn list_keys(&self) -> Result<Vec<String>> {
        let dir = self.mapper.directory();
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CacheError::io(dir, e)),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CacheError::io(dir, e))?
        {
            if let Some(key) = KeyPathMapper::key_for(Path::new(&entry.file_name())) {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}

/// Writes `bytes` to a fresh temporary file in `dir` and renames it to `path`.
fn persist_atomically(dir: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| CacheError::io(dir, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| CacheError::io(dir, e))?;
    tmp.write_all(bytes)
        .map_err(|e| CacheError::io(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| CacheError::io(path, e.error))?;
    Ok(())
}
