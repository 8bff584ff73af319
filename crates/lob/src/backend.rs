//! The capability surface the object store consumes from a cache backend.
//!
//! Implementations wrap a real transport ([`RedisBackend`](crate::redis::RedisBackend))
//! or keep everything in-process ([`MemoryBackend`](crate::memory::MemoryBackend),
//! useful for tests and embedding). The store applies its own tagged value
//! encoding; backends see opaque bytes and enforce their own per-value size
//! ceiling.

use crate::error::Result;

/// Key-value operations the chunking protocol requires.
///
/// Batched operations are NOT assumed atomic: a failed `set_many` may have
/// applied some of its entries. The store's compensating rollback is the
/// only consistency mechanism layered on top.
pub trait CacheBackend: Send + Sync {
    /// Fetch a raw value. `Ok(None)` when the key is absent.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store a raw value. `Ok(false)` when the backend refused it (for
    /// example an oversized value).
    fn set(&self, key: &str, value: Vec<u8>) -> Result<bool>;

    /// Store several values in one round-trip. All-or-nothing is not
    /// guaranteed; `Ok(false)` reports that at least one entry was refused.
    fn set_many(&self, entries: Vec<(String, Vec<u8>)>) -> Result<bool>;

    /// Remove a key. `Ok(false)` when nothing was removed.
    fn delete(&self, key: &str) -> Result<bool>;

    /// Remove several keys in one round-trip.
    fn delete_many(&self, keys: &[String]) -> Result<bool>;
}

impl<B: CacheBackend + ?Sized> CacheBackend for Box<B> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: Vec<u8>) -> Result<bool> {
        (**self).set(key, value)
    }

    fn set_many(&self, entries: Vec<(String, Vec<u8>)>) -> Result<bool> {
        (**self).set_many(entries)
    }

    fn delete(&self, key: &str) -> Result<bool> {
        (**self).delete(key)
    }

    fn delete_many(&self, keys: &[String]) -> Result<bool> {
        (**self).delete_many(keys)
    }
}
