//! In-process cache backend backed by a shared map.
//!
//! Clones share the same underlying map, so a test can keep a handle to the
//! backend it handed to the store and observe or mutate raw entries
//! out-of-band. An optional per-value size limit models the ceiling a real
//! backend enforces.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::backend::CacheBackend;
use crate::error::{LobError, Result};

/// Shared in-memory key-value backend.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    map: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    max_value_size: Option<usize>,
}

impl MemoryBackend {
    /// Create an empty backend with no value-size limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty backend that refuses values larger than `limit` bytes.
    pub fn with_value_limit(limit: usize) -> Self {
        Self {
            map: Arc::default(),
            max_value_size: Some(limit),
        }
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.map.lock().map(|map| map.len()).unwrap_or(0)
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when a raw entry exists under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.map
            .lock()
            .map(|map| map.contains_key(key))
            .unwrap_or(false)
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Vec<u8>>>> {
        self.map
            .lock()
            .map_err(|_| LobError::Backend("memory backend lock poisoned".to_string()))
    }

    fn accepts(&self, value: &[u8]) -> bool {
        self.max_value_size.is_none_or(|limit| value.len() <= limit)
    }
}

impl CacheBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: Vec<u8>) -> Result<bool> {
        if !self.accepts(&value) {
            return Ok(false);
        }
        self.lock()?.insert(key.to_string(), value);
        Ok(true)
    }

    fn set_many(&self, entries: Vec<(String, Vec<u8>)>) -> Result<bool> {
        let mut map = self.lock()?;
        for (key, value) in entries {
            if !self.accepts(&value) {
                // Entries applied so far stay behind, like a real backend
                // with no multi-key atomicity.
                return Ok(false);
            }
            map.insert(key, value);
        }
        Ok(true)
    }

    fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.lock()?.remove(key).is_some())
    }

    fn delete_many(&self, keys: &[String]) -> Result<bool> {
        let mut map = self.lock()?;
        for key in keys {
            map.remove(key);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_delete() {
        let backend = MemoryBackend::new();
        assert!(backend.set("k", b"v".to_vec()).unwrap());
        assert_eq!(backend.get("k").unwrap(), Some(b"v".to_vec()));
        assert!(backend.delete("k").unwrap());
        assert_eq!(backend.get("k").unwrap(), None);
        assert!(!backend.delete("k").unwrap());
    }

    #[test]
    fn test_clones_share_the_map() {
        let backend = MemoryBackend::new();
        let observer = backend.clone();
        backend.set("shared", b"x".to_vec()).unwrap();
        assert!(observer.contains("shared"));
        assert_eq!(observer.len(), 1);
    }

    #[test]
    fn test_value_limit_rejects_oversize() {
        let backend = MemoryBackend::with_value_limit(4);
        assert!(backend.set("ok", b"1234".to_vec()).unwrap());
        assert!(!backend.set("big", b"12345".to_vec()).unwrap());
        assert!(!backend.contains("big"));
    }

    #[test]
    fn test_set_many_reports_failure_and_may_leave_partials() {
        let backend = MemoryBackend::with_value_limit(4);
        let ok = backend
            .set_many(vec![
                ("a".to_string(), b"fits".to_vec()),
                ("b".to_string(), b"too big".to_vec()),
                ("c".to_string(), b"also".to_vec()),
            ])
            .unwrap();
        assert!(!ok);
        // Non-atomic batch: the entry before the oversized one stuck.
        assert!(backend.contains("a"));
        assert!(!backend.contains("b"));
        assert!(!backend.contains("c"));
    }

    #[test]
    fn test_delete_many_removes_present_keys() {
        let backend = MemoryBackend::new();
        backend.set("a", b"1".to_vec()).unwrap();
        backend.set("b", b"2".to_vec()).unwrap();
        let keys = vec!["a".to_string(), "b".to_string(), "missing".to_string()];
        assert!(backend.delete_many(&keys).unwrap());
        assert!(backend.is_empty());
    }
}
