//! Key-value persistence backend abstraction.
//!
//! The offline queue only needs a synchronous string store with prefix
//! listing. Implementations may fail at any call (disabled storage, quota,
//! I/O); the queue store treats every failure as "no data".

use crate::{StorageError, StorageResult};
use std::collections::HashMap;
use std::sync::RwLock;

/// Trait for string key-value persistence backends
///
/// Methods take `&self`; implementations use interior mutability so a single
/// backend can be shared behind an `Arc` by several stores.
pub trait KvBackend: Send + Sync {
    /// Read the value stored under `key`, `None` if absent
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Delete `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> StorageResult<()>;

    /// List every key starting with `prefix`
    fn list_keys(&self, prefix: &str) -> StorageResult<Vec<String>>;
}

/// In-memory implementation of `KvBackend`
///
/// Nothing survives a restart. An optional byte quota mimics the limits of
/// browser-style storage so callers can exercise `QuotaExceeded`.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryBackend {
    /// Create a new empty backend without a quota
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend that refuses writes once keys plus values exceed
    /// `quota_bytes`
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    /// Whether the backend holds no keys
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn used_bytes(entries: &HashMap<String, String>) -> usize {
        entries.iter().map(|(k, v)| k.len() + v.len()).sum()
    }
}

impl KvBackend for MemoryBackend {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let entries = self.entries.read().map_err(|_| StorageError::Lock)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut entries = self.entries.write().map_err(|_| StorageError::Lock)?;

        if let Some(quota) = self.quota_bytes {
            let replaced = entries.get(key).map(|old| key.len() + old.len()).unwrap_or(0);
            let projected = Self::used_bytes(&entries) - replaced + key.len() + value.len();
            if projected > quota {
                return Err(StorageError::QuotaExceeded);
            }
        }

        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let mut entries = self.entries.write().map_err(|_| StorageError::Lock)?;
        entries.remove(key);
        Ok(())
    }

    fn list_keys(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let entries = self.entries.read().map_err(|_| StorageError::Lock)?;
        let mut keys: Vec<String> = entries
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_backend_set_get_remove() {
        let backend = MemoryBackend::new();
        assert!(backend.is_empty());

        backend.set("a", "1").unwrap();
        assert_eq!(backend.get("a").unwrap(), Some("1".to_string()));
        assert_eq!(backend.len(), 1);

        backend.set("a", "2").unwrap();
        assert_eq!(backend.get("a").unwrap(), Some("2".to_string()));

        backend.remove("a").unwrap();
        assert_eq!(backend.get("a").unwrap(), None);

        // Removing again is a no-op
        backend.remove("a").unwrap();
    }

    #[test]
    fn test_memory_backend_list_keys_by_prefix() {
        let backend = MemoryBackend::new();
        backend.set("offline_doc_b", "x").unwrap();
        backend.set("offline_doc_a", "x").unwrap();
        backend.set("other", "x").unwrap();

        let keys = backend.list_keys("offline_").unwrap();
        assert_eq!(keys, vec!["offline_doc_a", "offline_doc_b"]);
    }

    #[test]
    fn test_memory_backend_quota() {
        let backend = MemoryBackend::with_quota(10);
        backend.set("k", "12345").unwrap();

        let result = backend.set("j", "123456789");
        assert!(matches!(result, Err(StorageError::QuotaExceeded)));

        // Replacing an existing value only counts the difference
        backend.set("k", "123456789").unwrap();
        assert_eq!(backend.get("k").unwrap(), Some("123456789".to_string()));
    }
}
