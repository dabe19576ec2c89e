//! Offline queue store.
//!
//! Holds at most one pending `OfflineEdit` per document under a
//! document-scoped key, plus a flat sync queue (one JSON array under a fixed
//! key) deduplicated by document id. A newer edit for the same document
//! replaces the older one everywhere.
//!
//! Persistence is best-effort. Every backend failure or unparseable record is
//! logged and treated as "no data"; nothing here returns an error to the
//! caller.

use crate::{KvBackend, MemoryBackend, OfflineEdit, StorageResult, StoreConfig};
use std::fmt;
use std::sync::Arc;

/// Durable staging area for unsynced edits
///
/// Cloning is cheap: clones share the same backend.
#[derive(Clone)]
pub struct OfflineQueueStore {
    backend: Arc<dyn KvBackend>,
    config: StoreConfig,
}

impl fmt::Debug for OfflineQueueStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OfflineQueueStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl OfflineQueueStore {
    /// Create a store over `backend` with the default key layout
    pub fn new(backend: impl KvBackend + 'static) -> Self {
        Self::with_config(Arc::new(backend), StoreConfig::default())
    }

    /// Create a store over a shared backend with a custom config
    pub fn with_config(backend: Arc<dyn KvBackend>, config: StoreConfig) -> Self {
        Self { backend, config }
    }

    /// Create a non-durable store backed by memory
    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    /// Get the configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Stage `content` as the pending edit for `document_id`
    ///
    /// Replaces any earlier edit for the document, both in its scoped record
    /// and in the sync queue. The edit is returned even when persisting it
    /// failed.
    pub fn save_edit(&self, document_id: &str, content: &str) -> OfflineEdit {
        let edit = OfflineEdit::new(document_id, content);

        if let Err(e) = self.write_json(&self.config.document_key(document_id), &edit) {
            tracing::warn!("Failed to persist offline edit for {}: {}", document_id, e);
        }

        let mut queue = self.get_queue();
        queue.retain(|queued| queued.document_id != document_id);
        queue.push(edit.clone());
        self.update_queue(&queue);

        tracing::debug!(
            document_id,
            edit_id = %edit.id,
            bytes = content.len(),
            "Staged offline edit"
        );
        edit
    }

    /// Read the pending edit for `document_id`
    ///
    /// Absent, corrupt and future-version records all read as `None`.
    pub fn get_edit(&self, document_id: &str) -> Option<OfflineEdit> {
        let key = self.config.document_key(document_id);
        let raw = match self.backend.get(&key) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!("Failed to read offline edit for {}: {}", document_id, e);
                return None;
            }
        };

        match serde_json::from_str::<OfflineEdit>(&raw) {
            Ok(edit) if edit.is_supported() => Some(edit),
            Ok(edit) => {
                tracing::debug!(
                    "Ignoring offline edit {} with unsupported version {}",
                    edit.id,
                    edit.version
                );
                None
            }
            Err(e) => {
                tracing::warn!("Discarding corrupt offline edit for {}: {}", document_id, e);
                None
            }
        }
    }

    /// Drop the pending edit for `document_id` and its queue entry
    ///
    /// Idempotent.
    pub fn remove_edit(&self, document_id: &str) {
        if let Err(e) = self.backend.remove(&self.config.document_key(document_id)) {
            tracing::warn!("Failed to remove offline edit for {}: {}", document_id, e);
        }

        let mut queue = self.get_queue();
        let before = queue.len();
        queue.retain(|queued| queued.document_id != document_id);
        if queue.len() != before {
            self.update_queue(&queue);
        }
    }

    /// All queued edits, in no particular order
    pub fn get_queue(&self) -> Vec<OfflineEdit> {
        let raw = match self.backend.get(&self.config.queue_key()) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!("Failed to read sync queue: {}", e);
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<OfflineEdit>>(&raw) {
            Ok(queue) => queue.into_iter().filter(OfflineEdit::is_supported).collect(),
            Err(e) => {
                tracing::warn!("Discarding corrupt sync queue: {}", e);
                Vec::new()
            }
        }
    }

    /// Replace the sync queue wholesale
    pub fn update_queue(&self, queue: &[OfflineEdit]) {
        if let Err(e) = self.write_json(&self.config.queue_key(), queue) {
            tracing::warn!("Failed to persist sync queue: {}", e);
        }
    }

    /// Count one more failed sync attempt against the document's edit
    ///
    /// Updates the scoped record and the queue entry, and returns the updated
    /// edit. `None` if there is no readable edit for the document.
    pub fn record_failed_attempt(&self, document_id: &str) -> Option<OfflineEdit> {
        let mut edit = self.get_edit(document_id)?;
        edit.retry_count = edit.retry_count.saturating_add(1);

        if let Err(e) = self.write_json(&self.config.document_key(document_id), &edit) {
            tracing::warn!("Failed to persist retry count for {}: {}", document_id, e);
        }

        let mut queue = self.get_queue();
        match queue.iter_mut().find(|queued| queued.document_id == document_id) {
            Some(entry) => entry.retry_count = edit.retry_count,
            None => queue.push(edit.clone()),
        }
        self.update_queue(&queue);

        Some(edit)
    }

    /// Number of edits waiting in the sync queue
    pub fn pending_count(&self) -> usize {
        self.get_queue().len()
    }

    /// Remove every record under this store's key prefix
    ///
    /// Administrative reset; not part of the normal save flow.
    pub fn clear_all(&self) {
        let keys = match self.backend.list_keys(&self.config.key_prefix) {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!("Failed to list offline records: {}", e);
                return;
            }
        };

        for key in keys {
            if let Err(e) = self.backend.remove(&key) {
                tracing::warn!("Failed to remove offline record {}: {}", key, e);
            }
        }
    }

    fn write_json<T: serde::Serialize + ?Sized>(&self, key: &str, value: &T) -> StorageResult<()> {
        let json = serde_json::to_string(value)?;
        self.backend.set(key, &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FileBackend, StorageError, RECORD_VERSION};
    use proptest::prelude::*;

    /// Backend that behaves like disabled browser storage
    struct UnavailableBackend;

    impl KvBackend for UnavailableBackend {
        fn get(&self, _key: &str) -> StorageResult<Option<String>> {
            Err(StorageError::Unavailable("storage disabled".to_string()))
        }

        fn set(&self, _key: &str, _value: &str) -> StorageResult<()> {
            Err(StorageError::Unavailable("storage disabled".to_string()))
        }

        fn remove(&self, _key: &str) -> StorageResult<()> {
            Err(StorageError::Unavailable("storage disabled".to_string()))
        }

        fn list_keys(&self, _prefix: &str) -> StorageResult<Vec<String>> {
            Err(StorageError::Unavailable("storage disabled".to_string()))
        }
    }

    fn shared_store() -> (Arc<MemoryBackend>, OfflineQueueStore) {
        let backend = Arc::new(MemoryBackend::new());
        let store = OfflineQueueStore::with_config(backend.clone(), StoreConfig::default());
        (backend, store)
    }

    #[test]
    fn test_save_and_get_edit() {
        let store = OfflineQueueStore::in_memory();

        let saved = store.save_edit("doc-1", "hello");
        let loaded = store.get_edit("doc-1").unwrap();

        assert_eq!(loaded, saved);
        assert_eq!(loaded.content, "hello");
        assert_eq!(loaded.retry_count, 0);
        assert!(!loaded.synced);
        assert_eq!(loaded.id, OfflineEdit::make_id("doc-1", loaded.timestamp));
    }

    #[test]
    fn test_get_missing_edit() {
        let store = OfflineQueueStore::in_memory();
        assert!(store.get_edit("nope").is_none());
        assert!(store.get_queue().is_empty());
    }

    #[test]
    fn test_last_write_wins() {
        let store = OfflineQueueStore::in_memory();

        store.save_edit("doc-1", "first");
        store.save_edit("doc-1", "second");
        store.save_edit("doc-1", "third");

        assert_eq!(store.get_edit("doc-1").unwrap().content, "third");

        let queue = store.get_queue();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].content, "third");
    }

    #[test]
    fn test_queue_holds_one_entry_per_document() {
        let store = OfflineQueueStore::in_memory();

        store.save_edit("a", "1");
        store.save_edit("b", "1");
        store.save_edit("a", "2");

        let mut queue = store.get_queue();
        queue.sort_by(|x, y| x.document_id.cmp(&y.document_id));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue[0].document_id, "a");
        assert_eq!(queue[0].content, "2");
        assert_eq!(queue[1].document_id, "b");
        assert_eq!(store.pending_count(), 2);
    }

    #[test]
    fn test_new_edit_resets_retry_count() {
        let store = OfflineQueueStore::in_memory();

        store.save_edit("doc-1", "old");
        store.record_failed_attempt("doc-1");
        store.record_failed_attempt("doc-1");
        assert_eq!(store.get_edit("doc-1").unwrap().retry_count, 2);

        store.save_edit("doc-1", "new");
        assert_eq!(store.get_edit("doc-1").unwrap().retry_count, 0);
        assert_eq!(store.get_queue()[0].retry_count, 0);
    }

    #[test]
    fn test_remove_edit_is_idempotent() {
        let store = OfflineQueueStore::in_memory();

        store.save_edit("doc-1", "x");
        store.save_edit("doc-2", "y");

        store.remove_edit("doc-1");
        assert!(store.get_edit("doc-1").is_none());
        assert_eq!(store.pending_count(), 1);

        store.remove_edit("doc-1");
        store.remove_edit("never-existed");
        assert_eq!(store.get_queue()[0].document_id, "doc-2");
    }

    #[test]
    fn test_record_failed_attempt_updates_record_and_queue() {
        let store = OfflineQueueStore::in_memory();
        store.save_edit("doc-1", "x");

        let updated = store.record_failed_attempt("doc-1").unwrap();
        assert_eq!(updated.retry_count, 1);

        assert_eq!(store.get_edit("doc-1").unwrap().retry_count, 1);
        assert_eq!(store.get_queue()[0].retry_count, 1);

        assert!(store.record_failed_attempt("missing").is_none());
    }

    #[test]
    fn test_update_queue_replaces_wholesale() {
        let store = OfflineQueueStore::in_memory();
        store.save_edit("a", "1");
        store.save_edit("b", "2");

        let mut queue = store.get_queue();
        queue.retain(|edit| edit.document_id == "b");
        queue[0].retry_count = 2;
        store.update_queue(&queue);

        let queue = store.get_queue();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].retry_count, 2);
    }

    #[test]
    fn test_corrupt_record_reads_as_absent() {
        let (backend, store) = shared_store();

        backend.set(&store.config().document_key("doc-1"), "{ not json").unwrap();
        backend.set(&store.config().queue_key(), "[{]").unwrap();

        assert!(store.get_edit("doc-1").is_none());
        assert!(store.get_queue().is_empty());

        // A corrupt queue is simply replaced by the next save
        store.save_edit("doc-1", "fresh");
        assert_eq!(store.get_queue().len(), 1);
        assert_eq!(store.get_edit("doc-1").unwrap().content, "fresh");
    }

    #[test]
    fn test_future_version_reads_as_absent() {
        let (backend, store) = shared_store();

        let mut edit = OfflineEdit::new("doc-1", "from the future");
        edit.version = RECORD_VERSION + 1;
        backend
            .set(
                &store.config().document_key("doc-1"),
                &serde_json::to_string(&edit).unwrap(),
            )
            .unwrap();
        backend
            .set(&store.config().queue_key(), &serde_json::to_string(&vec![edit]).unwrap())
            .unwrap();

        assert!(store.get_edit("doc-1").is_none());
        assert!(store.get_queue().is_empty());
    }

    #[test]
    fn test_unavailable_backend_degrades_silently() {
        let store = OfflineQueueStore::new(UnavailableBackend);

        let edit = store.save_edit("doc-1", "kept in memory only");
        assert_eq!(edit.content, "kept in memory only");

        assert!(store.get_edit("doc-1").is_none());
        assert!(store.get_queue().is_empty());
        assert!(store.record_failed_attempt("doc-1").is_none());
        store.remove_edit("doc-1");
        store.clear_all();
        assert_eq!(store.pending_count(), 0);
    }

    #[test]
    fn test_quota_exceeded_degrades_silently() {
        let store = OfflineQueueStore::new(MemoryBackend::with_quota(64));

        let big = "x".repeat(1024);
        store.save_edit("doc-1", &big);

        assert!(store.get_edit("doc-1").is_none());
    }

    #[test]
    fn test_clear_all_only_touches_prefix() {
        let (backend, store) = shared_store();
        backend.set("unrelated", "keep me").unwrap();

        store.save_edit("a", "1");
        store.save_edit("b", "2");
        store.clear_all();

        assert!(store.get_edit("a").is_none());
        assert!(store.get_edit("b").is_none());
        assert!(store.get_queue().is_empty());
        assert_eq!(backend.get("unrelated").unwrap(), Some("keep me".to_string()));
    }

    #[test]
    fn test_stores_with_distinct_prefixes_are_isolated() {
        let backend: Arc<dyn KvBackend> = Arc::new(MemoryBackend::new());
        let first = OfflineQueueStore::with_config(backend.clone(), StoreConfig::default());
        let second = OfflineQueueStore::with_config(
            backend,
            StoreConfig::default().with_prefix("other_"),
        );

        first.save_edit("doc-1", "first");
        assert!(second.get_edit("doc-1").is_none());

        second.clear_all();
        assert!(first.get_edit("doc-1").is_some());
    }

    #[test]
    fn test_file_backed_store_survives_restart() {
        let temp_dir = tempfile::tempdir().unwrap();

        {
            let store = OfflineQueueStore::new(FileBackend::new(temp_dir.path()).unwrap());
            store.save_edit("doc-1", "persisted");
            store.record_failed_attempt("doc-1");
        }

        let store = OfflineQueueStore::new(FileBackend::new(temp_dir.path()).unwrap());
        let edit = store.get_edit("doc-1").unwrap();
        assert_eq!(edit.content, "persisted");
        assert_eq!(edit.retry_count, 1);
        assert_eq!(store.pending_count(), 1);
    }

    proptest! {
        #[test]
        fn prop_at_most_one_edit_per_document(
            saves in prop::collection::vec((0usize..3, "[a-z]{0,8}"), 1..20)
        ) {
            let store = OfflineQueueStore::in_memory();
            let docs = ["doc-a", "doc-b", "doc-c"];

            for (doc, content) in &saves {
                store.save_edit(docs[*doc], content);
            }

            let queue = store.get_queue();
            for (index, doc) in docs.iter().enumerate() {
                let last = saves.iter().rev().find(|(d, _)| *d == index);
                let entries: Vec<_> = queue.iter().filter(|e| e.document_id == *doc).collect();
                match last {
                    Some((_, content)) => {
                        prop_assert_eq!(entries.len(), 1);
                        prop_assert_eq!(&entries[0].content, content);
                        prop_assert_eq!(&store.get_edit(doc).unwrap().content, content);
                    }
                    None => {
                        prop_assert!(entries.is_empty());
                        prop_assert!(store.get_edit(doc).is_none());
                    }
                }
            }
        }
    }
}
