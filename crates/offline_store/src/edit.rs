//! The pending-edit record persisted for each document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Record format version written by this crate
pub const RECORD_VERSION: u32 = 1;

/// Default number of sync attempts before an edit is abandoned
pub const DEFAULT_MAX_RETRIES: u32 = 3;

fn default_record_version() -> u32 {
    RECORD_VERSION
}

/// A pending, unsynced change to one document
///
/// `content` is a full snapshot, not a diff. Serialized field names follow
/// the camelCase layout of the persisted JSON records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineEdit {
    /// Record format version; missing in records written before versioning
    #[serde(default = "default_record_version")]
    pub version: u32,
    /// Unique per edit record, derived from document id and timestamp
    pub id: String,
    /// Owning document
    pub document_id: String,
    /// Full text snapshot at time of save
    pub content: String,
    /// Creation time (Unix timestamp in ms)
    pub timestamp: i64,
    /// Only ever true momentarily before removal
    pub synced: bool,
    /// Failed sync attempts so far
    pub retry_count: u32,
}

impl OfflineEdit {
    /// Create a fresh edit stamped with the current time
    pub fn new(document_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::at(document_id, content, Utc::now().timestamp_millis())
    }

    /// Create a fresh edit with an explicit timestamp (Unix ms)
    pub fn at(document_id: impl Into<String>, content: impl Into<String>, timestamp: i64) -> Self {
        let document_id = document_id.into();
        Self {
            version: RECORD_VERSION,
            id: Self::make_id(&document_id, timestamp),
            document_id,
            content: content.into(),
            timestamp,
            synced: false,
            retry_count: 0,
        }
    }

    /// Build the record id for a document and creation timestamp
    pub fn make_id(document_id: &str, timestamp: i64) -> String {
        format!("{}_{}", document_id, timestamp)
    }

    /// Creation time as a `DateTime`
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }

    /// Whether automatic sync attempts have been used up
    pub fn is_exhausted(&self, max_retries: u32) -> bool {
        self.retry_count >= max_retries
    }

    /// Whether this reader understands the record's format version
    pub fn is_supported(&self) -> bool {
        self.version <= RECORD_VERSION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_edit_defaults() {
        let edit = OfflineEdit::at("doc-1", "hello", 1_700_000_000_000);

        assert_eq!(edit.id, "doc-1_1700000000000");
        assert_eq!(edit.document_id, "doc-1");
        assert_eq!(edit.content, "hello");
        assert_eq!(edit.retry_count, 0);
        assert!(!edit.synced);
        assert_eq!(edit.version, RECORD_VERSION);
        assert_eq!(
            edit.created_at().map(|t| t.timestamp_millis()),
            Some(1_700_000_000_000)
        );
    }

    #[test]
    fn test_exhaustion() {
        let mut edit = OfflineEdit::new("doc-1", "x");
        assert!(!edit.is_exhausted(DEFAULT_MAX_RETRIES));

        edit.retry_count = 3;
        assert!(edit.is_exhausted(DEFAULT_MAX_RETRIES));
    }

    #[test]
    fn test_persisted_layout_is_camel_case() {
        let edit = OfflineEdit::at("doc-1", "hi", 42);
        let json = serde_json::to_value(&edit).unwrap();

        assert_eq!(json["documentId"], "doc-1");
        assert_eq!(json["retryCount"], 0);
        assert_eq!(json["timestamp"], 42);
    }

    #[test]
    fn test_unversioned_record_defaults_to_current() {
        let json = r#"{"id":"d_1","documentId":"d","content":"c","timestamp":1,"synced":false,"retryCount":2}"#;
        let edit: OfflineEdit = serde_json::from_str(json).unwrap();

        assert_eq!(edit.version, RECORD_VERSION);
        assert_eq!(edit.retry_count, 2);
        assert!(edit.is_supported());
    }

    #[test]
    fn test_future_version_is_unsupported() {
        let mut edit = OfflineEdit::new("doc-1", "x");
        edit.version = RECORD_VERSION + 1;
        assert!(!edit.is_supported());
    }
}
