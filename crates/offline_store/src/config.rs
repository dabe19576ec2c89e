//! Store configuration and key layout

use serde::{Deserialize, Serialize};

/// Offline store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Prefix shared by every key this store writes
    pub key_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            key_prefix: "offline_edit_".to_string(),
        }
    }
}

impl StoreConfig {
    /// Create a new config with a custom key prefix
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Key of the record holding a document's pending edit
    pub fn document_key(&self, document_id: &str) -> String {
        format!("{}doc_{}", self.key_prefix, document_id)
    }

    /// Key of the flat sync queue record
    pub fn queue_key(&self) -> String {
        format!("{}sync_queue", self.key_prefix)
    }
}
