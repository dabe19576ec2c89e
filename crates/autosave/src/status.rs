//! Save status values and display info.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-document save state
///
/// ```text
/// idle -> pending -> saving -> saved -> idle
///                          \-> error -> idle
///                \-> offline
/// ```
///
/// `Saved` and `Error` revert to `Idle` on their own after a short delay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveStatus {
    /// Nothing to do
    #[default]
    Idle,
    /// Debounce timer running
    Pending,
    /// Remote write in flight
    Saving,
    /// Last write succeeded
    Saved,
    /// Write redirected to the offline store because connectivity is down
    Offline,
    /// Remote write failed; content kept in the offline store
    Error,
}

impl SaveStatus {
    /// Notification text for this status
    pub fn message(&self) -> &'static str {
        match self {
            SaveStatus::Idle => "",
            SaveStatus::Pending => "Unsaved changes",
            SaveStatus::Saving => "Saving...",
            SaveStatus::Saved => "Saved",
            SaveStatus::Offline => "Saved offline",
            SaveStatus::Error => "Sync failed - changes kept locally",
        }
    }

    /// Whether this status reverts to `Idle` by itself
    pub fn is_transient(&self) -> bool {
        matches!(self, SaveStatus::Saved | SaveStatus::Error)
    }

    /// Whether entering this status deserves a user-visible notice
    pub fn should_notify(&self) -> bool {
        matches!(
            self,
            SaveStatus::Saved | SaveStatus::Offline | SaveStatus::Error
        )
    }
}

/// UI display information for one document's save state
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveStatusInfo {
    pub status: SaveStatus,
    pub is_online: bool,
    /// Whether an unsynced edit sits in the offline store
    pub pending_edit: bool,
    /// Failed sync attempts of the pending edit
    pub retry_count: Option<u32>,
    pub last_saved_at: Option<DateTime<Utc>>,
    pub status_message: String,
}

impl SaveStatusInfo {
    pub(crate) fn new(
        status: SaveStatus,
        is_online: bool,
        retry_count: Option<u32>,
        last_saved_at: Option<DateTime<Utc>>,
    ) -> Self {
        let pending_edit = retry_count.is_some();
        let status_message = match (status, pending_edit, is_online) {
            (SaveStatus::Idle, true, false) => "Offline - changes waiting to sync".to_string(),
            (SaveStatus::Idle, true, true) => "Changes waiting to sync".to_string(),
            (status, _, _) => status.message().to_string(),
        };

        Self {
            status,
            is_online,
            pending_edit,
            retry_count,
            last_saved_at,
            status_message,
        }
    }

    /// Check if the indicator should be shown
    ///
    /// Returns true unless idle with nothing waiting to sync
    pub fn should_show(&self) -> bool {
        self.status != SaveStatus::Idle || self.pending_edit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_default() {
        assert_eq!(SaveStatus::default(), SaveStatus::Idle);
    }

    #[test]
    fn test_status_messages() {
        assert_eq!(SaveStatus::Saved.message(), "Saved");
        assert_eq!(SaveStatus::Offline.message(), "Saved offline");
        assert!(SaveStatus::Error.message().starts_with("Sync failed"));
    }

    #[test]
    fn test_transient_and_notify() {
        assert!(SaveStatus::Saved.is_transient());
        assert!(SaveStatus::Error.is_transient());
        assert!(!SaveStatus::Offline.is_transient());

        assert!(SaveStatus::Offline.should_notify());
        assert!(!SaveStatus::Pending.should_notify());
        assert!(!SaveStatus::Saving.should_notify());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&SaveStatus::Offline).unwrap();
        assert_eq!(json, "\"offline\"");
    }

    #[test]
    fn test_info_messages() {
        let info = SaveStatusInfo::new(SaveStatus::Idle, true, None, None);
        assert!(!info.should_show());
        assert_eq!(info.status_message, "");

        let info = SaveStatusInfo::new(SaveStatus::Idle, false, Some(0), None);
        assert!(info.should_show());
        assert!(info.pending_edit);
        assert_eq!(info.status_message, "Offline - changes waiting to sync");

        let info = SaveStatusInfo::new(SaveStatus::Saving, true, Some(1), None);
        assert_eq!(info.status_message, "Saving...");
    }
}
