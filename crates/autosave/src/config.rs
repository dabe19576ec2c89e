//! Autosave timing and retry configuration.

use offline_store::DEFAULT_MAX_RETRIES;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Autosave configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoSaveConfig {
    /// Whether content changes schedule saves
    pub enabled: bool,
    /// Quiet period after the last change before saving (in milliseconds)
    pub delay_ms: u64,
    /// How long `Saved` is shown before reverting to `Idle` (in milliseconds)
    pub saved_revert_ms: u64,
    /// How long `Error` is shown before reverting to `Idle` (in milliseconds)
    pub error_revert_ms: u64,
    /// Wait after a reconnection before syncing (in milliseconds)
    pub settle_delay_ms: u64,
    /// Base delay for linear retry backoff (in milliseconds)
    pub retry_delay_ms: u64,
    /// Sync attempts before an offline edit is abandoned
    pub max_retries: u32,
    /// Sync a pending edit when the controller starts online
    pub sync_on_start: bool,
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_ms: 2000,
            saved_revert_ms: 3000,
            error_revert_ms: 5000,
            settle_delay_ms: 1000,
            retry_delay_ms: 2000,
            max_retries: DEFAULT_MAX_RETRIES,
            sync_on_start: true,
        }
    }
}

impl AutoSaveConfig {
    /// Create a new config with a custom debounce delay
    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    /// Create a new config with a custom retry base delay
    pub fn with_retry_delay(mut self, ms: u64) -> Self {
        self.retry_delay_ms = ms;
        self
    }

    /// Create a new config with a custom retry cap
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Create a new config with a custom reconnection settle delay
    pub fn with_settle_delay(mut self, ms: u64) -> Self {
        self.settle_delay_ms = ms;
        self
    }

    /// Create a new config with startup sync switched on or off
    pub fn with_sync_on_start(mut self, sync_on_start: bool) -> Self {
        self.sync_on_start = sync_on_start;
        self
    }

    /// Create a new config with autosave disabled
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn saved_revert(&self) -> Duration {
        Duration::from_millis(self.saved_revert_ms)
    }

    pub fn error_revert(&self) -> Duration {
        Duration::from_millis(self.error_revert_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Delay before the next sync attempt after `retry_count` failures
    ///
    /// Linear: one base delay per failure so far.
    pub fn backoff(&self, retry_count: u32) -> Duration {
        Duration::from_millis(self.retry_delay_ms.saturating_mul(u64::from(retry_count)))
    }
}
