//! Settings file for the terminal session.

use autosave::AutoSaveConfig;
use offline_store::StoreConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings file name inside the data directory
pub const SETTINGS_FILE: &str = "settings.json";

/// Application settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub autosave: AutoSaveConfig,
    pub store: StoreConfig,
}

impl AppSettings {
    /// Load settings from `path`
    ///
    /// A missing file yields defaults. An unreadable or unparseable file is
    /// logged and also yields defaults.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                tracing::warn!("Failed to read settings file, using defaults: {}", e);
                return Self::default();
            }
        };

        match serde_json::from_str::<AppSettings>(&content) {
            Ok(settings) => settings,
            Err(e) => {
                // Log the error but use defaults
                tracing::warn!("Failed to parse settings file, using defaults: {}", e);
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let settings = AppSettings::load(&temp_dir.path().join(SETTINGS_FILE));
        assert_eq!(settings, AppSettings::default());
    }

    #[test]
    fn test_corrupt_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, "{ not json").unwrap();

        assert_eq!(AppSettings::load(&path), AppSettings::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(SETTINGS_FILE);
        std::fs::write(
            &path,
            r#"{"autosave": {"delay_ms": 500, "max_retries": 5}, "store": {"key_prefix": "cli_"}}"#,
        )
        .unwrap();

        let settings = AppSettings::load(&path);
        assert_eq!(settings.autosave.delay_ms, 500);
        assert_eq!(settings.autosave.max_retries, 5);
        assert_eq!(settings.autosave.retry_delay_ms, 2000);
        assert_eq!(settings.store.key_prefix, "cli_");
    }

    #[test]
    fn test_settings_round_trip_through_json() {
        let settings = AppSettings {
            autosave: AutoSaveConfig::disabled(),
            store: StoreConfig::default().with_prefix("x_"),
        };
        let json = serde_json::to_string_pretty(&settings).unwrap();
        let back: AppSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, settings);
    }
}
