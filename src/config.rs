use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::StorageError;

/// Feature flags and timings for the permanent storage engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageOptions {
    pub use_structured_store: bool,
    pub use_session_storage: bool,
    pub use_secure_backup: bool,
    pub validate_after_save: bool,
    pub auto_restore: bool,
    /// Delay between a save and its background validation.
    pub validation_delay_ms: u64,
    pub structured_store_timeout_ms: u64,
    /// Minimum gap between load-triggered restorations of one namespace.
    pub restore_cooldown_secs: u64,
    /// Corrupt validations tolerated before restoration kicks in.
    pub corruption_threshold: u32,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            use_structured_store: true,
            use_session_storage: true,
            use_secure_backup: true,
            validate_after_save: true,
            auto_restore: true,
            validation_delay_ms: 500,
            structured_store_timeout_ms: 3_000,
            restore_cooldown_secs: 3_600,
            corruption_threshold: 3,
        }
    }
}

impl StorageOptions {
    pub fn validation_delay(&self) -> Duration {
        Duration::from_millis(self.validation_delay_ms)
    }

    pub fn structured_store_timeout(&self) -> Duration {
        Duration::from_millis(self.structured_store_timeout_ms)
    }

    pub fn restore_cooldown(&self) -> Duration {
        Duration::from_secs(self.restore_cooldown_secs)
    }
}

/// File-level configuration for the maintenance binary and embedders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: String,
    pub log_level: String,
    pub options: StorageOptions,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            log_level: "info".to_string(),
            options: StorageOptions::default(),
        }
    }
}

impl StorageConfig {
    /// Loads the configuration from `path`. A missing or unparsable file
    /// yields the default configuration.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        Ok(toml::from_str(&contents).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "failed to parse config, using defaults");
            Self::default()
        }))
    }

    /// Saves the configuration as TOML at `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?; // Ensure directory exists.
        }

        let contents = toml::to_string(self).map_err(|e| StorageError::Config(e.to_string()))?;
        fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_load_default() {
        let tmp = tempfile::tempdir().unwrap();
        let config = StorageConfig::load(tmp.path().join("missing.toml")).unwrap();
        assert_eq!(config, StorageConfig::default());
        assert_eq!(config.options.validation_delay(), Duration::from_millis(500));
    }

    #[test]
    fn test_config_save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("conf/storage.toml");

        let mut config = StorageConfig::default();
        config.log_level = "debug".to_string();
        config.options.use_session_storage = false;
        config.options.corruption_threshold = 5;
        config.save(&path).unwrap();

        let loaded = StorageConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_options_table() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("storage.toml");
        fs::write(&path, "data_dir = \"/var/lib/mok\"\n[options]\nauto_restore = false\n").unwrap();

        let loaded = StorageConfig::load(&path).unwrap();
        assert_eq!(loaded.data_dir, "/var/lib/mok");
        assert_eq!(loaded.log_level, "info");
        assert!(!loaded.options.auto_restore);
        assert!(loaded.options.use_structured_store);
    }

    #[test]
    fn test_unparsable_config_falls_back() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("storage.toml");
        fs::write(&path, "data_dir = [").unwrap();

        assert_eq!(StorageConfig::load(&path).unwrap(), StorageConfig::default());
    }
}
