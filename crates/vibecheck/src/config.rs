//! Configuration management for vibecheck.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "vibecheck";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "vibecheck.db";

/// Storage key holding the persisted consent decision.
pub const DEFAULT_CONSENT_KEY: &str = "consent_state";

/// Storage key holding the serialized checklist state.
pub const DEFAULT_STATE_KEY: &str = "vibe-checklist-state";

/// Idle window before a pending checklist snapshot is written.
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `VIBECHECK_`)
/// 2. TOML config file at `~/.config/vibecheck/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Analytics configuration.
    pub analytics: AnalyticsConfig,
    /// Checklist state persistence configuration.
    pub persistence: PersistenceConfig,
    /// Checklist source configuration.
    pub checklist: ChecklistConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/vibecheck/vibecheck.db`
    pub database_path: Option<PathBuf>,
}

/// Analytics-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Key under which the consent decision is stored.
    pub consent_key: String,
    /// Maximum number of events held while waiting for consent.
    /// Set to 0 for unlimited.
    pub max_queued_events: usize,
}

/// Checklist state persistence configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Key under which the checklist state is stored.
    pub state_key: String,
    /// Idle window in milliseconds before a pending snapshot is written.
    pub debounce_ms: u64,
}

/// Checklist source configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChecklistConfig {
    /// Path to a checklist JSON file.
    /// Uses the built-in checklist when unset.
    pub path: Option<PathBuf>,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            consent_key: DEFAULT_CONSENT_KEY.to_string(),
            max_queued_events: 0,
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            state_key: DEFAULT_STATE_KEY.to_string(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("VIBECHECK_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.analytics.consent_key.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "analytics.consent_key must not be empty".to_string(),
            });
        }

        if self.persistence.state_key.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "persistence.state_key must not be empty".to_string(),
            });
        }

        if self.analytics.consent_key == self.persistence.state_key {
            return Err(Error::ConfigValidation {
                message: format!(
                    "analytics.consent_key and persistence.state_key must differ (both '{}')",
                    self.persistence.state_key
                ),
            });
        }

        if self.persistence.debounce_ms == 0 {
            return Err(Error::ConfigValidation {
                message: "debounce_ms must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the debounce window as a Duration.
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.persistence.debounce_ms)
    }

    /// Get the queue cap, if one is configured.
    #[must_use]
    pub fn max_queued_events(&self) -> Option<usize> {
        match self.analytics.max_queued_events {
            0 => None,
            n => Some(n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.analytics.consent_key, "consent_state");
        assert_eq!(config.persistence.state_key, "vibe-checklist-state");
        assert_eq!(config.persistence.debounce_ms, 500);
        assert!(config.storage.database_path.is_none());
        assert!(config.checklist.path.is_none());
    }

    #[test]
    fn test_validate_valid_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_debounce() {
        let mut config = Config::default();
        config.persistence.debounce_ms = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("debounce_ms"));
    }

    #[test]
    fn test_validate_empty_consent_key() {
        let mut config = Config::default();
        config.analytics.consent_key = "  ".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("consent_key"));
    }

    #[test]
    fn test_validate_empty_state_key() {
        let mut config = Config::default();
        config.persistence.state_key = String::new();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("state_key"));
    }

    #[test]
    fn test_validate_colliding_keys() {
        let mut config = Config::default();
        config.persistence.state_key = config.analytics.consent_key.clone();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("must differ"));
    }

    #[test]
    fn test_database_path_default() {
        let config = Config::default();
        let path = config.database_path();

        assert!(path.to_string_lossy().contains("vibecheck.db"));
    }

    #[test]
    fn test_database_path_custom() {
        let mut config = Config::default();
        config.storage.database_path = Some(PathBuf::from("/custom/path/db.sqlite"));

        assert_eq!(
            config.database_path(),
            PathBuf::from("/custom/path/db.sqlite")
        );
    }

    #[test]
    fn test_debounce() {
        let config = Config::default();
        assert_eq!(config.debounce(), Duration::from_millis(500));
    }

    #[test]
    fn test_max_queued_events_unbounded_by_default() {
        let config = Config::default();
        assert!(config.max_queued_events().is_none());
    }

    #[test]
    fn test_max_queued_events_when_set() {
        let mut config = Config::default();
        config.analytics.max_queued_events = 100;
        assert_eq!(config.max_queued_events(), Some(100));
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("vibecheck"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let result = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml")));
        assert!(result.is_ok());
        assert_eq!(result.unwrap(), Config::default());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[persistence]\ndebounce_ms = 250\n\n[analytics]\nmax_queued_events = 10\n",
        )
        .unwrap();

        let config = Config::load_from(Some(path)).unwrap();
        assert_eq!(config.persistence.debounce_ms, 250);
        assert_eq!(config.max_queued_events(), Some(10));
        assert_eq!(config.persistence.state_key, DEFAULT_STATE_KEY);
    }

    #[test]
    fn test_load_reads_every_section_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[storage]\ndatabase_path = \"/tmp/vc.db\"\n\n\
             [analytics]\nconsent_key = \"my_consent\"\n\n\
             [persistence]\nstate_key = \"my_state\"\n\n\
             [checklist]\npath = \"/tmp/list.json\"\n",
        )
        .unwrap();

        let config = Config::load_from(Some(path)).unwrap();
        assert_eq!(config.database_path(), PathBuf::from("/tmp/vc.db"));
        assert_eq!(config.analytics.consent_key, "my_consent");
        assert_eq!(config.persistence.state_key, "my_state");
        assert_eq!(config.checklist.path, Some(PathBuf::from("/tmp/list.json")));
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[persistence]\ndebounce_ms = 0\n").unwrap();

        let result = Config::load_from(Some(path));
        assert!(matches!(result, Err(Error::ConfigValidation { .. })));
    }

    #[test]
    fn test_persistence_config_deserialize() {
        let json = r#"{"debounce_ms": 1000}"#;
        let persistence: PersistenceConfig = serde_json::from_str(json).unwrap();
        assert_eq!(persistence.debounce_ms, 1000);
        assert_eq!(persistence.state_key, DEFAULT_STATE_KEY);
    }

    #[test]
    fn test_analytics_config_serialize() {
        let analytics = AnalyticsConfig::default();
        let json = serde_json::to_string(&analytics).unwrap();
        assert!(json.contains("consent_key"));
        assert!(json.contains("max_queued_events"));
    }
}
