//! Session configuration

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use placemark_common::LogOptions;
use serde::{Deserialize, Serialize};

use crate::bus::DEFAULT_CHANNEL_CAPACITY;
use crate::error::{StoreError, StoreResult};

/// Environment variable prefix (`PLACEMARK_HISTORY__MAX_UNDO_STACK_SIZE=50`)
pub const ENV_PREFIX: &str = "PLACEMARK";

/// Moment log configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum number of undo entries; oldest entries are evicted first.
    /// Unbounded when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_undo_stack_size: Option<usize>,
}

/// Durable mirror configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Mirror every mutation to `path`
    pub enabled: bool,
    /// Snapshot file location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Configuration of one editing session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub history: HistoryConfig,
    pub persistence: PersistenceConfig,
    /// Buffered change notifications per subscriber
    pub event_channel_capacity: usize,
    /// Minimum log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            history: HistoryConfig::default(),
            persistence: PersistenceConfig::default(),
            event_channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            log_level: "info".to_string(),
        }
    }
}

impl SessionConfig {
    /// Check value ranges
    pub fn validate(&self) -> StoreResult<()> {
        if self.event_channel_capacity == 0 {
            return Err(StoreError::config_error(
                "event_channel_capacity must be greater than 0",
            ));
        }
        if self.history.max_undo_stack_size == Some(0) {
            return Err(StoreError::config_error(
                "history.max_undo_stack_size must be greater than 0",
            ));
        }
        if self.persistence.enabled && self.persistence.path.is_none() {
            return Err(StoreError::config_error(
                "persistence.path is required when persistence is enabled",
            ));
        }
        Ok(())
    }

    /// Logging options derived from `log_level`
    pub fn log_options(&self) -> LogOptions {
        LogOptions::from_level_str(&self.log_level)
    }
}

/// Loads and saves [`SessionConfig`] from a TOML file plus environment overrides
pub struct ConfigLoader {
    config_path: PathBuf,
    env_prefix: String,
}

impl ConfigLoader {
    /// Loader reading `path` (the file may be absent)
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        ConfigLoader {
            config_path: path.into(),
            env_prefix: ENV_PREFIX.to_string(),
        }
    }

    /// Default location: `<config dir>/placemark/config.toml`
    pub fn new() -> Self {
        let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::with_path(base.join("placemark").join("config.toml"))
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load, apply environment overrides and validate
    pub fn load(&self) -> StoreResult<SessionConfig> {
        let built = Config::builder()
            .add_source(File::from(self.config_path.clone()).required(false))
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| StoreError::config_error(e.to_string()))?;

        let config: SessionConfig = built
            .try_deserialize()
            .map_err(|e| StoreError::config_error(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate and write `config` as TOML
    pub fn save(&self, config: &SessionConfig) -> StoreResult<()> {
        config.validate()?;
        let text = toml::to_string(config).map_err(|e| StoreError::config_error(e.to_string()))?;
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.config_path, text)?;
        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
