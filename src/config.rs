//! Configuration types for the alerts engine.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AlertsError, Result};

/// Top-level configuration for the alerts engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertsConfig {
    /// Scheduling windows.
    pub scheduler: SchedulerConfig,
    /// Alert database settings.
    pub storage: StorageConfig,
}

/// Scheduling windows applied by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds after its due time that an alert is still allowed to fire.
    pub past_due_limit_secs: u64,
    /// Seconds after its due time that an alert may keep rendering.
    pub max_rendering_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            past_due_limit_secs: 30 * 60,
            max_rendering_secs: 60 * 60,
        }
    }
}

impl SchedulerConfig {
    /// Past-due window as a [`Duration`].
    #[must_use]
    pub fn past_due_limit(&self) -> Duration {
        Duration::from_secs(self.past_due_limit_secs)
    }

    /// Maximum rendering window as a [`Duration`].
    #[must_use]
    pub fn max_rendering_time(&self) -> Duration {
        Duration::from_secs(self.max_rendering_secs)
    }
}

/// Alert database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path of the SQLite database file.
    pub database_path: PathBuf,
    /// How many times a busy database is retried when opening.
    pub open_retry_attempts: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: crate::fae_dirs::alerts_db_file(),
            open_retry_attempts: 3,
        }
    }
}

impl AlertsConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| AlertsError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AlertsError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `<config dir>/fae/alerts.toml`.
    pub fn default_config_path() -> PathBuf {
        crate::fae_dirs::alerts_config_file()
    }

    /// Load from `path` if it exists, otherwise fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error only if the file exists but cannot be parsed.
    pub fn load_or_default(path: &std::path::Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }
}
