//! Application directory paths used by the alerts engine.
//!
//! Uses the [`dirs`] crate for platform-appropriate resolution.
//!
//! # Environment Overrides
//!
//! - `FAE_DATA_DIR` overrides [`data_dir`]
//! - `FAE_CONFIG_DIR` overrides [`config_dir`]

use std::path::PathBuf;

/// Application data root directory.
///
/// Resolves to `dirs::data_dir()/fae/` by default.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("FAE_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("fae"))
        .unwrap_or_else(|| PathBuf::from("/tmp/fae-data"))
}

/// Application config directory.
///
/// Resolves to `dirs::config_dir()/fae/` by default.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("FAE_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("fae"))
        .unwrap_or_else(|| PathBuf::from("/tmp/fae-config"))
}

/// Alerts database file (`data_dir()/alerts.db`).
#[must_use]
pub fn alerts_db_file() -> PathBuf {
    data_dir().join("alerts.db")
}

/// Alerts config file (`config_dir()/alerts.toml`).
#[must_use]
pub fn alerts_config_file() -> PathBuf {
    config_dir().join("alerts.toml")
}
