//! Vault configuration
//!
//! Defaults, then `config.json` in the platform config dir, then the
//! `CONTENT_VAULT_DB` environment variable. Loading never fails: a missing or
//! broken config file means defaults.

use crate::interface::VaultError;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

const APP_NAME: &str = "content-vault";
const CONFIG_FILE: &str = "config.json";
const DB_FILE: &str = "vault.sqlite";

/// Environment variable overriding the database location
pub const DB_PATH_ENV: &str = "CONTENT_VAULT_DB";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VaultConfig {
    /// SQLite file holding every durable slot
    pub db_path: PathBuf,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
        .join(DB_FILE)
}

/// Location of the user's config file, if the platform has a config dir
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME).join(CONFIG_FILE))
}

impl VaultConfig {
    /// Load from the user's config dir and apply environment overrides
    pub fn load() -> Self {
        let config = match config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        };
        config.with_db_override(std::env::var_os(DB_PATH_ENV))
    }

    /// Load from an explicit file, falling back to defaults on any problem
    pub fn load_from(path: &Path) -> Self {
        match Self::try_load_from(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                Self::default()
            }
        }
    }

    fn try_load_from(path: &Path) -> Result<Self, VaultError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Replace the database path when an override is set and non-empty
    pub fn with_db_override(mut self, value: Option<OsString>) -> Self {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            self.db_path = PathBuf::from(value);
        }
        self
    }
}
