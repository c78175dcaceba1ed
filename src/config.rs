use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::AppKind;
use crate::utils;

/// Current configuration version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Falls back to the profile's data directory when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<String>,
    #[serde(default = "default_app")]
    pub default_app: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_export_dir")]
    pub export_dir: String,
    #[serde(default = "default_config_version")]
    pub config_version: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            default_app: default_app(),
            log_level: default_log_level(),
            export_dir: default_export_dir(),
            config_version: Some(CURRENT_CONFIG_VERSION),
        }
    }
}

// Default value functions
fn default_app() -> String {
    "library".to_string()
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_export_dir() -> String {
    ".".to_string()
}

fn default_config_version() -> Option<u32> {
    Some(CURRENT_CONFIG_VERSION)
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config directory: {0}")]
    ConfigDirError(String),
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to write config file: {0}")]
    WriteError(String),
    #[error("Invalid default_app: {0}")]
    InvalidApp(String),
}

impl Config {
    /// Load configuration from file, or create default if missing
    /// Uses the provided profile to determine config and database paths
    pub fn load_with_profile(profile: utils::Profile) -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path(profile)?;
        Self::load_or_create(&config_path, profile)
    }

    /// Load `config_path`, writing a default config there first if it is missing
    fn load_or_create(config_path: &Path, profile: utils::Profile) -> Result<Self, ConfigError> {
        if config_path.exists() {
            let mut config = Self::load_from_path(config_path)?;

            // A database_path set in the file wins; otherwise use the profile's
            if config.database_path.is_none() {
                config.database_path = Some(Self::default_database_path_for_profile(profile));
            }

            Ok(config)
        } else {
            // Create default config and save it
            let mut config = Config::default();
            config.database_path = Some(Self::default_database_path_for_profile(profile));
            config.save_to_path(config_path)?;
            Ok(config)
        }
    }

    /// Load configuration from an explicit file; missing keys take defaults
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to an explicit file
    pub fn save_to_path(&mut self, path: &Path) -> Result<(), ConfigError> {
        // Ensure config version is set before saving
        self.config_version = Some(CURRENT_CONFIG_VERSION);

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ConfigError::WriteError(e.to_string()))?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::WriteError(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the config file
    pub fn get_config_path(profile: utils::Profile) -> Result<PathBuf, ConfigError> {
        let config_dir = utils::get_config_dir(profile)
            .ok_or_else(|| ConfigError::ConfigDirError("Could not determine config directory".to_string()))?;
        Ok(config_dir.join("config.toml"))
    }

    /// Get default database path for a specific profile
    fn default_database_path_for_profile(profile: utils::Profile) -> String {
        if let Some(data_dir) = utils::get_data_dir(profile) {
            data_dir.join("tally.db").to_string_lossy().to_string()
        } else {
            match profile {
                utils::Profile::Dev => "~/.local/share/tally-dev/tally.db".to_string(),
                utils::Profile::Prod => "~/.local/share/tally/tally.db".to_string(),
            }
        }
    }

    /// Get the expanded database path (with ~ expansion)
    pub fn get_database_path(&self, profile: utils::Profile) -> PathBuf {
        match self.database_path.as_deref() {
            Some(path) => utils::expand_path(path),
            None => utils::expand_path(&Self::default_database_path_for_profile(profile)),
        }
    }

    /// Get the expanded export directory
    pub fn get_export_dir(&self) -> PathBuf {
        utils::expand_path(&self.export_dir)
    }

    /// Application used when no `--app` flag is given
    pub fn default_app_kind(&self) -> Result<AppKind, ConfigError> {
        self.default_app.parse().map_err(ConfigError::InvalidApp)
    }
}
