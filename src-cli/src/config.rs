//! Host configuration.

use screenwatch_core::DEFAULT_CHANNEL;
use screenwatch_platform::SysfsSourceConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Config not found: {0}")]
    NotFound(PathBuf),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// How events are written to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One `ON` / `OFF` per line.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Event channel name, used in logs and JSON output.
    pub channel: String,
    pub source: SysfsSourceConfig,
    pub format: OutputFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            channel: DEFAULT_CHANNEL.into(),
            source: SysfsSourceConfig::default(),
            format: OutputFormat::default(),
        }
    }
}

/// `<config_dir>/screenwatch/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|dir| dir.join("screenwatch").join("config.json"))
}

pub fn parse_config(json: &str) -> ConfigResult<AppConfig> {
    Ok(serde_json::from_str(json)?)
}

/// Load configuration.
///
/// An explicit path must exist. Without one, the default location is used
/// when present and built-in defaults otherwise.
pub fn load_config(explicit: Option<&Path>) -> ConfigResult<AppConfig> {
    let path = match explicit {
        Some(path) if !path.exists() => return Err(ConfigError::NotFound(path.to_path_buf())),
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            _ => {
                debug!("No config file, using defaults");
                return Ok(AppConfig::default());
            }
        },
    };

    let json = fs::read_to_string(&path)?;
    let config = parse_config(&json)?;
    info!(?path, "Loaded config");
    Ok(config)
}
