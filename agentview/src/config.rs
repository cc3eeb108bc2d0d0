//! Configuration file.
//!
//! Looked up at `--config <path>`, then `$AGENTVIEW_CONFIG`, then
//! `<config dir>/agentview/config.toml`. A missing default file means
//! defaults; a missing explicit file is an error.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::render::WindowConfig;
use crate::state::SettingsPatch;

pub const ENV_AGENTVIEW_CONFIG: &str = "AGENTVIEW_CONFIG";

const DEFAULT_PORT: u16 = 58231;
const DEFAULT_BROADCAST_CAPACITY: usize = 256;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub window: WindowConfig,
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Capacity of the WebSocket broadcast channel; slow clients lag past it.
    pub broadcast_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
        }
    }
}

/// Initial display preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub show_thinking: bool,
    pub collapse_completed_tools: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            show_thinking: true,
            collapse_completed_tools: true,
        }
    }
}

impl DisplayConfig {
    pub const fn as_patch(&self) -> SettingsPatch {
        SettingsPatch {
            show_thinking: Some(self.show_thinking),
            collapse_completed_tools: Some(self.collapse_completed_tools),
        }
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("agentview").join("config.toml"))
}

/// Load configuration, falling back to defaults when no file exists at the
/// implicit location.
pub fn load(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    if let Some(path) = explicit {
        return load_from_path(path);
    }
    let from_env = std::env::var_os(ENV_AGENTVIEW_CONFIG)
        .filter(|raw| !raw.is_empty())
        .map(PathBuf::from);
    if let Some(path) = from_env {
        return load_from_path(&path);
    }
    match default_config_path() {
        Some(path) if path.exists() => load_from_path(&path),
        _ => {
            tracing::debug!("no config file, using defaults");
            Ok(Config::default())
        }
    }
}

pub fn load_from_path(path: &Path) -> Result<Config, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}
