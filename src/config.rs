use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::meme::lock::LockOptions;

/// Main memes configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub lock: LockConfig,
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Meme state file
    pub state: PathBuf,
    /// Dynamics configuration (evaporation rates, amplification, pruning)
    pub dynamics: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LockConfig {
    /// How long to wait for another writer to release the store
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Off,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Off => "off",
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            state: PathBuf::from(".memes"),
            dynamics: PathBuf::from("workflow_dynamics.json"),
        }
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        let defaults = LockOptions::default();
        Self {
            timeout_ms: defaults.timeout.as_millis() as u64,
        }
    }
}

impl LockConfig {
    pub fn options(&self) -> LockOptions {
        LockOptions {
            timeout: Duration::from_millis(self.timeout_ms),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Check MEMES_CONFIG env var
        if let Ok(env_path) = std::env::var("MEMES_CONFIG") {
            let path = PathBuf::from(env_path);
            if path.exists() {
                match Self::load_from_file(&path) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from MEMES_CONFIG: {}", e);
                    }
                }
            }
        }

        // Try MEMES_DIR/memes.yaml
        if let Ok(memes_dir) = std::env::var("MEMES_DIR") {
            let path = PathBuf::from(memes_dir).join("memes.yaml");
            if path.exists() {
                match Self::load_from_file(&path) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from MEMES_DIR: {}", e);
                    }
                }
            }
        }

        // Try ~/.config/memes/memes.yaml
        if let Some(config_dir) = dirs::config_dir() {
            let path = config_dir.join("memes").join("memes.yaml");
            if path.exists() {
                match Self::load_from_file(&path) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", path.display(), e);
                    }
                }
            }
        }

        // Try ./memes.yaml (project-local)
        let local_config = PathBuf::from("memes.yaml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load local config: {}", e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Resolved state file path, `override_path` winning over config
    pub fn state_path(&self, override_path: Option<&PathBuf>) -> PathBuf {
        Self::expand_path(override_path.unwrap_or(&self.paths.state))
    }

    /// Resolved dynamics config path, `override_path` winning over config
    pub fn dynamics_path(&self, override_path: Option<&PathBuf>) -> PathBuf {
        Self::expand_path(override_path.unwrap_or(&self.paths.dynamics))
    }

    /// Expand a path that may contain ~ or env vars
    pub fn expand_path(path: &Path) -> PathBuf {
        let path_str = path.to_string_lossy();
        let expanded = shellexpand::full(&path_str).unwrap_or_else(|_| path_str.clone());
        PathBuf::from(expanded.as_ref())
    }
}
