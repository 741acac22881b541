
use crate::daemon::{DEFAULT_LOGGER_NAME, DEFAULT_STOP_TIMEOUT, DaemonLogger, DaemonSettings};
use crate::error::{DaemonError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GlobalConfig {
    #[serde(default)]
    pub daemons: DaemonsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonsConfig {
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,
    #[serde(default = "default_logger")]
    pub default_logger: String, // used when a daemon's template names no logger
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default)]
    pub file_enabled: bool,
    pub file_path: Option<String>, // If None, uses default ~/.daemonctl/logs/
}

impl Default for DaemonsConfig {
    fn default() -> Self {
        Self {
            stop_timeout_secs: default_stop_timeout_secs(),
            default_logger: default_logger(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_enabled: false,
            file_path: None,
        }
    }
}

impl GlobalConfig {
    pub async fn load() -> Result<Self> {
        let config_dir = get_config_dir()?;
        let config_path = config_dir.join("config.toml");
        Self::load_from_path(&config_path).await
    }

    pub async fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            // Return default config if file doesn't exist
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Self = toml::from_str(&content)?;

        config.validate()?;

        Ok(config)
    }

    pub async fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| DaemonError::ConfigError(format!("Failed to serialize config: {e}")))?;

        tokio::fs::write(path, content).await?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.daemons.stop_timeout_secs == 0 {
            return Err(DaemonError::ConfigError(
                "Daemon stop timeout must be greater than 0".to_string(),
            ));
        }

        if self.daemons.default_logger.trim().is_empty() {
            return Err(DaemonError::ConfigError(
                "Default daemon logger must not be empty".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(DaemonError::ConfigError(format!(
                "Invalid logging level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }

    /// Settings handed to every daemon handle
    pub fn daemon_settings(&self) -> DaemonSettings {
        DaemonSettings {
            stop_timeout: Duration::from_secs(self.daemons.stop_timeout_secs),
            default_logger: DaemonLogger::new(self.daemons.default_logger.clone()),
        }
    }

    pub fn get_log_dir(&self) -> PathBuf {
        match &self.logging.file_path {
            Some(path) => PathBuf::from(path),
            None => {
                let config_dir = get_config_dir().unwrap_or_else(|_| PathBuf::from(".daemonctl"));
                config_dir.join("logs")
            }
        }
    }
}

pub fn get_config_dir() -> Result<PathBuf> {
    let home_dir = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| DaemonError::ConfigError("Could not determine home directory".to_string()))?;

    Ok(PathBuf::from(home_dir).join(".daemonctl"))
}

// Default value functions for serde
fn default_stop_timeout_secs() -> u64 {
    DEFAULT_STOP_TIMEOUT.as_secs()
}
fn default_logger() -> String {
    DEFAULT_LOGGER_NAME.to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
