
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("Command failed: '{command}' exited with status {exit_code}")]
    CommandFailed { command: String, exit_code: i32 },

    #[error("Command crashed: '{command}'")]
    CommandCrashed { command: String },

    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Timeout: '{command}' did not exit within {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("Daemon {role}.{id} is not running")]
    NotRunning { role: String, id: String },

    #[error("Spawn error: {0}")]
    SpawnError(String),

    #[error("Replacing daemon {role}.{id} aborted: {source}")]
    ReplacementAborted {
        role: String,
        id: String,
        #[source]
        source: Box<DaemonError>,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl From<toml::de::Error> for DaemonError {
    fn from(error: toml::de::Error) -> Self {
        DaemonError::ConfigError(error.to_string())
    }
}

impl DaemonError {
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            DaemonError::IoError(_) | DaemonError::ConnectionLost(_) | DaemonError::Timeout { .. }
        )
    }

    /// True for the failures a remote wait can raise, looking through a
    /// [`DaemonError::ReplacementAborted`] wrapper.
    pub fn is_wait_failure(&self) -> bool {
        match self {
            DaemonError::CommandFailed { .. }
            | DaemonError::CommandCrashed { .. }
            | DaemonError::ConnectionLost(_)
            | DaemonError::Timeout { .. } => true,
            DaemonError::ReplacementAborted { source, .. } => source.is_wait_failure(),
            _ => false,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            DaemonError::CommandFailed { .. } => "COMMAND_FAILED",
            DaemonError::CommandCrashed { .. } => "COMMAND_CRASHED",
            DaemonError::ConnectionLost(_) => "CONNECTION_LOST",
            DaemonError::Timeout { .. } => "TIMEOUT",
            DaemonError::NotRunning { .. } => "NOT_RUNNING",
            DaemonError::SpawnError(_) => "SPAWN_ERROR",
            DaemonError::ReplacementAborted { .. } => "REPLACEMENT_ABORTED",
            DaemonError::ConfigError(_) => "CONFIG_ERROR",
            DaemonError::IoError(_) => "IO_ERROR",
            DaemonError::JsonError(_) => "JSON_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, DaemonError>;
