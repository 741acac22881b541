use crate::daemon::{CommandOptions, CommandTemplate, DaemonLogger};
use crate::error::{DaemonError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

/// Hosts the local remote answers for.
pub const LOCAL_HOSTS: [&str; 2] = ["local", "localhost"];

/// A cluster description: the daemons to launch, one `[[daemon]]` table each.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterConfig {
    #[serde(default, rename = "daemon")]
    pub daemons: Vec<DaemonDefinition>,
}

/// Daemon ids may be written as strings or integers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DaemonId {
    Number(i64),
    Text(String),
}

impl fmt::Display for DaemonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DaemonId::Number(n) => write!(f, "{n}"),
            DaemonId::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonDefinition {
    pub role: String,
    pub id: DaemonId,
    #[serde(default = "default_host")]
    pub host: String,
    /// Command line, split with shell quoting rules
    pub command: Option<String>,
    /// Pre-split command, alternative to `command`
    pub args: Option<Vec<String>>,
    pub cwd: Option<PathBuf>,
    pub logger: Option<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl DaemonDefinition {
    pub fn is_local(&self) -> bool {
        LOCAL_HOSTS.contains(&self.host.as_str())
    }

    /// Build the launch template this definition describes
    pub fn template(&self) -> Result<CommandTemplate> {
        let args = match (&self.command, &self.args) {
            (Some(command), None) => shlex::split(command).ok_or_else(|| {
                DaemonError::ConfigError(format!(
                    "Daemon {}.{}: failed to parse command '{}'",
                    self.role, self.id, command
                ))
            })?,
            (None, Some(args)) => args.clone(),
            (Some(_), Some(_)) => {
                return Err(DaemonError::ConfigError(format!(
                    "Daemon {}.{}: set either 'command' or 'args', not both",
                    self.role, self.id
                )));
            }
            (None, None) => {
                return Err(DaemonError::ConfigError(format!(
                    "Daemon {}.{}: no command given",
                    self.role, self.id
                )));
            }
        };

        if args.is_empty() {
            return Err(DaemonError::ConfigError(format!(
                "Daemon {}.{}: command is empty",
                self.role, self.id
            )));
        }

        let options = CommandOptions {
            args,
            logger: self.logger.as_deref().map(DaemonLogger::new),
            cwd: self.cwd.clone(),
            env: self.env.clone(),
        };
        Ok(CommandTemplate::new(options))
    }
}

impl ClusterConfig {
    pub async fn load_from_path(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            DaemonError::ConfigError(format!(
                "Failed to read cluster file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();

        for daemon in &self.daemons {
            if daemon.role.trim().is_empty() {
                return Err(DaemonError::ConfigError(
                    "Daemon role must not be empty".to_string(),
                ));
            }

            let key = (daemon.role.clone(), daemon.id.to_string());
            if !seen.insert(key) {
                return Err(DaemonError::ConfigError(format!(
                    "Daemon {}.{} is declared more than once",
                    daemon.role, daemon.id
                )));
            }

            daemon.template()?;
        }

        Ok(())
    }

    /// Definitions whose host is not served by the local remote
    pub fn remote_hosts(&self) -> Vec<&DaemonDefinition> {
        self.daemons.iter().filter(|d| !d.is_local()).collect()
    }
}

fn default_host() -> String {
    "local".to_string()
}
