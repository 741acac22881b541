use crate::cli::commands::{CliArgs, CliResult, Commands, DaemonSummary, format_daemon_list};
use crate::config::{ClusterConfig, GlobalConfig};
use crate::daemon::DaemonRegistry;
use crate::error::{DaemonError, Result};
use crate::remote::{LocalRemote, Remote};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Executes parsed `daemonctl` commands
pub struct CliHandler {
    pub global_config: GlobalConfig,
    pub verbose: bool,
}

impl CliHandler {
    pub fn new(global_config: GlobalConfig) -> Self {
        Self {
            global_config,
            verbose: false,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Main entry point for handling CLI commands
    pub async fn handle_command(&mut self, args: CliArgs) -> Result<CliResult> {
        self.verbose = args.verbose;

        match &args.command {
            Commands::Validate { cluster, json } => self.validate(cluster, *json).await,
            Commands::Run {
                cluster,
                stop_timeout,
                wait,
            } => {
                let timeout = stop_timeout
                    .map(Duration::from_secs)
                    .unwrap_or_else(|| self.global_config.daemon_settings().stop_timeout);
                self.run(cluster, timeout, *wait).await
            }
        }
    }

    async fn validate(&self, path: &Path, json: bool) -> Result<CliResult> {
        let cluster = ClusterConfig::load_from_path(path).await?;
        let summaries = Self::summarize(&cluster)?;

        if json {
            return Ok(CliResult::Success(serde_json::to_string_pretty(&summaries)?));
        }
        Ok(CliResult::Success(format_daemon_list(&summaries)))
    }

    pub fn summarize(cluster: &ClusterConfig) -> Result<Vec<DaemonSummary>> {
        cluster
            .daemons
            .iter()
            .map(|daemon| -> Result<DaemonSummary> {
                Ok(DaemonSummary {
                    role: daemon.role.clone(),
                    id: daemon.id.to_string(),
                    host: daemon.host.clone(),
                    command: daemon.template()?.command_line(),
                })
            })
            .collect()
    }

    async fn run(&self, path: &Path, stop_timeout: Duration, wait: bool) -> Result<CliResult> {
        let cluster = ClusterConfig::load_from_path(path).await?;

        if let Some(daemon) = cluster.remote_hosts().first() {
            return Err(DaemonError::ConfigError(format!(
                "Daemon {}.{} targets host '{}'; only local hosts can be run",
                daemon.role, daemon.id, daemon.host
            )));
        }

        let remote: Arc<dyn Remote> = Arc::new(LocalRemote::new());
        let mut registry = DaemonRegistry::new(self.global_config.daemon_settings());

        for daemon in &cluster.daemons {
            let template = daemon.template()?;
            let added = registry
                .add_daemon(remote.clone(), &daemon.role, &daemon.id, template)
                .await
                .map(|_| ());
            if let Err(e) = added {
                error!("Failed to start {}.{}: {}", daemon.role, daemon.id, e);
                let failures = registry.stop_all(stop_timeout).await;
                for (role, id, stop_error) in &failures {
                    warn!("Daemon {}.{} did not stop cleanly: {}", role, id, stop_error);
                }
                return Ok(CliResult::Error(format!(
                    "Failed to start {}.{}: {e}",
                    daemon.role, daemon.id
                )));
            }
            if self.verbose {
                eprintln!("Started {}.{}", daemon.role, daemon.id);
            }
        }

        info!("{} daemon(s) running", registry.len());

        let failures = if wait {
            Self::wait_for_all(&mut registry).await
        } else {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
            }
            info!("Stopping daemons");
            registry.stop_all(stop_timeout).await
        };

        if failures.is_empty() {
            return Ok(CliResult::Success(format!(
                "Stopped {} daemon(s)",
                registry.len()
            )));
        }

        let details: Vec<String> = failures
            .iter()
            .map(|(role, id, e)| format!("{role}.{id}: {e}"))
            .collect();
        Ok(CliResult::Error(format!(
            "{} daemon(s) failed:\n{}",
            failures.len(),
            details.join("\n")
        )))
    }

    /// Wait for every daemon to exit on its own, role by role
    async fn wait_for_all(registry: &mut DaemonRegistry) -> Vec<(String, String, DaemonError)> {
        let mut roles: Vec<String> = registry.roles().map(str::to_string).collect();
        roles.sort();

        let mut failures = Vec::new();
        for role in &roles {
            for handle in registry.iter_daemons_of_role_mut(role) {
                if let Err(e) = handle.wait_for_exit().await {
                    failures.push((handle.role().to_string(), handle.id().to_string(), e));
                }
            }
        }
        failures
    }
}
