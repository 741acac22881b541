
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Daemonctl - start, stop and address role-based daemons
#[derive(Parser, Debug)]
#[command(name = "daemonctl")]
#[command(about = "Launch and manage role-addressed daemons described by a cluster file")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct CliArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Global configuration file (defaults to ~/.daemonctl/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check a cluster file and list the daemons it declares
    Validate {
        /// Path to the cluster file
        cluster: PathBuf,
        /// Print the daemons as JSON
        #[arg(long)]
        json: bool,
    },

    /// Launch every daemon of a cluster file on this host
    Run {
        /// Path to the cluster file
        cluster: PathBuf,
        /// Seconds to wait for each daemon to exit when stopping
        #[arg(long)]
        stop_timeout: Option<u64>,
        /// Wait for the daemons to exit on their own instead of stopping them on Ctrl-C
        #[arg(long)]
        wait: bool,
    },
}

/// One line of `validate` output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonSummary {
    pub role: String,
    pub id: String,
    pub host: String,
    pub command: String,
}

#[derive(Debug)]
pub enum CliResult {
    Success(String),
    Error(String),
}

impl std::fmt::Display for CliResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliResult::Success(msg) => write!(f, "{msg}"),
            CliResult::Error(msg) => write!(f, "Error: {msg}"),
        }
    }
}

pub fn format_daemon_list(daemons: &[DaemonSummary]) -> String {
    if daemons.is_empty() {
        return "No daemons declared".to_string();
    }

    let mut output = format!("{:<8} {:<8} {:<12} COMMAND\n", "ROLE", "ID", "HOST");
    for daemon in daemons {
        output.push_str(&format!(
            "{:<8} {:<8} {:<12} {}\n",
            daemon.role, daemon.id, daemon.host, daemon.command
        ));
    }
    output.push_str(&format!("\n{} daemon(s) declared", daemons.len()));
    output
}
