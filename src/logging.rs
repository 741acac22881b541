use crate::config::GlobalConfig;
use crate::error::{DaemonError, Result};
use std::path::PathBuf;
use std::sync::Once;
use tracing::{debug, info};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*, registry::Registry};

static LOGGER_INIT: Once = Once::new();

/// Initialize the logging system for a component. Only the first call in a
/// process installs a subscriber.
fn init_component_logging(config: &GlobalConfig, component: &str) -> Result<()> {
    let mut init_result = Ok(());

    LOGGER_INIT.call_once(|| {
        init_result = init_component_logging_internal(config, component);
    });

    init_result
}

fn init_component_logging_internal(config: &GlobalConfig, component: &str) -> Result<()> {
    let log_level = config.logging.level.to_lowercase();

    let log_dir = if config.logging.file_enabled {
        let log_dir = config.get_log_dir();
        std::fs::create_dir_all(&log_dir).map_err(|e| {
            DaemonError::ConfigError(format!("Failed to create log directory: {e}"))
        })?;
        Some(log_dir)
    } else {
        None
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&log_level))
        .map_err(|e| DaemonError::ConfigError(format!("Invalid log level '{log_level}': {e}")))?;

    let registry = Registry::default().with(filter);

    let log_file_path: Option<PathBuf> = match log_dir {
        Some(log_dir) => {
            let file_appender =
                tracing_appender::rolling::never(&log_dir, format!("{component}.log"));
            let file_layer = fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true);

            let stderr_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true)
                .with_target(false);

            registry.with(file_layer).with(stderr_layer).init();
            Some(log_dir.join(format!("{component}.log")))
        }
        None => {
            let stderr_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true)
                .with_target(false);

            registry.with(stderr_layer).init();
            None
        }
    };

    info!("{} logging initialized with level: {}", component, log_level);
    if let Some(ref log_path) = log_file_path {
        info!("Log file: {}", log_path.display());
    }

    Ok(())
}

/// Initialize logging for the `daemonctl` command line
pub fn init_cli_logging(config: &GlobalConfig, verbose: bool) -> Result<()> {
    let mut cli_config = config.clone();

    if verbose
        && !matches!(
            cli_config.logging.level.to_lowercase().as_str(),
            "debug" | "trace"
        )
    {
        cli_config.logging.level = "debug".to_string();
    }

    init_component_logging(&cli_config, "daemonctl")?;
    debug!("CLI logging initialized");
    Ok(())
}
