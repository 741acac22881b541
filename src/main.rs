use clap::Parser;
use daemonctl::cli::{CliArgs, CliHandler, CliResult};
use daemonctl::config::GlobalConfig;
use daemonctl::logging;
use std::process;

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    // Load global configuration
    let loaded = match &args.config {
        Some(path) => GlobalConfig::load_from_path(path).await,
        None => GlobalConfig::load().await,
    };
    let global_config = match loaded {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Failed to load global configuration, using defaults: {e}");
            GlobalConfig::default()
        }
    };

    if let Err(e) = logging::init_cli_logging(&global_config, args.verbose) {
        eprintln!("Warning: Failed to initialize logging: {e}");
    }

    let mut handler = CliHandler::new(global_config).with_verbose(args.verbose);

    let result = match handler.handle_command(args).await {
        Ok(result) => result,
        Err(e) => CliResult::Error(format!("Failed to execute command: {e}")),
    };

    match result {
        CliResult::Success(msg) => {
            println!("{msg}");
            process::exit(0);
        }
        CliResult::Error(msg) => {
            eprintln!("{msg}");
            process::exit(1);
        }
    }
}
