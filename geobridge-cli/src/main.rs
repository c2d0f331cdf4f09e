//! GeoBridge CLI - Command-line interface
//!
//! Runs the location bridge against a simulated device and prints every
//! host result as a JSON line on stdout. Logs go to stderr and the log file.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;

use geobridge::logging::{default_log_dir, default_log_file, init_logging};

mod commands;
mod error;

use commands::get::GetArgs;
use commands::watch::WatchArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "geobridge")]
#[command(version, about = "Device geolocation bridge", long_about = None)]
struct Cli {
    /// Configuration file (default: <config dir>/geobridge/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for the log file
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Request a single location fix
    Get {
        /// Require the high-accuracy (satellite) source
        #[arg(long)]
        high_accuracy: bool,

        /// Accept a cached fix up to this old, in milliseconds
        #[arg(long, default_value = "0")]
        max_age_ms: i64,

        /// Give up after this many milliseconds (0 = no timeout)
        #[arg(long, default_value = "10000")]
        timeout_ms: i64,

        /// Request key
        #[arg(long, default_value = "cli-get")]
        key: String,
    },

    /// Stream location fixes until Ctrl-C
    Watch {
        /// Require the high-accuracy (satellite) source
        #[arg(long)]
        high_accuracy: bool,

        /// Update interval in milliseconds (0 = configured default)
        #[arg(long, default_value = "0")]
        interval_ms: i64,

        /// Stop after this many results
        #[arg(long)]
        count: Option<usize>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        e.exit();
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let log_dir = cli.log_dir.unwrap_or_else(default_log_dir);
    let _guard = init_logging(&log_dir, default_log_file())
        .map_err(|e| CliError::LoggingInit(e.to_string()))?;

    info!(version = env!("CARGO_PKG_VERSION"), "GeoBridge starting");

    let config = commands::common::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Get {
            high_accuracy,
            max_age_ms,
            timeout_ms,
            key,
        } => {
            commands::get::run(
                config,
                GetArgs {
                    high_accuracy,
                    max_age_ms,
                    timeout_ms,
                    key,
                },
            )
            .await
        }
        Commands::Watch {
            high_accuracy,
            interval_ms,
            count,
        } => {
            commands::watch::run(
                config,
                WatchArgs {
                    high_accuracy,
                    interval_ms,
                    count,
                },
            )
            .await
        }
    }
}
