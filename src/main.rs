//! Main entry point for the fire-data-extractor CLI

use clap::Parser;
use fire_data_extractor::cli::{Cli, Commands};
use fire_data_extractor::shutdown::{self, ShutdownCoordinator};
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Exit code when every work item succeeded.
const EXIT_CLEAN: i32 = 0;
/// Exit code when the run finished but the ledger is non-empty.
const EXIT_PARTIAL: i32 = 1;
/// Exit code for fatal errors before or outside the fetch loop.
const EXIT_FATAL: i32 = 2;

/// Initialize tracing subscriber with optional JSON formatting
fn init_tracing() {
    // Check if JSON output is requested via environment variable
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("fire_data_extractor=info"));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    // Install global shutdown coordinator and Ctrl+C handler
    let shutdown = ShutdownCoordinator::shared();
    shutdown::set_global_shutdown(shutdown.clone());
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Ctrl+C received - finishing in-flight downloads...");
                shutdown.request_shutdown();
            }
        }
    });

    let result = match cli.command {
        Commands::Images(ref args) => args.execute(&cli).await.map_err(|e| anyhow::anyhow!(e)),
        Commands::Timeseries(ref args) => args.execute(&cli).await.map_err(|e| anyhow::anyhow!(e)),
    };

    match result {
        Ok(report) if report.is_clean() => std::process::exit(EXIT_CLEAN),
        Ok(report) => {
            error!(
                failed = report.failed,
                skipped_days = report.skipped_days,
                "Run finished with failures"
            );
            std::process::exit(EXIT_PARTIAL);
        }
        Err(e) => {
            error!("Command failed: {}", e);
            std::process::exit(EXIT_FATAL);
        }
    }
}
