//! MySQL Backup Tool
//!
//! Dumps every non-ignored database, archives the dumps, applies the
//! retention window, notifies the configured channels and optionally
//! uploads the archives to a remote destination.

// sqlbackup/src/main.rs
mod backup;
mod config;
mod errors;
mod notify;
mod upload;
mod utils;

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use config::AppConfig;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Single command, no subcommands; the only argument is an optional
    // config file path.
    let args: Vec<String> = env::args().collect();
    let config_path = args
        .get(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.json"));

    let config = match AppConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e);
            return ExitCode::FAILURE;
        }
    };

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; terminating in-flight work, results will be partial");
            signal_token.cancel();
        }
    });

    match backup::run_backup_flow(&config, &cancel).await {
        Ok(summary) if summary.is_success() => {
            println!("✅ Backup run completed successfully.");
            ExitCode::SUCCESS
        }
        Ok(summary) => {
            if !summary.errors().is_empty() {
                eprintln!("❌ Backup run finished with errors: {}", summary.errors().join(", "));
            }
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}
