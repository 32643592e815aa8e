pub(crate) mod archive;
pub(crate) mod db_dump;
pub(crate) mod logic;
pub(crate) mod retention;

use anyhow::Result;
use chrono::Local;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::utils::report::RunSummary;
use crate::{notify, upload};

/// Public entry point for the backup process: runs the pipeline, prints
/// the summary table, notifies the configured channels and hands the
/// run's artifacts to the remote uploader when the schedule says so.
pub async fn run_backup_flow(config: &AppConfig, cancel: &CancellationToken) -> Result<RunSummary> {
    let summary = logic::run_backups(config, cancel).await?;

    println!("{}", summary.render_table());

    // Notification delivery and remote upload are fire-and-forget: their
    // failures are logged but never change the run's outcome.
    notify::dispatch(config, &summary.notification_message(), summary.is_success()).await;

    if let Some(remote) = &config.remote {
        if upload::upload_due(remote, Local::now().date_naive()) {
            upload::upload_artifacts(remote, summary.artifacts(), config.timeouts.upload).await;
        } else {
            tracing::debug!("remote upload not due today");
        }
    }

    Ok(summary)
}
