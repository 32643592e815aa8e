// sqlbackup/src/backup/logic.rs
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::backup::archive::{ArchiveResult, FormatArchiver};
use crate::backup::db_dump::{self, BackupTarget, DumpResult, MysqlDumper};
use crate::backup::retention;
use crate::config::AppConfig;
use crate::errors::Result;
use crate::utils::report::{RowStatus, RunSummary, SummaryRow};
use crate::utils::setting::check_mysql_connection;

/// Dump step seam. The production implementation shells out to
/// mysqldump; tests inject scripted results.
#[async_trait]
pub trait DumpRunner: Send + Sync {
    async fn dump(&self, target: &BackupTarget) -> DumpResult;
}

/// Archive step seam.
#[async_trait]
pub trait Archiver: Send + Sync {
    async fn archive(&self, dump: DumpResult) -> ArchiveResult;
}

/// Runs the whole backup pipeline: preflight, enumeration, per-database
/// dump + archive, then retention cleanup. Only connection and
/// configuration problems abort; everything per-database lands in the
/// returned summary.
pub async fn run_backups(config: &AppConfig, cancel: &CancellationToken) -> Result<RunSummary> {
    check_mysql_connection(&config.mysql).await?;
    let names = db_dump::list_databases(&config.mysql).await?;
    let targets = db_dump::build_targets(&names, &config.mysql.ignored_databases);
    tracing::info!(databases = targets.len(), "starting backup run");

    let dumper = MysqlDumper::new(config, cancel.clone())?;
    let archiver = FormatArchiver::new(
        config.backup.archive_format,
        config.timeouts.tool,
        cancel.clone(),
    );

    let summary = process_targets(&targets, &dumper, &archiver, cancel).await;

    // Retention runs regardless of this run's outcomes and never affects
    // the exit code.
    retention::apply_retention(&config.backup.backup_dir, config.backup.retention_days);

    Ok(summary)
}

/// Core per-database loop. Targets are processed sequentially in
/// enumeration order; a failing dump or archive records the database in
/// the error list and the loop moves on. Cancellation is honored between
/// databases and yields a partial, non-successful summary.
pub async fn process_targets(
    targets: &[BackupTarget],
    dumper: &dyn DumpRunner,
    archiver: &dyn Archiver,
    cancel: &CancellationToken,
) -> RunSummary {
    let mut summary = RunSummary::new();

    for target in targets {
        if cancel.is_cancelled() {
            tracing::warn!("backup run interrupted; reporting partial results");
            summary.mark_interrupted();
            break;
        }

        if target.ignored {
            tracing::debug!(database = %target.name, "skipping ignored database");
            summary.push_row(SummaryRow {
                database: target.name.clone(),
                status: RowStatus::Skipped,
                elapsed: None,
                raw_size_bytes: 0,
                archived_size_bytes: 0,
            });
            continue;
        }

        let dump = dumper.dump(target).await;
        tracing::debug!(database = %target.name, started_at = %dump.started_at,
            elapsed_ms = dump.elapsed.as_millis() as u64, "dump step finished");
        if !dump.succeeded() {
            tracing::error!(database = %target.name,
                detail = dump.error.as_deref().unwrap_or("unknown"),
                "dump failed; continuing with the next database");
            summary.push_error(&target.name);
            summary.push_row(SummaryRow {
                database: target.name.clone(),
                status: RowStatus::DumpFailed,
                elapsed: Some(dump.elapsed),
                raw_size_bytes: 0,
                archived_size_bytes: 0,
            });
            continue;
        }

        let archived = archiver.archive(dump).await;
        if let Some(detail) = &archived.error {
            tracing::error!(database = %target.name, detail = %detail,
                "archive failed; raw dump kept on disk");
            // Partial success stays visible: the dump worked, only the
            // archive step failed, and the raw file is still on disk.
            summary.push_error(&target.name);
            summary.push_row(SummaryRow {
                database: target.name.clone(),
                status: RowStatus::ArchiveFailed,
                elapsed: Some(archived.source.elapsed),
                raw_size_bytes: archived.source.raw_size_bytes,
                archived_size_bytes: 0,
            });
            continue;
        }

        summary.push_row(SummaryRow {
            database: target.name.clone(),
            status: RowStatus::Success,
            elapsed: Some(archived.source.elapsed),
            raw_size_bytes: archived.source.raw_size_bytes,
            archived_size_bytes: archived.archived_size_bytes,
        });
        if let Some(path) = archived.archived_path {
            summary.push_artifact(path);
        }
    }

    summary
}
