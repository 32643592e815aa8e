// sqlbackup/src/backup/db_dump.rs
use async_trait::async_trait;
use chrono::{DateTime, Local};
use sqlx::{Connection, MySqlConnection, Row};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use which::which;

use crate::backup::logic::DumpRunner;
use crate::config::{AppConfig, ExportOptions};
use crate::errors::{BackupError, Result};

/// One enumerated database, with the ignore-list verdict already applied.
#[derive(Debug, Clone)]
pub struct BackupTarget {
    pub name: String,
    pub ignored: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpStatus {
    Success,
    Failed,
}

/// Outcome of one mysqldump invocation. Failure is carried as data so a
/// failing database never aborts the run.
#[derive(Debug, Clone)]
pub struct DumpResult {
    pub target: BackupTarget,
    pub status: DumpStatus,
    pub started_at: DateTime<Local>,
    pub elapsed: Duration,
    pub raw_size_bytes: u64,
    pub dump_path: Option<PathBuf>,
    pub error: Option<String>,
}

impl DumpResult {
    fn failed(target: BackupTarget, started_at: DateTime<Local>, elapsed: Duration, detail: String) -> Self {
        DumpResult {
            target,
            status: DumpStatus::Failed,
            started_at,
            elapsed,
            raw_size_bytes: 0,
            dump_path: None,
            error: Some(detail),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == DumpStatus::Success
    }
}

/// Shell-glob match: `*` is any run of characters, `?` a single character.
/// Case-sensitive; a pattern without wildcards matches literally.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut mark = 0usize;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some(pi);
            mark = ti;
            pi += 1;
        } else if let Some(star_pos) = star {
            // Backtrack: let the last `*` swallow one more character.
            pi = star_pos + 1;
            mark += 1;
            ti = mark;
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

pub fn is_ignored(name: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|pattern| glob_match(pattern, name))
}

/// Fetches all schema names visible to the configured credentials.
/// Unreachable server or rejected credentials are fatal for the run.
pub async fn list_databases(mysql: &crate::config::MysqlSettings) -> Result<Vec<String>> {
    let mut conn = MySqlConnection::connect_with(&mysql.connect_options())
        .await
        .map_err(|e| BackupError::Connection(format!("{}:{}: {}", mysql.host, mysql.port, e)))?;

    let rows = sqlx::query("SHOW DATABASES")
        .fetch_all(&mut conn)
        .await
        .map_err(|e| BackupError::Connection(format!("failed to list databases: {}", e)))?;

    let names = rows
        .iter()
        .map(|row| row.try_get::<String, _>(0))
        .collect::<std::result::Result<Vec<String>, sqlx::Error>>()
        .map_err(|e| BackupError::Connection(format!("unexpected SHOW DATABASES row: {}", e)))?;

    tracing::debug!(count = names.len(), "enumerated databases");
    Ok(names)
}

/// Applies the ignore list to the enumerated names, preserving listing order.
pub fn build_targets(names: &[String], ignore_patterns: &[String]) -> Vec<BackupTarget> {
    names
        .iter()
        .map(|name| BackupTarget {
            name: name.clone(),
            ignored: is_ignored(name, ignore_patterns),
        })
        .collect()
}

/// Dump Runner backed by the external mysqldump utility.
///
/// Credentials are handed over through a transient defaults file so they
/// never appear on the command line. The file lives as long as the dumper.
pub struct MysqlDumper {
    mysqldump: PathBuf,
    defaults_file: NamedTempFile,
    backup_dir: PathBuf,
    timestamp: String,
    export: ExportOptions,
    timeout: Duration,
    cancel: CancellationToken,
}

impl MysqlDumper {
    pub fn new(config: &AppConfig, cancel: CancellationToken) -> Result<Self> {
        let mysqldump = match &config.mysql.mysqldump_path {
            Some(path) => path.clone(),
            None => which("mysqldump").map_err(|_| {
                BackupError::ConfigInvalid(
                    "mysqldump executable not found in PATH; install the MySQL client tools or \
                     set mysql.mysqldump_path"
                        .to_string(),
                )
            })?,
        };

        fs::create_dir_all(&config.backup.backup_dir)?;

        let mut defaults_file = NamedTempFile::new()?;
        writeln!(defaults_file, "[client]")?;
        writeln!(defaults_file, "user={}", config.mysql.user)?;
        writeln!(defaults_file, "password={}", config.mysql.password)?;
        writeln!(defaults_file, "host={}", config.mysql.host)?;
        writeln!(defaults_file, "port={}", config.mysql.port)?;
        defaults_file.flush()?;

        Ok(MysqlDumper {
            mysqldump,
            defaults_file,
            backup_dir: config.backup.backup_dir.clone(),
            timestamp: Local::now().format("%Y-%m-%d").to_string(),
            export: config.export.clone(),
            timeout: config.timeouts.dump,
            cancel,
        })
    }

    fn dump_command(&self, database: &str, outfile: std::fs::File) -> Command {
        let mut cmd = Command::new(&self.mysqldump);
        cmd.arg(format!(
            "--defaults-extra-file={}",
            self.defaults_file.path().display()
        ))
        .args([
            "--default-character-set=utf8mb4",
            "--single-transaction",
            "--force",
            "--opt",
        ]);
        if self.export.include_routines {
            cmd.arg("--routines");
        }
        if self.export.include_events {
            cmd.arg("--events");
        }
        if !self.export.column_statistics {
            cmd.arg("--column-statistics=0");
        }
        cmd.arg("--databases").arg(database);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::from(outfile))
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl DumpRunner for MysqlDumper {
    async fn dump(&self, target: &BackupTarget) -> DumpResult {
        let started_at = Local::now();
        let start = Instant::now();
        let dump_path = self
            .backup_dir
            .join(format!("{}-{}.sql", target.name, self.timestamp));

        let outfile = match std::fs::File::create(&dump_path) {
            Ok(file) => file,
            Err(e) => {
                return DumpResult::failed(
                    target.clone(),
                    started_at,
                    start.elapsed(),
                    format!("failed to create {}: {}", dump_path.display(), e),
                );
            }
        };

        let mut cmd = self.dump_command(&target.name, outfile);
        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                let _ = fs::remove_file(&dump_path);
                return DumpResult::failed(
                    target.clone(),
                    started_at,
                    start.elapsed(),
                    format!("failed to spawn mysqldump: {}", e),
                );
            }
        };

        // kill_on_drop terminates the child if the cancel branch wins or
        // the timeout expires.
        let waited = tokio::select! {
            _ = self.cancel.cancelled() => None,
            res = tokio::time::timeout(self.timeout, child.wait_with_output()) => Some(res),
        };

        let failure = match waited {
            None => Some("dump cancelled by operator signal".to_string()),
            Some(Err(_)) => Some(format!(
                "mysqldump timed out after {}s",
                self.timeout.as_secs()
            )),
            Some(Ok(Err(e))) => Some(format!("failed to wait for mysqldump: {}", e)),
            Some(Ok(Ok(output))) if !output.status.success() => Some(format!(
                "mysqldump exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )),
            Some(Ok(Ok(_))) => None,
        };

        match failure {
            None => {
                let raw_size_bytes = fs::metadata(&dump_path).map(|m| m.len()).unwrap_or(0);
                DumpResult {
                    target: target.clone(),
                    status: DumpStatus::Success,
                    started_at,
                    elapsed: start.elapsed(),
                    raw_size_bytes,
                    dump_path: Some(dump_path),
                    error: None,
                }
            }
            Some(detail) => {
                let err = BackupError::DumpFailed {
                    database: target.name.clone(),
                    detail,
                };
                tracing::warn!(error = %err, "dump failed");
                let _ = fs::remove_file(&dump_path);
                DumpResult::failed(target.clone(), started_at, start.elapsed(), err.to_string())
            }
        }
    }
}
