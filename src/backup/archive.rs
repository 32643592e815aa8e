// sqlbackup/src/backup/archive.rs
use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use which::which;

use crate::backup::db_dump::DumpResult;
use crate::backup::logic::Archiver;
use crate::errors::{BackupError, Result};

/// Closed set of supported archive formats, parsed from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    None,
    Gz,
    Xz,
    TarXz,
    Zip,
    Rar,
}

impl ArchiveFormat {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(ArchiveFormat::None),
            "gz" => Ok(ArchiveFormat::Gz),
            "xz" => Ok(ArchiveFormat::Xz),
            "tar.xz" => Ok(ArchiveFormat::TarXz),
            "zip" => Ok(ArchiveFormat::Zip),
            "rar" => Ok(ArchiveFormat::Rar),
            other => Err(BackupError::ConfigInvalid(format!(
                "unknown archive_format '{}' (expected none, gz, xz, tar.xz, zip or rar)",
                other
            ))),
        }
    }
}

/// Terminal record for one database: the dump it came from, plus the
/// archive outcome. An error here means "dump OK, archive failed".
#[derive(Debug, Clone)]
pub struct ArchiveResult {
    pub source: DumpResult,
    pub format: ArchiveFormat,
    pub archived_path: Option<PathBuf>,
    pub archived_size_bytes: u64,
    pub error: Option<String>,
}

fn append_ext(path: &Path, ext: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

/// Archiver over the configured format. gz and zip are produced
/// in-process; xz, tar.xz and rar shell out to the respective tool with a
/// bounded wait.
pub struct FormatArchiver {
    format: ArchiveFormat,
    tool_timeout: Duration,
    cancel: CancellationToken,
}

impl FormatArchiver {
    pub fn new(format: ArchiveFormat, tool_timeout: Duration, cancel: CancellationToken) -> Self {
        FormatArchiver {
            format,
            tool_timeout,
            cancel,
        }
    }

    /// Artifact path for a given dump file, following the original
    /// `<db>-<date>` naming: gz/xz append to the `.sql` name, the
    /// container formats replace it.
    pub fn artifact_path(&self, dump_path: &Path) -> PathBuf {
        match self.format {
            ArchiveFormat::None => dump_path.to_path_buf(),
            ArchiveFormat::Gz => append_ext(dump_path, "gz"),
            ArchiveFormat::Xz => append_ext(dump_path, "xz"),
            ArchiveFormat::TarXz => dump_path.with_extension("tar.xz"),
            ArchiveFormat::Zip => dump_path.with_extension("zip"),
            ArchiveFormat::Rar => dump_path.with_extension("rar"),
        }
    }

    fn compress_gz(&self, dump_path: &Path, out_path: &Path) -> Result<()> {
        let mut input = File::open(dump_path)?;
        let output = File::create(out_path)?;
        let mut encoder = GzEncoder::new(output, Compression::default());
        io::copy(&mut input, &mut encoder)?;
        encoder.finish()?;
        Ok(())
    }

    fn compress_zip(&self, dump_path: &Path, out_path: &Path) -> Result<()> {
        let entry_name = dump_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("dump.sql")
            .to_string();
        let output = File::create(out_path)?;
        let mut writer = zip::ZipWriter::new(output);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        writer
            .start_file(entry_name, options)
            .map_err(|e| BackupError::ArchiveFailed(format!("zip: {}", e)))?;
        let mut input = File::open(dump_path)?;
        io::copy(&mut input, &mut writer)?;
        writer
            .finish()
            .map_err(|e| BackupError::ArchiveFailed(format!("zip: {}", e)))?;
        Ok(())
    }

    async fn run_tool(&self, program: &str, args: Vec<OsString>) -> Result<()> {
        let tool = which(program).map_err(|_| {
            BackupError::ToolUnavailable(format!("{} executable not found in PATH", program))
        })?;

        let mut cmd = Command::new(tool);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let child = cmd.spawn()?;

        let waited = tokio::select! {
            _ = self.cancel.cancelled() => None,
            res = tokio::time::timeout(self.tool_timeout, child.wait_with_output()) => Some(res),
        };

        let output = match waited {
            None => {
                return Err(BackupError::ArchiveFailed(format!(
                    "{} cancelled by operator signal",
                    program
                )))
            }
            Some(Err(_)) => {
                return Err(BackupError::ToolUnavailable(format!(
                    "{} timed out after {}s",
                    program,
                    self.tool_timeout.as_secs()
                )))
            }
            Some(Ok(result)) => result?,
        };

        if !output.status.success() {
            return Err(BackupError::ArchiveFailed(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    async fn produce(&self, dump_path: &Path, out_path: &Path) -> Result<()> {
        match self.format {
            ArchiveFormat::None => Ok(()),
            ArchiveFormat::Gz => self.compress_gz(dump_path, out_path),
            ArchiveFormat::Zip => self.compress_zip(dump_path, out_path),
            ArchiveFormat::Xz => {
                // -k keeps the input; the orchestrator owns its deletion.
                self.run_tool("xz", vec!["-zkf".into(), dump_path.into()])
                    .await
            }
            ArchiveFormat::TarXz => {
                let dir = dump_path.parent().unwrap_or(Path::new("."));
                let name = dump_path.file_name().unwrap_or(dump_path.as_os_str());
                self.run_tool(
                    "tar",
                    vec![
                        "-cJf".into(),
                        out_path.into(),
                        "-C".into(),
                        dir.into(),
                        name.into(),
                    ],
                )
                .await
            }
            ArchiveFormat::Rar => {
                self.run_tool("rar", vec!["a".into(), out_path.into(), dump_path.into()])
                    .await
            }
        }
    }
}

#[async_trait]
impl Archiver for FormatArchiver {
    async fn archive(&self, dump: DumpResult) -> ArchiveResult {
        let Some(dump_path) = dump.dump_path.clone() else {
            return ArchiveResult {
                source: dump,
                format: self.format,
                archived_path: None,
                archived_size_bytes: 0,
                error: Some("no dump file to archive".to_string()),
            };
        };

        if self.format == ArchiveFormat::None {
            let size = dump.raw_size_bytes;
            return ArchiveResult {
                source: dump,
                format: self.format,
                archived_path: Some(dump_path),
                archived_size_bytes: size,
                error: None,
            };
        }

        let out_path = self.artifact_path(&dump_path);
        match self.produce(&dump_path, &out_path).await {
            Ok(()) => {
                let archived_size_bytes = fs::metadata(&out_path).map(|m| m.len()).unwrap_or(0);
                // One copy of the data is enough once the archive exists.
                if let Err(e) = fs::remove_file(&dump_path) {
                    tracing::warn!(path = %dump_path.display(), error = %e,
                        "could not remove pre-archive dump file");
                }
                ArchiveResult {
                    source: dump,
                    format: self.format,
                    archived_path: Some(out_path),
                    archived_size_bytes,
                    error: None,
                }
            }
            Err(err) => {
                // The raw dump is preserved so the data survives the
                // failed compression step.
                tracing::warn!(database = %dump.target.name, error = %err, "archiving failed");
                let _ = fs::remove_file(&out_path);
                ArchiveResult {
                    source: dump,
                    format: self.format,
                    archived_path: None,
                    archived_size_bytes: 0,
                    error: Some(err.to_string()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::db_dump::{BackupTarget, DumpStatus};
    use chrono::Local;
    use std::io::Write as _;

    fn dump_result_for(path: &Path, size: u64) -> DumpResult {
        DumpResult {
            target: BackupTarget {
                name: "shop".to_string(),
                ignored: false,
            },
            status: DumpStatus::Success,
            started_at: Local::now(),
            elapsed: Duration::from_millis(10),
            raw_size_bytes: size,
            dump_path: Some(path.to_path_buf()),
            error: None,
        }
    }

    fn archiver(format: ArchiveFormat) -> FormatArchiver {
        FormatArchiver::new(format, Duration::from_secs(60), CancellationToken::new())
    }

    #[test]
    fn parse_accepts_the_closed_set_only() {
        assert_eq!(ArchiveFormat::parse("gz").unwrap(), ArchiveFormat::Gz);
        assert_eq!(ArchiveFormat::parse("TAR.XZ").unwrap(), ArchiveFormat::TarXz);
        assert_eq!(ArchiveFormat::parse(" none ").unwrap(), ArchiveFormat::None);
        assert!(ArchiveFormat::parse("7z").is_err());
        assert!(ArchiveFormat::parse("").is_err());
    }

    #[test]
    fn artifact_naming_follows_dump_name() {
        let dump = Path::new("/backups/shop-2026-01-01.sql");
        assert_eq!(
            archiver(ArchiveFormat::Gz).artifact_path(dump),
            Path::new("/backups/shop-2026-01-01.sql.gz")
        );
        assert_eq!(
            archiver(ArchiveFormat::Xz).artifact_path(dump),
            Path::new("/backups/shop-2026-01-01.sql.xz")
        );
        assert_eq!(
            archiver(ArchiveFormat::TarXz).artifact_path(dump),
            Path::new("/backups/shop-2026-01-01.tar.xz")
        );
        assert_eq!(
            archiver(ArchiveFormat::Zip).artifact_path(dump),
            Path::new("/backups/shop-2026-01-01.zip")
        );
        assert_eq!(
            archiver(ArchiveFormat::None).artifact_path(dump),
            dump
        );
    }

    #[tokio::test]
    async fn gz_archive_replaces_the_dump_file() {
        let dir = tempfile::tempdir().unwrap();
        let dump_path = dir.path().join("shop-2026-01-01.sql");
        let mut file = File::create(&dump_path).unwrap();
        writeln!(file, "CREATE TABLE t (id INT);").unwrap();
        drop(file);
        let size = fs::metadata(&dump_path).unwrap().len();

        let result = archiver(ArchiveFormat::Gz)
            .archive(dump_result_for(&dump_path, size))
            .await;

        assert!(result.error.is_none());
        assert_eq!(result.format, ArchiveFormat::Gz);
        let archived = result.archived_path.unwrap();
        assert_eq!(archived.extension().unwrap(), "gz");
        assert!(archived.exists());
        assert!(result.archived_size_bytes > 0);
        assert!(!dump_path.exists());
    }

    #[tokio::test]
    async fn zip_archive_contains_the_dump() {
        let dir = tempfile::tempdir().unwrap();
        let dump_path = dir.path().join("shop-2026-01-01.sql");
        fs::write(&dump_path, b"INSERT INTO t VALUES (1);").unwrap();

        let result = archiver(ArchiveFormat::Zip)
            .archive(dump_result_for(&dump_path, 25))
            .await;

        assert!(result.error.is_none());
        let archived = result.archived_path.unwrap();
        assert_eq!(archived, dir.path().join("shop-2026-01-01.zip"));
        assert!(archived.exists());
        assert!(!dump_path.exists());
    }

    #[tokio::test]
    async fn none_format_keeps_the_dump_as_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let dump_path = dir.path().join("shop-2026-01-01.sql");
        fs::write(&dump_path, b"-- empty").unwrap();

        let result = archiver(ArchiveFormat::None)
            .archive(dump_result_for(&dump_path, 8))
            .await;

        assert!(result.error.is_none());
        assert_eq!(result.archived_path.unwrap(), dump_path);
        assert_eq!(result.archived_size_bytes, 8);
        assert!(dump_path.exists());
    }

    #[tokio::test]
    async fn failed_compression_preserves_the_dump_file() {
        let dir = tempfile::tempdir().unwrap();
        let dump_path = dir.path().join("shop-2026-01-01.sql");
        fs::write(&dump_path, b"CREATE TABLE t (id INT);").unwrap();
        // A directory squatting on the artifact path makes the encoder's
        // output creation fail while the dump itself is fine.
        fs::create_dir(dir.path().join("shop-2026-01-01.sql.gz")).unwrap();

        let result = archiver(ArchiveFormat::Gz)
            .archive(dump_result_for(&dump_path, 24))
            .await;

        assert!(result.error.is_some());
        assert!(result.archived_path.is_none());
        assert_eq!(result.archived_size_bytes, 0);
        assert!(dump_path.exists());
    }

    #[tokio::test]
    async fn missing_dump_file_reports_archive_error() {
        let dir = tempfile::tempdir().unwrap();
        let dump_path = dir.path().join("gone-2026-01-01.sql");

        let result = archiver(ArchiveFormat::Gz)
            .archive(dump_result_for(&dump_path, 100))
            .await;

        assert!(result.error.is_some());
        assert!(result.archived_path.is_none());
        assert_eq!(result.archived_size_bytes, 0);
    }
}
