// sqlbackup/src/upload/mod.rs
pub mod schedule;
pub(crate) mod s3_upload;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use which::which;

use crate::config::RemoteSettings;
use crate::errors::BackupError;

/// Transport used to push archives to the remote destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteProtocol {
    Scp,
    S3,
}

impl RemoteProtocol {
    pub fn parse(raw: &str) -> crate::errors::Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "scp" => Ok(RemoteProtocol::Scp),
            "s3" => Ok(RemoteProtocol::S3),
            other => Err(BackupError::ConfigInvalid(format!(
                "unknown remote.protocol '{}' (expected scp or s3)",
                other
            ))),
        }
    }
}

/// Gate for the remote upload: enabled and due per the schedule.
pub fn upload_due(remote: &RemoteSettings, today: NaiveDate) -> bool {
    remote.enabled && schedule::should_upload(&remote.schedule, today)
}

/// Pushes this run's archives to the remote destination, one file at a
/// time. Per-file failures are logged and counted; they never surface as
/// run errors.
pub async fn upload_artifacts(remote: &RemoteSettings, artifacts: &[PathBuf], timeout: Duration) {
    if artifacts.is_empty() {
        tracing::info!("no archives to upload");
        return;
    }

    let mut failures = 0usize;
    match remote.protocol {
        RemoteProtocol::Scp => {
            for file in artifacts {
                if let Err(err) = scp_upload(remote, file, timeout).await {
                    tracing::warn!(file = %file.display(), error = %err, "scp upload failed");
                    failures += 1;
                }
            }
        }
        RemoteProtocol::S3 => {
            let Some(s3_settings) = &remote.s3 else {
                tracing::warn!("s3 upload requested but no s3 settings present");
                return;
            };
            let client = s3_upload::build_client(s3_settings).await;
            for file in artifacts {
                if let Err(err) = s3_upload::upload_file(&client, s3_settings, file, timeout).await
                {
                    tracing::warn!(file = %file.display(), error = %err, "s3 upload failed");
                    failures += 1;
                }
            }
        }
    }

    if failures > 0 {
        tracing::warn!(failures, total = artifacts.len(), "remote upload finished with failures");
    } else {
        tracing::info!(total = artifacts.len(), "remote upload finished");
    }
}

async fn scp_upload(remote: &RemoteSettings, file: &Path, timeout: Duration) -> Result<()> {
    let host = remote.host.as_deref().context("remote.host is not set")?;
    let username = remote
        .username
        .as_deref()
        .context("remote.username is not set")?;
    let scp = which("scp").context("scp executable not found in PATH")?;

    let destination = format!("{}@{}:{}", username, host, remote.remote_directory);
    tracing::info!(file = %file.display(), destination = %destination, "uploading via scp");

    let mut cmd = Command::new(scp);
    cmd.arg("-B")
        .arg("-P")
        .arg(remote.port.to_string())
        .arg(file)
        .arg(&destination)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd.spawn().context("failed to spawn scp")?;
    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| anyhow::anyhow!("scp timed out after {}s", timeout.as_secs()))?
        .context("failed to wait for scp")?;

    if !output.status.success() {
        anyhow::bail!(
            "scp exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}
