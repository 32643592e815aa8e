// sqlbackup/src/config/mod.rs
use serde::Deserialize;
use sqlx::mysql::MySqlConnectOptions;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::backup::archive::ArchiveFormat;
use crate::errors::{BackupError, Result};
use crate::upload::schedule::UploadSchedule;
use crate::upload::RemoteProtocol;

// Structs for deserializing config.json. Raw sections mirror the file
// layout; validated settings are built from them below.
#[derive(Debug, Clone, Deserialize)]
struct RawBackupSection {
    backup_dir: PathBuf,
    #[serde(default = "default_archive_format")]
    archive_format: String,
    #[serde(default)]
    retention_days: u32,
}

fn default_archive_format() -> String {
    "none".to_string()
}

#[derive(Debug, Clone, Deserialize)]
struct RawMysqlSection {
    host: String,
    #[serde(default = "default_mysql_port")]
    port: u16,
    user: String,
    #[serde(default)]
    password: String,
    mysqldump_path: Option<PathBuf>,
    #[serde(default)]
    ignored_databases: Vec<String>,
}

fn default_mysql_port() -> u16 {
    3306
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportOptions {
    #[serde(default)]
    pub include_routines: bool,
    #[serde(default)]
    pub include_events: bool,
    #[serde(default = "default_true")]
    pub column_statistics: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        ExportOptions {
            include_routines: false,
            include_events: false,
            column_statistics: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
struct RawTimeoutsSection {
    #[serde(default = "default_timeout_secs")]
    dump_secs: u64,
    #[serde(default = "default_timeout_secs")]
    tool_secs: u64,
    #[serde(default = "default_timeout_secs")]
    upload_secs: u64,
}

fn default_timeout_secs() -> u64 {
    3600
}

impl Default for RawTimeoutsSection {
    fn default() -> Self {
        RawTimeoutsSection {
            dump_secs: default_timeout_secs(),
            tool_secs: default_timeout_secs(),
            upload_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
struct RawNotificationSection {
    #[serde(default)]
    channels: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramSettings {
    #[serde(default)]
    pub enabled: bool,
    pub token: String,
    pub chat_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlackSettings {
    #[serde(default)]
    pub enabled: bool,
    pub webhook_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Settings {
    pub bucket_name: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub endpoint_url: String,
    pub folder_prefix: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawRemoteSection {
    #[serde(default)]
    enabled: bool,
    #[serde(default = "default_protocol")]
    protocol: String,
    #[serde(default = "default_schedule")]
    upload_schedule: String,
    host: Option<String>,
    #[serde(default = "default_ssh_port")]
    port: u16,
    username: Option<String>,
    #[serde(default = "default_remote_directory")]
    remote_directory: String,
    s3: Option<S3Settings>,
}

fn default_protocol() -> String {
    "scp".to_string()
}

fn default_schedule() -> String {
    "daily".to_string()
}

fn default_ssh_port() -> u16 {
    22
}

fn default_remote_directory() -> String {
    "/".to_string()
}

#[derive(Debug, Clone, Deserialize)]
struct RawConfig {
    backup: Option<RawBackupSection>,
    mysql: Option<RawMysqlSection>,
    #[serde(default)]
    export: ExportOptions,
    #[serde(default)]
    timeouts: RawTimeoutsSection,
    #[serde(default)]
    notification: RawNotificationSection,
    telegram: Option<TelegramSettings>,
    slack: Option<SlackSettings>,
    remote: Option<RawRemoteSection>,
}

// Application's internal, validated configuration structs.
#[derive(Debug, Clone)]
pub struct BackupSettings {
    pub backup_dir: PathBuf,
    pub archive_format: ArchiveFormat,
    pub retention_days: u32,
}

#[derive(Debug, Clone)]
pub struct MysqlSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub mysqldump_path: Option<PathBuf>,
    pub ignored_databases: Vec<String>,
}

impl MysqlSettings {
    pub fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub dump: Duration,
    pub tool: Duration,
    pub upload: Duration,
}

#[derive(Debug, Clone)]
pub struct RemoteSettings {
    pub enabled: bool,
    pub protocol: RemoteProtocol,
    pub schedule: UploadSchedule,
    pub host: Option<String>,
    pub port: u16,
    pub username: Option<String>,
    pub remote_directory: String,
    pub s3: Option<S3Settings>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backup: BackupSettings,
    pub mysql: MysqlSettings,
    pub export: ExportOptions,
    pub timeouts: Timeouts,
    pub notification_channels: Vec<String>,
    pub telegram: Option<TelegramSettings>,
    pub slack: Option<SlackSettings>,
    pub remote: Option<RemoteSettings>,
}

impl AppConfig {
    /// Loads and validates the configuration file. Any unknown closed-set
    /// value (archive format, upload schedule, remote protocol) or missing
    /// required section is rejected here, before any backup work starts.
    pub fn load(config_path: &Path) -> Result<Self> {
        let content = fs::read_to_string(config_path).map_err(|e| {
            BackupError::ConfigInvalid(format!(
                "failed to read config file {}: {}",
                config_path.display(),
                e
            ))
        })?;
        let raw: RawConfig = serde_json::from_str(&content).map_err(|e| {
            BackupError::ConfigInvalid(format!(
                "failed to parse JSON from {}: {}",
                config_path.display(),
                e
            ))
        })?;
        AppConfig::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self> {
        let backup_raw = raw
            .backup
            .ok_or_else(|| BackupError::ConfigInvalid("missing [backup] section".to_string()))?;
        let mysql_raw = raw
            .mysql
            .ok_or_else(|| BackupError::ConfigInvalid("missing [mysql] section".to_string()))?;

        if backup_raw.backup_dir.as_os_str().is_empty() {
            return Err(BackupError::ConfigInvalid(
                "backup.backup_dir cannot be empty".to_string(),
            ));
        }

        let backup = BackupSettings {
            backup_dir: backup_raw.backup_dir,
            archive_format: ArchiveFormat::parse(&backup_raw.archive_format)?,
            retention_days: backup_raw.retention_days,
        };

        let mysql = MysqlSettings {
            host: mysql_raw.host,
            port: mysql_raw.port,
            user: mysql_raw.user,
            password: mysql_raw.password,
            mysqldump_path: mysql_raw.mysqldump_path,
            ignored_databases: mysql_raw
                .ignored_databases
                .iter()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
        };

        let timeouts = Timeouts {
            dump: Duration::from_secs(raw.timeouts.dump_secs),
            tool: Duration::from_secs(raw.timeouts.tool_secs),
            upload: Duration::from_secs(raw.timeouts.upload_secs),
        };

        let remote = match raw.remote {
            Some(remote_raw) => Some(validate_remote(remote_raw)?),
            None => None,
        };

        Ok(AppConfig {
            backup,
            mysql,
            export: raw.export,
            timeouts,
            notification_channels: raw
                .notification
                .channels
                .iter()
                .map(|c| c.trim().to_ascii_lowercase())
                .filter(|c| !c.is_empty())
                .collect(),
            telegram: raw.telegram,
            slack: raw.slack,
            remote,
        })
    }
}

fn validate_remote(raw: RawRemoteSection) -> Result<RemoteSettings> {
    let protocol = RemoteProtocol::parse(&raw.protocol)?;
    let schedule = UploadSchedule::parse(&raw.upload_schedule)?;

    if raw.enabled {
        match protocol {
            RemoteProtocol::Scp => {
                let host_ok = raw.host.as_deref().is_some_and(|h| !h.trim().is_empty());
                let user_ok = raw.username.as_deref().is_some_and(|u| !u.trim().is_empty());
                if !host_ok || !user_ok {
                    return Err(BackupError::ConfigInvalid(
                        "remote.host and remote.username must be set for scp uploads".to_string(),
                    ));
                }
            }
            RemoteProtocol::S3 => {
                let complete = raw.s3.as_ref().is_some_and(|s3| {
                    !s3.bucket_name.is_empty()
                        && !s3.region.is_empty()
                        && !s3.access_key_id.is_empty()
                        && !s3.secret_access_key.is_empty()
                        && !s3.endpoint_url.is_empty()
                });
                if !complete {
                    return Err(BackupError::ConfigInvalid(
                        "remote.s3 must be fully configured (bucket_name, region, access_key_id, \
                         secret_access_key, endpoint_url) for s3 uploads"
                            .to_string(),
                    ));
                }
            }
        }
    }

    Ok(RemoteSettings {
        enabled: raw.enabled,
        protocol,
        schedule,
        host: raw.host,
        port: raw.port,
        username: raw.username,
        remote_directory: raw.remote_directory,
        s3: raw.s3,
    })
}
