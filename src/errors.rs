use thiserror::Error;

/// Failure taxonomy for a backup run.
///
/// Only `ConfigInvalid` and `Connection` are allowed to abort the process;
/// everything per-database is carried as data in the run summary.
#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("MySQL connection failed: {0}")]
    Connection(String),

    #[error("Dump of database {database} failed: {detail}")]
    DumpFailed { database: String, detail: String },

    #[error("Archiving failed: {0}")]
    ArchiveFailed(String),

    #[error("Required external tool unavailable: {0}")]
    ToolUnavailable(String),

    #[error("Retention cleanup failed: {0}")]
    RetentionCleanup(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BackupError>;
