// sqlbackup/src/utils/setting.rs
use sqlx::{Connection, MySqlConnection};

use crate::config::MysqlSettings;
use crate::errors::{BackupError, Result};

/// Preflight connectivity check. Runs `SELECT 1` with the configured
/// credentials so a bad host or rejected login fails the run before any
/// dump is attempted.
pub async fn check_mysql_connection(mysql: &MysqlSettings) -> Result<()> {
    let mut conn = MySqlConnection::connect_with(&mysql.connect_options())
        .await
        .map_err(|e| BackupError::Connection(format!("{}:{}: {}", mysql.host, mysql.port, e)))?;

    sqlx::query("SELECT 1")
        .execute(&mut conn)
        .await
        .map_err(|e| BackupError::Connection(e.to_string()))?;

    if let Err(e) = conn.close().await {
        tracing::debug!(error = %e, "closing preflight connection failed");
    }
    tracing::info!(host = %mysql.host, port = mysql.port, "MySQL connection successful");
    Ok(())
}
