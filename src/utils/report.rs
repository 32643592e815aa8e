// sqlbackup/src/utils/report.rs
use std::path::PathBuf;
use std::time::Duration;

/// Terminal state of one summary row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStatus {
    Success,
    DumpFailed,
    ArchiveFailed,
    Skipped,
}

impl RowStatus {
    pub fn label(&self) -> &'static str {
        match self {
            RowStatus::Success => "Success",
            RowStatus::DumpFailed => "Dump failed",
            RowStatus::ArchiveFailed => "Archive failed",
            RowStatus::Skipped => "Skipped",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SummaryRow {
    pub database: String,
    pub status: RowStatus,
    pub elapsed: Option<Duration>,
    pub raw_size_bytes: u64,
    pub archived_size_bytes: u64,
}

/// Ordered per-database outcome of one backup run, plus the aggregate
/// error list and the archive artifacts the run produced. Rows keep the
/// enumerator's listing order.
#[derive(Debug, Default)]
pub struct RunSummary {
    rows: Vec<SummaryRow>,
    errors: Vec<String>,
    artifacts: Vec<PathBuf>,
    interrupted: bool,
}

impl RunSummary {
    pub fn new() -> Self {
        RunSummary::default()
    }

    pub fn push_row(&mut self, row: SummaryRow) {
        self.rows.push(row);
    }

    pub fn push_error(&mut self, database: &str) {
        self.errors.push(database.to_string());
    }

    pub fn push_artifact(&mut self, path: PathBuf) {
        self.artifacts.push(path);
    }

    pub fn mark_interrupted(&mut self) {
        self.interrupted = true;
    }

    pub fn rows(&self) -> &[SummaryRow] {
        &self.rows
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn artifacts(&self) -> &[PathBuf] {
        &self.artifacts
    }

    pub fn interrupted(&self) -> bool {
        self.interrupted
    }

    /// A run counts as successful only when no database failed and the
    /// run was not cut short by a cancellation signal.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && !self.interrupted
    }

    /// Renders the user-facing summary table.
    pub fn render_table(&self) -> String {
        let separator = format!(
            "|{}|{}|{}|{}|{}|",
            "-".repeat(27),
            "-".repeat(17),
            "-".repeat(12),
            "-".repeat(14),
            "-".repeat(16)
        );
        let mut out = String::new();
        out.push_str(&format!(
            "| {:25} | {:15} | {:10} | {:12} | {:14} |\n",
            "Database", "Status", "Time (s)", "Dump Size", "Archive Size"
        ));
        out.push_str(&separator);
        out.push('\n');
        for row in &self.rows {
            let elapsed = row
                .elapsed
                .map(|d| format!("{:.1}", d.as_secs_f64()))
                .unwrap_or_else(|| "-".to_string());
            let (dump_str, archive_str) = match row.status {
                RowStatus::Success => (
                    format_size(row.raw_size_bytes),
                    format_size(row.archived_size_bytes),
                ),
                RowStatus::DumpFailed => ("N/A".to_string(), "N/A".to_string()),
                RowStatus::ArchiveFailed => (format_size(row.raw_size_bytes), "N/A".to_string()),
                RowStatus::Skipped => ("-".to_string(), "-".to_string()),
            };
            out.push_str(&format!(
                "| {:25} | {:15} | {:10} | {:12} | {:14} |\n",
                row.database,
                row.status.label(),
                elapsed,
                dump_str,
                archive_str
            ));
        }
        out.push_str(&separator);
        out
    }

    /// Builds the message handed to the notification dispatcher.
    pub fn notification_message(&self) -> String {
        let mut lines = Vec::with_capacity(self.rows.len() + 1);
        if self.interrupted {
            lines.push("Backup run was interrupted; results are partial.".to_string());
        } else if self.errors.is_empty() {
            lines.push(format!(
                "Backup run completed successfully ({} databases).",
                self.rows
                    .iter()
                    .filter(|r| r.status != RowStatus::Skipped)
                    .count()
            ));
        } else {
            lines.push(format!(
                "Backup run finished with {} failure(s): {}",
                self.errors.len(),
                self.errors.join(", ")
            ));
        }
        for row in &self.rows {
            match row.elapsed {
                Some(elapsed) => lines.push(format!(
                    "{}: {} in {:.1}s",
                    row.database,
                    row.status.label(),
                    elapsed.as_secs_f64()
                )),
                None => lines.push(format!("{}: {}", row.database, row.status.label())),
            }
        }
        lines.join("\n")
    }
}

/// Human-readable byte count, binary units.
pub fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;
    if size < KB {
        format!("{} B", size)
    } else if size < MB {
        format!("{:.1} KB", size as f64 / KB as f64)
    } else if size < GB {
        format!("{:.1} MB", size as f64 / MB as f64)
    } else {
        format!("{:.1} GB", size as f64 / GB as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_size_picks_unit() {
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(1_048_576), "1.0 MB");
        assert_eq!(format_size(1_073_741_824), "1.0 GB");
    }

    #[test]
    fn archive_failure_row_keeps_raw_size_visible() {
        let mut summary = RunSummary::new();
        summary.push_row(SummaryRow {
            database: "shop".to_string(),
            status: RowStatus::ArchiveFailed,
            elapsed: Some(Duration::from_millis(1200)),
            raw_size_bytes: 500,
            archived_size_bytes: 0,
        });
        let table = summary.render_table();
        assert!(table.contains("500 B"));
        assert!(table.contains("N/A"));
        assert!(table.contains("Archive failed"));
    }

    #[test]
    fn success_requires_no_errors_and_no_interrupt() {
        let mut summary = RunSummary::new();
        assert!(summary.is_success());
        summary.push_error("shop");
        assert!(!summary.is_success());

        let mut interrupted = RunSummary::new();
        interrupted.mark_interrupted();
        assert!(!interrupted.is_success());
    }

    #[test]
    fn notification_message_names_failed_databases() {
        let mut summary = RunSummary::new();
        summary.push_row(SummaryRow {
            database: "shop".to_string(),
            status: RowStatus::DumpFailed,
            elapsed: Some(Duration::from_secs(3)),
            raw_size_bytes: 0,
            archived_size_bytes: 0,
        });
        summary.push_error("shop");
        let message = summary.notification_message();
        assert!(message.contains("1 failure(s): shop"));
        assert!(message.contains("shop: Dump failed in 3.0s"));
    }
}
