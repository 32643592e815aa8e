// sqlbackup/src/backup/retention.rs
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use walkdir::WalkDir;

use crate::errors::{BackupError, Result};

/// Deletes archived files older than the retention window. Best-effort:
/// a file that cannot be removed is logged and skipped, it never fails
/// the run. `retention_days == 0` disables cleanup.
pub fn apply_retention(backup_dir: &Path, retention_days: u32) {
    if retention_days == 0 {
        return;
    }
    let window = Duration::from_secs(u64::from(retention_days) * 24 * 60 * 60);
    let cutoff = match SystemTime::now().checked_sub(window) {
        Some(cutoff) => cutoff,
        None => return,
    };

    let mut removed = 0usize;
    for path in expired_files(backup_dir, cutoff) {
        match remove_expired(&path) {
            Ok(()) => {
                tracing::info!(path = %path.display(), "removed expired backup");
                removed += 1;
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "retention cleanup skipped file");
            }
        }
    }
    tracing::debug!(removed, retention_days, "retention cleanup finished");
}

/// Files directly under `backup_dir` whose modification time predates
/// `cutoff`. Subdirectories are left alone.
fn expired_files(backup_dir: &Path, cutoff: SystemTime) -> Vec<PathBuf> {
    let mut expired = Vec::new();
    for entry in WalkDir::new(backup_dir).min_depth(1).max_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(error = %err, "retention scan error");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let modified = match entry.path().metadata().and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(err) => {
                tracing::warn!(path = %entry.path().display(), error = %err,
                    "could not read modification time");
                continue;
            }
        };
        if modified < cutoff {
            expired.push(entry.into_path());
        }
    }
    expired
}

fn remove_expired(path: &Path) -> Result<()> {
    fs::remove_file(path)
        .map_err(|e| BackupError::RetentionCleanup(format!("{}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_outside_the_window_are_selected() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("shop-2020-01-01.sql.gz");
        let recent = dir.path().join("shop-2026-08-30.sql.gz");
        fs::write(&old, b"old").unwrap();
        fs::write(&recent, b"new").unwrap();

        // Files were just written, so a cutoff in the future selects them
        // all and a cutoff in the past selects none.
        let future_cutoff = SystemTime::now() + Duration::from_secs(3600);
        let mut selected = expired_files(dir.path(), future_cutoff);
        selected.sort();
        assert_eq!(selected, {
            let mut all = vec![old.clone(), recent.clone()];
            all.sort();
            all
        });

        let past_cutoff = SystemTime::now() - Duration::from_secs(3600);
        assert!(expired_files(dir.path(), past_cutoff).is_empty());
    }

    #[test]
    fn subdirectories_are_not_candidates() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("a.sql.gz"), b"x").unwrap();

        let future_cutoff = SystemTime::now() + Duration::from_secs(3600);
        let selected = expired_files(dir.path(), future_cutoff);
        assert_eq!(selected, vec![dir.path().join("a.sql.gz")]);
    }

    #[test]
    fn one_failed_deletion_does_not_stop_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.sql.gz");
        let missing = dir.path().join("already-gone.sql.gz");
        let last = dir.path().join("c.sql.gz");
        fs::write(&first, b"x").unwrap();
        fs::write(&last, b"x").unwrap();

        let mut failures = 0;
        for path in [&first, &missing, &last] {
            if remove_expired(path).is_err() {
                failures += 1;
            }
        }
        assert_eq!(failures, 1);
        assert!(!first.exists());
        assert!(!last.exists());
    }

    #[test]
    fn zero_retention_days_disables_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.sql.gz");
        fs::write(&file, b"x").unwrap();
        apply_retention(dir.path(), 0);
        assert!(file.exists());
    }
}
