// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Snapshot retention.
//!
//! Keep the number of snapshot archives in a backup root bounded. Only the
//! newest archives survive a cleanup pass. Archive names embed a fixed width
//! timestamp, so sorting names is enough to sort by age.

use crate::backup::namer::{is_archive_name, ARCHIVE_PREFIX, ARCHIVE_SUFFIX};

use glob::{glob, Pattern};
use std::{fs::remove_file, path::{Path, PathBuf}};
use tracing::{debug, info, instrument, warn};

/// Bound on how many snapshot archives to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    limit: usize,
}

impl RetentionPolicy {
    /// Construct new retention policy keeping at most `limit` archives.
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Select archives that exceed the retention bound.
    ///
    /// Expects archives sorted oldest first, and returns the oldest
    /// `len - limit` of them. Returns nothing if the bound already holds.
    pub fn expired<'a>(&self, archives: &'a [PathBuf]) -> &'a [PathBuf] {
        let excess = archives.len().saturating_sub(self.limit);
        &archives[..excess]
    }

    /// Delete expired archives from backup root.
    ///
    /// Deletion is best effort. A failure to delete one archive is recorded
    /// and logged, but the remaining expired archives are still deleted.
    ///
    /// # Errors
    ///
    /// - Return [`RetentionError`] if the backup root cannot be listed.
    #[instrument(skip(self, backup_root), level = "debug")]
    pub fn cleanup(&self, backup_root: impl AsRef<Path>) -> Result<CleanupReport> {
        let archives = list_archives(backup_root)?;
        let expired = self.expired(&archives);
        if expired.is_empty() {
            debug!(
                "{} archives within retention limit of {}",
                archives.len(),
                self.limit
            );
        }

        let mut report = prune(expired);
        report.kept = archives.len() - report.removed.len();

        Ok(report)
    }
}

// Delete every given archive, recording failures instead of stopping.
fn prune(expired: &[PathBuf]) -> CleanupReport {
    let mut report = CleanupReport::default();
    for archive in expired {
        match remove_file(archive) {
            Ok(()) => {
                info!("removed old snapshot {:?}", archive.display());
                report.removed.push(archive.clone());
            }
            Err(err) => {
                warn!("failed to remove old snapshot {:?}: {err}", archive.display());
                report.failed.push((archive.clone(), err));
            }
        }
    }

    report
}

/// Outcome of one retention cleanup pass.
#[derive(Debug, Default)]
pub struct CleanupReport {
    /// Archives deleted.
    pub removed: Vec<PathBuf>,

    /// Archives that could not be deleted.
    pub failed: Vec<(PathBuf, std::io::Error)>,

    /// Archives left in backup root.
    pub kept: usize,
}

/// List snapshot archives in backup root, oldest first.
///
/// A missing backup root simply holds no archives.
///
/// # Errors
///
/// - Return [`RetentionError::NonUnicodeRoot`] if backup root path cannot be
///   turned into a glob pattern.
/// - Return [`RetentionError::Pattern`] if glob pattern is invalid.
/// - Return [`RetentionError::Glob`] if an entry cannot be read.
pub fn list_archives(backup_root: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let root = backup_root.as_ref();
    let root_text = root.to_str().ok_or_else(|| RetentionError::NonUnicodeRoot {
        path: root.into(),
    })?;

    let pattern = format!(
        "{}/{ARCHIVE_PREFIX}*{ARCHIVE_SUFFIX}",
        Pattern::escape(root_text)
    );

    let mut archives = Vec::new();
    for entry in glob(&pattern)? {
        let path = entry?;
        let is_archive = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(is_archive_name);
        if is_archive && path.is_file() {
            archives.push(path);
        }
    }

    archives.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    Ok(archives)
}

/// Retention error types.
#[derive(Debug, thiserror::Error)]
pub enum RetentionError {
    /// Backup root path is not valid unicode.
    #[error("backup root {:?} is not valid unicode", path.display())]
    NonUnicodeRoot { path: PathBuf },

    /// Glob pattern for archive listing is invalid.
    #[error(transparent)]
    Pattern(#[from] glob::PatternError),

    /// Archive entry cannot be read during listing.
    #[error(transparent)]
    Glob(#[from] glob::GlobError),
}

/// Friendly result alias :3
pub type Result<T, E = RetentionError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;
    use std::fs::{create_dir, write};
    use tempfile::TempDir;

    fn archive_paths(count: usize) -> Vec<PathBuf> {
        (0..count)
            .map(|day| PathBuf::from(format!("/b/backup-202501{:02}-120000.tar.gz", day + 1)))
            .collect()
    }

    #[test_case(0, 5, 0; "empty")]
    #[test_case(3, 5, 0; "below limit")]
    #[test_case(5, 5, 0; "at limit")]
    #[test_case(7, 5, 2; "above limit")]
    #[test_case(4, 1, 3; "keep newest only")]
    #[test]
    fn expired_count(total: usize, limit: usize, expect: usize) {
        let archives = archive_paths(total);
        let policy = RetentionPolicy::new(limit);
        assert_eq!(policy.expired(&archives).len(), expect);
    }

    #[test]
    fn expired_are_the_oldest() {
        let archives = archive_paths(7);
        let policy = RetentionPolicy::new(5);
        assert_eq!(policy.expired(&archives), &archives[..2]);
    }

    #[test]
    fn list_archives_sorted_and_filtered() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        write(root.path().join("backup-20250301-000000.tar.gz"), "")?;
        write(root.path().join("backup-20250101-000000.tar.gz"), "")?;
        write(root.path().join("backup-20250101-000000_01.tar.gz"), "")?;
        write(root.path().join("backup-notes.tar.gz"), "")?;
        write(root.path().join("other.tar.gz"), "")?;
        create_dir(root.path().join("20250401-000000"))?;

        let result = list_archives(root.path())?
            .into_iter()
            .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
            .collect::<Vec<_>>();

        assert_eq!(
            result,
            vec![
                "backup-20250101-000000.tar.gz",
                "backup-20250101-000000_01.tar.gz",
                "backup-20250301-000000.tar.gz",
            ]
        );

        Ok(())
    }

    #[test]
    fn list_archives_missing_root() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        assert!(list_archives(root.path().join("nope"))?.is_empty());

        Ok(())
    }

    #[test]
    fn cleanup_removes_oldest_beyond_limit() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        for day in 1..=7 {
            write(
                root.path().join(format!("backup-202501{day:02}-120000.tar.gz")),
                "",
            )?;
        }

        let report = RetentionPolicy::new(5).cleanup(root.path())?;

        assert_eq!(report.removed.len(), 2);
        assert!(report.failed.is_empty());
        assert_eq!(report.kept, 5);

        let remaining = list_archives(root.path())?;
        assert_eq!(remaining.len(), 5);
        assert_eq!(
            remaining[0].file_name().unwrap(),
            "backup-20250103-120000.tar.gz"
        );

        Ok(())
    }

    #[test]
    fn prune_continues_past_failed_delete() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let gone = root.path().join("backup-20250101-120000.tar.gz");
        let old = root.path().join("backup-20250102-120000.tar.gz");
        write(&old, "")?;

        let report = prune(&[gone.clone(), old.clone()]);

        assert_eq!(report.removed, vec![old.clone()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, gone);
        assert!(!old.exists());

        Ok(())
    }
}
