// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Backup naming.
//!
//! All backups made during one invocation share a single [`Timestamp`]. The
//! timestamp is fixed width and zero padded, so plain lexicographic order of
//! backup names is also chronological order.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use std::{
    ffi::OsString,
    fmt::{Display, Formatter, Result as FmtResult},
    fs::symlink_metadata,
    path::{Path, PathBuf},
};

/// Layout of every timestamp, e.g., `20250131-235959`.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Separator between a target path and its backup timestamp.
pub const FILE_BACKUP_MARKER: &str = ".bak_";

/// Prefix of snapshot archive names.
pub const ARCHIVE_PREFIX: &str = "backup-";

/// Suffix of snapshot archive names.
pub const ARCHIVE_SUFFIX: &str = ".tar.gz";

/// Highest collision counter. Counters are two digits wide, so every name
/// up to this bound still sorts in creation order.
pub const MAX_COLLISIONS: u32 = 99;

/// Sortable backup identifier shared by one invocation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(String);

impl Timestamp {
    /// Stamp current local time.
    pub fn now() -> Self {
        Self::from_datetime(&Local::now())
    }

    /// Stamp given point in time.
    pub fn from_datetime<Tz>(datetime: &DateTime<Tz>) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        Self(datetime.format(TIMESTAMP_FORMAT).to_string())
    }

    /// Parse timestamp text.
    ///
    /// Returns `None` if text does not follow [`TIMESTAMP_FORMAT`] exactly.
    pub fn parse(text: impl AsRef<str>) -> Option<Self> {
        let text = text.as_ref();
        NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT).ok()?;

        // INVARIANT: Fixed width, or sort order breaks.
        (text.len() == 15).then(|| Self(text.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for Timestamp {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.as_str())
    }
}

/// Path of single file backup: target path with `.bak_<ts>` appended.
pub fn file_backup_path(target: impl AsRef<Path>, timestamp: &Timestamp) -> PathBuf {
    let mut path = OsString::from(target.as_ref().as_os_str());
    path.push(FILE_BACKUP_MARKER);
    path.push(timestamp.as_str());
    PathBuf::from(path)
}

/// Name of snapshot archive: `backup-<ts>.tar.gz`.
pub fn archive_name(timestamp: &Timestamp) -> String {
    format!("{ARCHIVE_PREFIX}{timestamp}{ARCHIVE_SUFFIX}")
}

/// First unused single file backup path for target.
///
/// Falls back to `<target>.bak_<ts>_NN` when a backup with the same
/// timestamp already exists.
///
/// # Errors
///
/// - Return [`NamerError::Exhausted`] if every counter up to
///   [`MAX_COLLISIONS`] is taken.
pub fn next_free_file_backup(
    target: impl AsRef<Path>,
    timestamp: &Timestamp,
) -> Result<PathBuf> {
    let base = file_backup_path(target, timestamp);
    first_unoccupied(base.clone(), |counter| {
        let mut path = base.clone().into_os_string();
        path.push(format!("_{counter:02}"));
        PathBuf::from(path)
    })
}

/// First unused snapshot archive path under backup root.
///
/// Falls back to `backup-<ts>_NN.tar.gz`, which still sorts after
/// `backup-<ts>.tar.gz` because `_` orders after `.`.
///
/// # Errors
///
/// - Return [`NamerError::Exhausted`] if every counter up to
///   [`MAX_COLLISIONS`] is taken.
pub fn next_free_archive(
    backup_root: impl AsRef<Path>,
    timestamp: &Timestamp,
) -> Result<PathBuf> {
    let root = backup_root.as_ref();
    first_unoccupied(root.join(archive_name(timestamp)), |counter| {
        root.join(format!(
            "{ARCHIVE_PREFIX}{timestamp}_{counter:02}{ARCHIVE_SUFFIX}"
        ))
    })
}

/// Check if file name is a snapshot archive name.
pub fn is_archive_name(name: &str) -> bool {
    let Some(stamp) = name
        .strip_prefix(ARCHIVE_PREFIX)
        .and_then(|rest| rest.strip_suffix(ARCHIVE_SUFFIX))
    else {
        return false;
    };

    let (Some(time), Some(counter)) = (stamp.get(..15), stamp.get(15..)) else {
        return false;
    };

    let counter_ok = match counter.strip_prefix('_') {
        Some(digits) => !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()),
        None => counter.is_empty(),
    };

    counter_ok && Timestamp::parse(time).is_some()
}

fn first_unoccupied(base: PathBuf, candidate: impl Fn(u32) -> PathBuf) -> Result<PathBuf> {
    if !is_occupied(&base) {
        return Ok(base);
    }

    (1..=MAX_COLLISIONS)
        .map(candidate)
        .find(|path| !is_occupied(path))
        .ok_or(NamerError::Exhausted { path: base })
}

// Dangling symlinks still occupy a name.
fn is_occupied(path: &Path) -> bool {
    symlink_metadata(path).is_ok()
}

/// Backup naming error types.
#[derive(Debug, thiserror::Error)]
pub enum NamerError {
    /// Every collision counter for a backup name is in use.
    #[error("no free backup name left for {:?}", path.display())]
    Exhausted { path: PathBuf },
}

/// Friendly result alias :3
pub type Result<T, E = NamerError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use simple_test_case::test_case;
    use std::fs::write;
    use tempfile::TempDir;

    fn stamp(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> Timestamp {
        let naive = NaiveDate::from_ymd_opt(y, mo, d)
            .and_then(|date| date.and_hms_opt(h, mi, s))
            .unwrap();
        Timestamp::from_datetime(&naive.and_utc())
    }

    #[test]
    fn timestamp_is_fixed_width_and_sortable() {
        let early = stamp(2025, 1, 2, 3, 4, 5);
        let late = stamp(2025, 11, 20, 13, 14, 15);

        assert_eq!(early.as_str(), "20250102-030405");
        assert_eq!(late.as_str(), "20251120-131415");
        assert!(early < late);
        assert_eq!(early.as_str().len(), late.as_str().len());
    }

    #[test_case("20250102-030405", true; "valid")]
    #[test_case("2025012-030405", false; "short date")]
    #[test_case("20251302-030405", false; "bad month")]
    #[test_case("20250102_030405", false; "wrong separator")]
    #[test]
    fn parse_timestamp(text: &str, expect: bool) {
        assert_eq!(Timestamp::parse(text).is_some(), expect);
    }

    #[test]
    fn backup_names() {
        let ts = stamp(2025, 1, 2, 3, 4, 5);

        assert_eq!(
            file_backup_path("/home/blah/.bashrc", &ts),
            PathBuf::from("/home/blah/.bashrc.bak_20250102-030405")
        );
        assert_eq!(archive_name(&ts), "backup-20250102-030405.tar.gz");
    }

    #[test_case("backup-20250102-030405.tar.gz", true; "plain archive")]
    #[test_case("backup-20250102-030405_01.tar.gz", true; "collision archive")]
    #[test_case("backup-20250102-030405", false; "staging name")]
    #[test_case("backup-latest.tar.gz", false; "no timestamp")]
    #[test_case("backup-20250102-030405junk.tar.gz", false; "trailing junk")]
    #[test_case("notes.tar.gz", false; "foreign archive")]
    #[test]
    fn detect_archive_names(name: &str, expect: bool) {
        assert_eq!(is_archive_name(name), expect);
    }

    #[test]
    fn next_free_names_avoid_collisions() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let ts = stamp(2025, 1, 2, 3, 4, 5);
        let target = root.path().join(".bashrc");

        let first = next_free_file_backup(&target, &ts)?;
        assert_eq!(first, file_backup_path(&target, &ts));
        write(&first, "X")?;

        let second = next_free_file_backup(&target, &ts)?;
        assert_eq!(
            second,
            root.path().join(".bashrc.bak_20250102-030405_01")
        );

        let archive = next_free_archive(root.path(), &ts)?;
        write(&archive, "")?;
        let again = next_free_archive(root.path(), &ts)?;
        assert_eq!(
            again,
            root.path().join("backup-20250102-030405_01.tar.gz")
        );
        assert!(archive.file_name() < again.file_name());

        Ok(())
    }

    #[test]
    fn collision_counters_stop_before_breaking_order() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let ts = stamp(2025, 1, 2, 3, 4, 5);
        let target = root.path().join(".bashrc");

        write(file_backup_path(&target, &ts), "X")?;
        for _ in 1..MAX_COLLISIONS {
            write(next_free_file_backup(&target, &ts)?, "X")?;
        }

        let last = next_free_file_backup(&target, &ts)?;
        assert_eq!(last, root.path().join(".bashrc.bak_20250102-030405_99"));
        write(&last, "X")?;

        let result = next_free_file_backup(&target, &ts);
        assert!(matches!(result, Err(NamerError::Exhausted { .. })));

        Ok(())
    }
}
