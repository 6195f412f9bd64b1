// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Link reconciliation.
//!
//! Drive every managed item toward one state: a symlink at its target path
//! whose literal target is its source path. What needs doing depends on what
//! occupies the target path right now:
//!
//! | Current state  | Action                                          |
//! |----------------|-------------------------------------------------|
//! | absent         | create link                                     |
//! | correct link   | nothing                                         |
//! | wrong link     | swap link (nothing to back up)                  |
//! | blocked        | rename content to `<target>.bak_<ts>`, then link |
//!
//! Each item is reconciled on its own. One item failing never stops the rest
//! of the batch; the failure is recorded in the report instead. Running
//! deployment twice in a row performs no writes the second time.

use crate::{
    backup::namer::{next_free_file_backup, NamerError, Timestamp, FILE_BACKUP_MARKER},
    item::ManagedItem,
    link::{classify, replace_symlink, LinkError, LinkState},
};

use glob::{glob, Pattern};
use std::{
    ffi::OsString,
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{remove_dir_all, remove_file, rename, symlink_metadata},
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// Step needed to bring one item into its correct state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Already correct.
    Keep,

    /// Create missing link.
    Link,

    /// Replace link pointing elsewhere.
    Relink { stale: PathBuf },

    /// Move blocking content aside, then link.
    BackupAndLink { backup: PathBuf },
}

impl Action {
    /// Action writes to the file system.
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Self::Keep)
    }
}

impl Display for Action {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Keep => fmt.write_str("keep"),
            Self::Link => fmt.write_str("link"),
            Self::Relink { stale } => write!(fmt, "relink (was -> {})", stale.display()),
            Self::BackupAndLink { backup } => {
                write!(fmt, "back up to {} and link", backup.display())
            }
        }
    }
}

/// Item that could not be reconciled.
#[derive(Debug)]
pub struct Skipped {
    pub name: OsString,
    pub error: ReconcileError,
}

/// Planned actions for a batch of items.
#[derive(Debug, Default)]
pub struct Plan {
    pub actions: Vec<(OsString, Action)>,
    pub skipped: Vec<Skipped>,
}

/// Outcome of deployment.
#[derive(Debug, Default)]
pub struct DeployReport {
    /// Items whose link was created or swapped during this run.
    pub linked: usize,

    /// Items already correct.
    pub unchanged: usize,

    /// Subset of `linked` that replaced a wrong link.
    pub relinked: usize,

    /// File backups created for blocking content.
    pub backed_up: Vec<PathBuf>,

    /// Items left unresolved.
    pub skipped: Vec<Skipped>,
}

impl DeployReport {
    /// Every item ended in its correct state.
    pub fn is_success(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Outcome of link removal.
#[derive(Debug, Default)]
pub struct RemoveReport {
    /// Symlinks deleted.
    pub links_removed: usize,

    /// File backups deleted.
    pub backups_removed: usize,

    /// File backups still on disk because they were not asked to be removed.
    pub stray_backups: usize,

    /// Targets holding real content, left untouched.
    pub untouched: usize,

    /// Items that could not be processed.
    pub failures: Vec<Skipped>,
}

impl RemoveReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Reconcile managed items against their targets.
///
/// All file backups made by one reconciler share its timestamp.
#[derive(Debug, Clone)]
pub struct LinkReconciler {
    timestamp: Timestamp,
}

impl LinkReconciler {
    /// Construct new link reconciler.
    pub fn new(timestamp: Timestamp) -> Self {
        Self { timestamp }
    }

    pub fn timestamp(&self) -> &Timestamp {
        &self.timestamp
    }

    /// Determine action needed for item without touching anything.
    ///
    /// # Errors
    ///
    /// - Return [`ReconcileError::Classify`] if target cannot be inspected.
    /// - Return [`ReconcileError::Name`] if no backup name is left for
    ///   blocking content.
    pub fn plan_item(&self, item: &ManagedItem) -> Result<Action> {
        let state = classify(&item.target, &item.source).map_err(ReconcileError::Classify)?;
        self.action_for(item, state)
    }

    /// Determine actions for every item without touching anything.
    #[instrument(skip(self, items), level = "debug")]
    pub fn plan(&self, items: &[ManagedItem]) -> Plan {
        let mut plan = Plan::default();
        for item in items {
            match self.plan_item(item) {
                Ok(action) => plan.actions.push((item.name.clone(), action)),
                Err(error) => plan.skipped.push(Skipped {
                    name: item.name.clone(),
                    error,
                }),
            }
        }

        plan
    }

    /// Deploy every item as a correct symlink.
    ///
    /// Failures are collected in [`DeployReport::skipped`]. The batch always
    /// runs to completion.
    #[instrument(skip(self, items), level = "debug")]
    pub fn deploy(&self, items: &[ManagedItem]) -> DeployReport {
        let mut report = DeployReport::default();
        for item in items {
            if let Err(error) = self.deploy_item(item, &mut report) {
                warn!("skip {:?}: {error}", item.display_name());
                report.skipped.push(Skipped {
                    name: item.name.clone(),
                    error,
                });
            }
        }

        info!(
            "deploy finished: {} linked, {} unchanged, {} backed up, {} skipped",
            report.linked,
            report.unchanged,
            report.backed_up.len(),
            report.skipped.len()
        );

        report
    }

    fn deploy_item(&self, item: &ManagedItem, report: &mut DeployReport) -> Result<()> {
        match self.plan_item(item)? {
            Action::Keep => {
                debug!("{:?} already linked", item.display_name());
                report.unchanged += 1;
            }
            Action::Link => {
                replace_symlink(&item.source, &item.target).map_err(ReconcileError::Link)?;
                info!("linked {:?}", item.target.display());
                report.linked += 1;
            }
            Action::Relink { stale } => {
                replace_symlink(&item.source, &item.target).map_err(ReconcileError::Link)?;
                info!(
                    "relinked {:?} (was -> {:?})",
                    item.target.display(),
                    stale.display()
                );
                report.linked += 1;
                report.relinked += 1;
            }
            Action::BackupAndLink { backup } => {
                rename(&item.target, &backup).map_err(|err| ReconcileError::Backup {
                    source: err,
                    path: item.target.clone(),
                })?;
                info!(
                    "backed up {:?} to {:?}",
                    item.target.display(),
                    backup.display()
                );
                report.backed_up.push(backup);

                // INVARIANT: Target path is free now, content is safe in backup.
                replace_symlink(&item.source, &item.target).map_err(ReconcileError::Link)?;
                info!("linked {:?}", item.target.display());
                report.linked += 1;
            }
        }

        Ok(())
    }

    fn action_for(&self, item: &ManagedItem, state: LinkState) -> Result<Action> {
        let action = match state {
            LinkState::Absent => Action::Link,
            LinkState::CorrectLink => Action::Keep,
            LinkState::WrongLink { actual } => Action::Relink { stale: actual },
            LinkState::Blocked(_) => Action::BackupAndLink {
                backup: next_free_file_backup(&item.target, &self.timestamp)?,
            },
        };

        Ok(action)
    }
}

/// Remove symlinks at every item's target.
///
/// Only symlinks are deleted. Targets holding real content are left alone.
/// With `remove_backups`, file backups of each item are deleted too;
/// otherwise they are counted as strays. A backup that cannot be deleted is
/// recorded as a failure, and the remaining backups are still processed.
#[instrument(skip(items), level = "debug")]
pub fn remove(items: &[ManagedItem], remove_backups: bool) -> RemoveReport {
    let mut report = RemoveReport::default();
    for item in items {
        if let Err(error) = remove_item(item, remove_backups, &mut report) {
            warn!("skip {:?}: {error}", item.display_name());
            report.failures.push(Skipped {
                name: item.name.clone(),
                error,
            });
        }
    }

    info!(
        "remove finished: {} links removed, {} backups removed, {} failures",
        report.links_removed,
        report.backups_removed,
        report.failures.len()
    );

    if report.stray_backups > 0 {
        warn!(
            "{} file backups remain, remove them with the backups option",
            report.stray_backups
        );
    }

    report
}

fn remove_item(item: &ManagedItem, remove_backups: bool, report: &mut RemoveReport) -> Result<()> {
    let state = classify(&item.target, &item.source).map_err(ReconcileError::Classify)?;
    if state.is_link() {
        remove_file(&item.target).map_err(|err| ReconcileError::Unlink {
            source: err,
            path: item.target.clone(),
        })?;
        info!("removed link {:?}", item.target.display());
        report.links_removed += 1;
    } else if let LinkState::Blocked(kind) = state {
        debug!("leave {kind} at {:?} alone", item.target.display());
        report.untouched += 1;
    }

    let backups = list_file_backups(&item.target)?;
    if !remove_backups {
        report.stray_backups += backups.len();
        return Ok(());
    }

    for backup in backups {
        match remove_backup(&backup) {
            Ok(()) => {
                info!("removed backup {:?}", backup.display());
                report.backups_removed += 1;
            }
            Err(error) => {
                warn!("skip backup {:?}: {error}", backup.display());
                report.failures.push(Skipped {
                    name: item.name.clone(),
                    error,
                });
            }
        }
    }

    Ok(())
}

// Blocking directories are backed up whole, so a backup can be a tree.
fn remove_backup(backup: &Path) -> Result<()> {
    let unlink_err = |err: std::io::Error| ReconcileError::Unlink {
        source: err,
        path: backup.into(),
    };

    let metadata = symlink_metadata(backup).map_err(unlink_err)?;
    if metadata.is_dir() {
        remove_dir_all(backup).map_err(unlink_err)
    } else {
        remove_file(backup).map_err(unlink_err)
    }
}

/// List every file backup of target, oldest first.
///
/// # Errors
///
/// - Return [`ReconcileError::NonUnicode`] if target path cannot be turned
///   into a glob pattern.
/// - Return [`ReconcileError::Pattern`] or [`ReconcileError::Glob`] if
///   listing fails.
pub fn list_file_backups(target: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let target = target.as_ref();
    let text = target.to_str().ok_or_else(|| ReconcileError::NonUnicode {
        path: target.into(),
    })?;

    let pattern = format!("{}{FILE_BACKUP_MARKER}*", Pattern::escape(text));
    let mut backups = Vec::new();
    for entry in glob(&pattern)? {
        backups.push(entry?);
    }
    backups.sort();

    Ok(backups)
}

/// Link reconciliation error types.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// Target cannot be classified.
    #[error(transparent)]
    Classify(LinkError),

    /// Blocking content cannot be moved aside.
    #[error("failed to back up {:?}", path.display())]
    Backup {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Correct link cannot be put in place.
    #[error(transparent)]
    Link(LinkError),

    /// No backup name is left for blocking content.
    #[error(transparent)]
    Name(#[from] NamerError),

    /// Link or backup cannot be deleted.
    #[error("failed to remove {:?}", path.display())]
    Unlink {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Target path is not valid unicode, so its backups cannot be listed.
    #[error("path {:?} is not valid unicode", path.display())]
    NonUnicode { path: PathBuf },

    /// Glob pattern for backup listing is invalid.
    #[error(transparent)]
    Pattern(#[from] glob::PatternError),

    /// Backup entry cannot be read during listing.
    #[error(transparent)]
    Glob(#[from] glob::GlobError),
}

impl ReconcileError {
    /// Kind of the underlying failure, e.g., [`ErrorKind::NotFound`] or
    /// [`ErrorKind::PermissionDenied`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Classify(err) | Self::Link(err) => err.kind(),
            Self::Backup { source, .. } | Self::Unlink { source, .. } => source.kind(),
            Self::Glob(err) => err.error().kind(),
            Self::Name(_) => ErrorKind::AlreadyExists,
            Self::NonUnicode { .. } | Self::Pattern(_) => ErrorKind::InvalidInput,
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = ReconcileError> = std::result::Result<T, E>;
