// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Dotfile repository operations.
//!
//! [`Dotfiles`] ties a [`Config`] to the operations exposed on the command
//! line: deploy, status, remove, and backup. Failures that make a whole
//! operation pointless, e.g., a missing source directory, are returned as
//! errors before any item is touched. Failures of single items end up in the
//! returned report instead.

use crate::{
    backup::{
        retention::RetentionError, snapshot::SnapshotError, CleanupReport, RetentionPolicy,
        SnapshotArchiver, SnapshotOutcome, Timestamp,
    },
    config::Config,
    item::{scan, ItemError, ManagedItem, SourceFilter},
    reconcile::{self, DeployReport, LinkReconciler, Plan, RemoveReport},
    status::{status, StatusReport},
};

use indicatif::ProgressBar;
use std::{io::ErrorKind, path::PathBuf};
use tracing::{info, instrument};

/// Dotfile repository bound to a target directory.
#[derive(Debug, Clone)]
pub struct Dotfiles {
    config: Config,
    filter: SourceFilter,
}

impl Dotfiles {
    /// Open dotfile repository described by configuration.
    ///
    /// The source directory is made absolute, so every symlink written points
    /// at an absolute path.
    ///
    /// # Errors
    ///
    /// - Return [`DotfilesError::Item`] if source directory does not exist or
    ///   exclusion patterns are malformed.
    pub fn open(mut config: Config) -> Result<Self> {
        config.source_dir = config.source_dir.canonicalize().map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                ItemError::SourceMissing {
                    path: config.source_dir.clone(),
                }
            } else {
                ItemError::ReadSource {
                    source: err,
                    path: config.source_dir.clone(),
                }
            }
        })?;

        let filter = SourceFilter::new(&config.source_dir, &config.exclude)?;

        Ok(Self { config, filter })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Scan current set of managed items.
    ///
    /// # Errors
    ///
    /// - Return [`DotfilesError::Item`] if source directory cannot be read.
    pub fn items(&self) -> Result<Vec<ManagedItem>> {
        Ok(scan(
            &self.config.source_dir,
            &self.config.target_dir,
            &self.filter,
        )?)
    }

    /// Determine deployment actions without touching anything.
    ///
    /// # Errors
    ///
    /// - Return [`DotfilesError::Item`] if source directory cannot be read.
    pub fn plan(&self, timestamp: Timestamp) -> Result<Plan> {
        Ok(LinkReconciler::new(timestamp).plan(&self.items()?))
    }

    /// Link every managed item into target directory.
    ///
    /// Creates target directory if missing.
    ///
    /// # Errors
    ///
    /// - Return [`DotfilesError::Item`] if source directory cannot be read.
    /// - Return [`DotfilesError::CreateTarget`] if target directory cannot be
    ///   created.
    #[instrument(skip(self, timestamp), level = "debug")]
    pub fn deploy(&self, timestamp: Timestamp) -> Result<DeployReport> {
        let items = self.items()?;
        mkdirp::mkdirp(&self.config.target_dir).map_err(|err| DotfilesError::CreateTarget {
            source: err,
            path: self.config.target_dir.clone(),
        })?;

        info!(
            "deploy {} items from {:?} to {:?}",
            items.len(),
            self.config.source_dir.display(),
            self.config.target_dir.display()
        );

        Ok(LinkReconciler::new(timestamp).deploy(&items))
    }

    /// Report state of every managed item.
    ///
    /// # Errors
    ///
    /// - Return [`DotfilesError::Item`] if source directory cannot be read.
    pub fn status(&self) -> Result<StatusReport> {
        Ok(status(&self.items()?))
    }

    /// Remove symlinks of every managed item, and optionally their file
    /// backups.
    ///
    /// # Errors
    ///
    /// - Return [`DotfilesError::Item`] if source directory cannot be read.
    #[instrument(skip(self), level = "debug")]
    pub fn remove(&self, remove_backups: bool) -> Result<RemoveReport> {
        Ok(reconcile::remove(&self.items()?, remove_backups))
    }

    /// Snapshot managed targets holding real content, then prune old
    /// snapshots beyond the retention limit.
    ///
    /// # Errors
    ///
    /// - Return [`DotfilesError::Item`] if source directory cannot be read.
    /// - Return [`DotfilesError::Snapshot`] if archive cannot be written.
    /// - Return [`DotfilesError::Retention`] if old archives cannot be listed.
    #[instrument(skip(self, timestamp, bar), level = "debug")]
    pub fn backup(&self, timestamp: Timestamp, bar: ProgressBar) -> Result<BackupReport> {
        let items = self.items()?;
        let settings = &self.config.backup;

        let archiver = SnapshotArchiver::new(&settings.root, bar);
        let snapshot = archiver.create_snapshot(&items, &timestamp)?;

        let policy = RetentionPolicy::new(settings.retention_limit);
        let cleanup = policy.cleanup(&settings.root)?;

        Ok(BackupReport { snapshot, cleanup })
    }
}

/// Outcome of a backup run.
#[derive(Debug)]
pub struct BackupReport {
    pub snapshot: SnapshotOutcome,
    pub cleanup: CleanupReport,
}

impl BackupReport {
    /// Snapshot succeeded, and retention cleanup deleted everything it had to.
    pub fn is_success(&self) -> bool {
        self.cleanup.failed.is_empty()
    }
}

/// Dotfile repository error types.
#[derive(Debug, thiserror::Error)]
pub enum DotfilesError {
    /// Managed items cannot be determined.
    #[error(transparent)]
    Item(#[from] ItemError),

    /// Target directory cannot be created.
    #[error("failed to create target directory {:?}", path.display())]
    CreateTarget {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Snapshot archive cannot be written.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// Retention cleanup cannot run.
    #[error(transparent)]
    Retention(#[from] RetentionError),
}

/// Friendly result alias :3
pub type Result<T, E = DotfilesError> = std::result::Result<T, E>;
