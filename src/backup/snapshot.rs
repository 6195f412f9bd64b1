// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Snapshot archives.
//!
//! A __snapshot__ captures every managed target that currently holds real
//! content, i.e., a regular file instead of a symlink, in one compressed
//! archive under the backup root.
//!
//! # Snapshot Steps
//!
//! 1. Create staging directory `<backup_root>/<ts>`.
//! 2. Copy each regular file target into the staging directory under its
//!    bare name.
//! 3. Compress the staging directory into `<backup_root>/backup-<ts>.tar.gz`.
//! 4. Delete the staging directory.
//!
//! A failure during steps 1 or 2 removes the staging directory. A failure
//! during step 3 keeps the staging directory around for inspection, but never
//! leaves a partial archive behind: the archive is written to a temporary file
//! and only renamed into place once complete.

use crate::{
    backup::namer::{next_free_archive, NamerError, Timestamp},
    item::ManagedItem,
};

use flate2::{write::GzEncoder, Compression};
use indicatif::ProgressBar;
use std::{
    fs::{copy, create_dir, remove_dir_all, symlink_metadata},
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument, warn};

/// Result of a snapshot attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// Archive written.
    Created(BackupRecord),

    /// No managed target held real content, so no archive was written.
    NothingToBackUp,
}

/// Snapshot archive written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRecord {
    /// Path to archive.
    pub archive: PathBuf,

    /// Number of files inside archive.
    pub files: usize,

    /// Size of archive in bytes.
    pub bytes: u64,
}

/// Write snapshot archives into a backup root.
#[derive(Debug, Clone)]
pub struct SnapshotArchiver {
    backup_root: PathBuf,
    bar: ProgressBar,
}

impl SnapshotArchiver {
    /// Construct new snapshot archiver.
    ///
    /// The progress bar is ticked once per staged file. Pass
    /// [`ProgressBar::hidden`] for silence.
    pub fn new(backup_root: impl Into<PathBuf>, bar: ProgressBar) -> Self {
        Self {
            backup_root: backup_root.into(),
            bar,
        }
    }

    pub fn backup_root(&self) -> &Path {
        self.backup_root.as_path()
    }

    /// Snapshot every managed target that holds real content.
    ///
    /// # Errors
    ///
    /// - Return [`SnapshotError::CreateRoot`] if backup root cannot be
    ///   created.
    /// - Return [`SnapshotError::Staging`] if staging directory cannot be
    ///   created.
    /// - Return [`SnapshotError::Copy`] if a target cannot be copied.
    /// - Return [`SnapshotError::Name`] if no archive name is left.
    /// - Return [`SnapshotError::Compress`] or [`SnapshotError::Persist`] if
    ///   the archive cannot be written.
    #[instrument(skip(self, items), level = "debug")]
    pub fn create_snapshot(
        &self,
        items: &[ManagedItem],
        timestamp: &Timestamp,
    ) -> Result<SnapshotOutcome> {
        mkdirp::mkdirp(&self.backup_root).map_err(|err| SnapshotError::CreateRoot {
            source: err,
            path: self.backup_root.clone(),
        })?;

        let staging = StagingDir::create(self.backup_root.join(timestamp.as_str()))?;
        let staged = self.stage(items, &staging)?;

        if staged.is_empty() {
            warn!("nothing to back up");
            return Ok(SnapshotOutcome::NothingToBackUp);
        }

        self.pack(staging, &staged, timestamp).map(SnapshotOutcome::Created)
    }

    // Compress staged files, then drop staging unless compression failed.
    fn pack(
        &self,
        staging: StagingDir,
        staged: &[PathBuf],
        timestamp: &Timestamp,
    ) -> Result<BackupRecord> {
        let archive = next_free_archive(&self.backup_root, timestamp)?;
        self.bar.set_message(format!("compress {}", archive.display()));
        let bytes = match self.compress(staged, timestamp, &archive) {
            Ok(bytes) => bytes,
            Err(err) => {
                // INVARIANT: Keep staged copies for inspection, no archive exists.
                staging.keep();
                return Err(err);
            }
        };

        staging.remove();
        info!(
            "backed up {} files to {:?} ({bytes} bytes)",
            staged.len(),
            archive.display()
        );

        Ok(BackupRecord {
            archive,
            files: staged.len(),
            bytes,
        })
    }

    fn stage(&self, items: &[ManagedItem], staging: &StagingDir) -> Result<Vec<PathBuf>> {
        let mut staged = Vec::new();
        for item in items {
            let is_regular_file = symlink_metadata(&item.target)
                .map(|metadata| metadata.file_type().is_file())
                .unwrap_or(false);
            if !is_regular_file {
                debug!("no content to stage at {:?}", item.target.display());
                continue;
            }

            let copy_path = staging.path().join(&item.name);
            copy(&item.target, &copy_path).map_err(|err| SnapshotError::Copy {
                source: err,
                path: item.target.clone(),
            })?;

            debug!("staged {:?}", item.target.display());
            self.bar.set_message(item.display_name());
            self.bar.inc(1);
            staged.push(copy_path);
        }

        Ok(staged)
    }

    fn compress(&self, staged: &[PathBuf], timestamp: &Timestamp, archive: &Path) -> Result<u64> {
        let compress_err = |err: std::io::Error| SnapshotError::Compress {
            source: err,
            path: archive.into(),
        };

        // INVARIANT: Temporary file is deleted on drop unless persisted.
        let mut partial = NamedTempFile::new_in(&self.backup_root).map_err(compress_err)?;
        let encoder = GzEncoder::new(partial.as_file_mut(), Compression::default());
        let mut builder = tar::Builder::new(encoder);

        let prefix = Path::new(timestamp.as_str());
        for path in staged {
            let name = prefix.join(path.file_name().unwrap_or_default());
            builder
                .append_path_with_name(path, name)
                .map_err(compress_err)?;
        }

        let encoder = builder.into_inner().map_err(compress_err)?;
        encoder.finish().map_err(compress_err)?;
        partial.as_file().sync_all().map_err(compress_err)?;

        let file = partial
            .persist_noclobber(archive)
            .map_err(|err| SnapshotError::Persist {
                source: err.error,
                path: archive.into(),
            })?;

        Ok(file.metadata().map(|metadata| metadata.len()).unwrap_or(0))
    }
}

/// Staging directory that deletes itself when dropped.
///
/// Call [`StagingDir::keep`] to leave it on disk instead.
#[derive(Debug)]
pub struct StagingDir {
    path: PathBuf,
    keep: bool,
}

impl StagingDir {
    /// Create new staging directory.
    ///
    /// # Errors
    ///
    /// - Return [`SnapshotError::Staging`] if directory cannot be created,
    ///   including when it already exists.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        create_dir(&path).map_err(|err| SnapshotError::Staging {
            source: err,
            path: path.clone(),
        })?;
        debug!("created staging directory {:?}", path.display());

        Ok(Self { path, keep: false })
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Leave staging directory on disk.
    pub fn keep(mut self) -> PathBuf {
        self.keep = true;
        warn!("staging directory kept at {:?}", self.path.display());
        self.path.clone()
    }

    /// Delete staging directory now.
    pub fn remove(self) {
        drop(self)
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        if self.keep {
            return;
        }

        if let Err(err) = remove_dir_all(&self.path) {
            warn!(
                "failed to remove staging directory {:?}: {err}",
                self.path.display()
            );
        }
    }
}

/// Snapshot error types.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// Backup root cannot be created.
    #[error("failed to create backup root at {:?}", path.display())]
    CreateRoot {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Staging directory cannot be created.
    #[error("failed to create staging directory at {:?}", path.display())]
    Staging {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Target cannot be copied into staging directory.
    #[error("failed to stage {:?}", path.display())]
    Copy {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Staging directory cannot be compressed.
    #[error("failed to compress snapshot into {:?}", path.display())]
    Compress {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// No archive name is left for this timestamp.
    #[error(transparent)]
    Name(#[from] NamerError),

    /// Finished archive cannot be moved into place.
    #[error("failed to move snapshot into place at {:?}", path.display())]
    Persist {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = SnapshotError> = std::result::Result<T, E>;
