// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Managed item discovery.
//!
//! The set of managed items is never stored anywhere. Every invocation scans
//! the top-level of the source directory, and every file that passes the
//! [`SourceFilter`] becomes a [`ManagedItem`] that should be linked into the
//! target directory under the same name.
//!
//! Directories are never managed, and nothing is linked recursively. Names
//! containing `.bak` are treated as backup leftovers and skipped as well.

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::{
    ffi::{OsStr, OsString},
    fs::{metadata, read_dir, symlink_metadata},
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};

/// One deployable dotfile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedItem {
    /// Bare file name, shared by source and target.
    pub name: OsString,

    /// Absolute path to canonical content inside the repository.
    pub source: PathBuf,

    /// Absolute path where the symlink must exist.
    pub target: PathBuf,
}

impl ManagedItem {
    /// Construct new managed item for file name shared by both directories.
    pub fn new(
        name: impl Into<OsString>,
        source_dir: impl AsRef<Path>,
        target_dir: impl AsRef<Path>,
    ) -> Self {
        let name = name.into();
        Self {
            source: source_dir.as_ref().join(&name),
            target: target_dir.as_ref().join(&name),
            name,
        }
    }

    /// Lossy display name.
    pub fn display_name(&self) -> String {
        self.name.to_string_lossy().into_owned()
    }
}

/// Structured view of one source directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    pub name: OsString,
    pub path: PathBuf,

    /// Entry is a directory, or a symlink that resolves to one.
    pub is_dir: bool,

    /// Entry itself is a symlink.
    pub is_symlink: bool,
}

impl FileMeta {
    /// Inspect path.
    ///
    /// Returns `None` when path does not resolve to anything, e.g., a
    /// dangling symlink.
    pub fn inspect(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let name = path.file_name()?.to_os_string();
        let is_symlink = symlink_metadata(&path).ok()?.file_type().is_symlink();
        let is_dir = metadata(&path).ok()?.is_dir();

        Some(Self {
            name,
            path,
            is_dir,
            is_symlink,
        })
    }
}

/// Decide which source directory entries become managed items.
#[derive(Debug, Clone)]
pub struct SourceFilter {
    excludes: Gitignore,
}

impl SourceFilter {
    /// Construct new source filter with extra gitignore style exclusion
    /// patterns, matched relative to the source directory.
    ///
    /// # Errors
    ///
    /// - Return [`ItemError::Pattern`] if any pattern is malformed.
    pub fn new(
        source_dir: impl AsRef<Path>,
        excludes: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> Result<Self> {
        let mut builder = GitignoreBuilder::new(source_dir.as_ref());
        for pattern in excludes {
            builder.add_line(None, pattern.as_ref())?;
        }

        Ok(Self {
            excludes: builder.build()?,
        })
    }

    /// Check if entry should be managed.
    pub fn accepts(&self, meta: &FileMeta) -> bool {
        if meta.is_dir {
            return false;
        }

        if is_backup_name(&meta.name) {
            return false;
        }

        !self.excludes.matched(&meta.path, meta.is_dir).is_ignore()
    }
}

/// Check if file name looks like a backup artifact.
pub fn is_backup_name(name: &OsStr) -> bool {
    name.to_string_lossy().contains(".bak")
}

/// Scan source directory for managed items.
///
/// Items come back sorted by name so every run walks them in the same order.
///
/// # Errors
///
/// - Return [`ItemError::SourceMissing`] if source directory does not exist.
/// - Return [`ItemError::ReadSource`] if source directory cannot be listed.
#[instrument(skip(source_dir, target_dir, filter), level = "debug")]
pub fn scan(
    source_dir: impl AsRef<Path>,
    target_dir: impl AsRef<Path>,
    filter: &SourceFilter,
) -> Result<Vec<ManagedItem>> {
    let source_dir = source_dir.as_ref();
    if !source_dir.is_dir() {
        return Err(ItemError::SourceMissing {
            path: source_dir.into(),
        });
    }

    let entries = read_dir(source_dir).map_err(|err| ItemError::ReadSource {
        source: err,
        path: source_dir.into(),
    })?;

    let mut items = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| ItemError::ReadSource {
            source: err,
            path: source_dir.into(),
        })?;

        let Some(meta) = FileMeta::inspect(entry.path()) else {
            debug!("skip unresolvable entry {:?}", entry.path().display());
            continue;
        };

        if !filter.accepts(&meta) {
            debug!("skip unmanaged entry {:?}", meta.path.display());
            continue;
        }

        items.push(ManagedItem::new(meta.name, source_dir, target_dir.as_ref()));
    }

    items.sort_by(|a, b| a.name.cmp(&b.name));
    debug!("found {} managed items", items.len());

    Ok(items)
}

/// Managed item discovery error types.
#[derive(Debug, thiserror::Error)]
pub enum ItemError {
    /// Source directory does not exist.
    #[error("source directory {:?} does not exist", path.display())]
    SourceMissing { path: PathBuf },

    /// Source directory cannot be listed.
    #[error("failed to read source directory {:?}", path.display())]
    ReadSource {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Exclusion pattern is malformed.
    #[error(transparent)]
    Pattern(#[from] ignore::Error),
}

/// Friendly result alias :3
pub type Result<T, E = ItemError> = std::result::Result<T, E>;
