// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Symlink inspection and replacement.
//!
//! Dotlink only ever wants one thing at a target path: a symlink whose
//! _literal_ target is the managed source file. This module tells what a
//! target path currently holds, and swaps a correct link into place.
//!
//! # Literal Comparison
//!
//! A symlink is only considered correct when the path stored in the link is
//! byte-for-byte the expected source path. No canonicalization happens, and
//! link chains are never followed past the first hop. A link that happens to
//! reach the same file through another route is still a wrong link. This
//! keeps status output stable and easy to explain.

use std::{
    ffi::OsString,
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{remove_file, rename, symlink_metadata},
    io::ErrorKind,
    os::unix::fs::symlink,
    path::{Path, PathBuf},
};
use tracing::debug;

/// Current state of a target path relative to its expected source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    /// Nothing exists at target path.
    Absent,

    /// Symlink pointing at expected source.
    CorrectLink,

    /// Symlink pointing somewhere else.
    WrongLink { actual: PathBuf },

    /// Non-link content occupies target path.
    Blocked(NodeKind),
}

impl LinkState {
    /// Target path already is what deployment would make it.
    pub fn is_correct(&self) -> bool {
        matches!(self, Self::CorrectLink)
    }

    /// Target path is a symlink of any kind.
    pub fn is_link(&self) -> bool {
        matches!(self, Self::CorrectLink | Self::WrongLink { .. })
    }
}

impl Display for LinkState {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Absent => fmt.write_str("MISSING"),
            Self::CorrectLink => fmt.write_str("OK"),
            Self::WrongLink { actual } => write!(fmt, "WRONG LINK -> {}", actual.display()),
            Self::Blocked(kind) => write!(fmt, "BLOCKED ({kind})"),
        }
    }
}

/// Kind of non-link node blocking a target path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Regular file.
    File,

    /// Directory.
    Directory,

    /// Device, socket, fifo, etc.
    Other,
}

impl Display for NodeKind {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::File => fmt.write_str("regular file"),
            Self::Directory => fmt.write_str("directory"),
            Self::Other => fmt.write_str("special file"),
        }
    }
}

/// Classify what currently occupies target path.
///
/// Never mutates the file system.
///
/// # Errors
///
/// - Return [`LinkError::Inspect`] if target path cannot be inspected for
///   any reason besides not existing.
/// - Return [`LinkError::ReadLink`] if symlink target cannot be read.
pub fn classify(target: impl AsRef<Path>, expected: impl AsRef<Path>) -> Result<LinkState> {
    let target = target.as_ref();
    let metadata = match symlink_metadata(target) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(LinkState::Absent),
        Err(err) => {
            return Err(LinkError::Inspect {
                source: err,
                path: target.into(),
            })
        }
    };

    let file_type = metadata.file_type();
    if file_type.is_symlink() {
        // INVARIANT: One hop only, compared literally.
        let actual = target.read_link().map_err(|err| LinkError::ReadLink {
            source: err,
            path: target.into(),
        })?;

        // Path equality would normalize away `.` components and trailing
        // slashes, so compare the raw link text instead.
        return Ok(if actual.as_os_str() == expected.as_ref().as_os_str() {
            LinkState::CorrectLink
        } else {
            LinkState::WrongLink { actual }
        });
    }

    let kind = if file_type.is_file() {
        NodeKind::File
    } else if file_type.is_dir() {
        NodeKind::Directory
    } else {
        NodeKind::Other
    };

    Ok(LinkState::Blocked(kind))
}

/// Atomically place symlink at target path pointing to source.
///
/// The new link is created under a temporary sibling name, then renamed over
/// target path. Whatever link was at target path before is replaced in one
/// step, so a crash leaves either the old link, the new link, or nothing.
/// Target path must not be a directory.
///
/// # Errors
///
/// - Return [`LinkError::Create`] if the temporary link cannot be created.
/// - Return [`LinkError::Swap`] if the temporary link cannot be renamed over
///   target path. The temporary link is removed in that case.
pub fn replace_symlink(source: impl AsRef<Path>, target: impl AsRef<Path>) -> Result<()> {
    let source = source.as_ref();
    let target = target.as_ref();
    let staged = staging_path(target);

    // INVARIANT: Leftover staging link from a crashed run is ours to discard.
    match remove_file(&staged) {
        Ok(()) => debug!("removed stale staging link {:?}", staged.display()),
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => {
            return Err(LinkError::Create {
                source: err,
                path: staged,
            })
        }
    }

    symlink(source, &staged).map_err(|err| LinkError::Create {
        source: err,
        path: staged.clone(),
    })?;

    if let Err(err) = rename(&staged, target) {
        let _ = remove_file(&staged);
        return Err(LinkError::Swap {
            source: err,
            path: target.into(),
        });
    }

    Ok(())
}

fn staging_path(target: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(target.file_name().unwrap_or_default());
    name.push(format!(".dotlink-{}.tmp", std::process::id()));
    target.with_file_name(name)
}

/// Symlink inspection and replacement error types.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Target path cannot be inspected.
    #[error("failed to inspect {:?}", path.display())]
    Inspect {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Symlink target cannot be read.
    #[error("failed to read symlink at {:?}", path.display())]
    ReadLink {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Symlink cannot be created.
    #[error("failed to create symlink at {:?}", path.display())]
    Create {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Symlink cannot be moved over target path.
    #[error("failed to move symlink into place at {:?}", path.display())]
    Swap {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

impl LinkError {
    /// Kind of the underlying I/O failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Inspect { source, .. }
            | Self::ReadLink { source, .. }
            | Self::Create { source, .. }
            | Self::Swap { source, .. } => source.kind(),
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = LinkError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs::{create_dir, read_dir, write};
    use tempfile::TempDir;

    #[test]
    fn classify_absent_target() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let state = classify(root.path().join(".bashrc"), root.path().join("src/.bashrc"))?;
        assert_eq!(state, LinkState::Absent);

        Ok(())
    }

    #[test]
    fn classify_correct_and_wrong_links() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let source = root.path().join("source");
        let target = root.path().join("target");
        write(&source, "X")?;
        symlink(&source, &target)?;

        assert_eq!(classify(&target, &source)?, LinkState::CorrectLink);

        let other = root.path().join("other");
        assert_eq!(
            classify(&target, &other)?,
            LinkState::WrongLink {
                actual: source.clone()
            }
        );

        Ok(())
    }

    #[test]
    fn classify_compares_link_text_literally() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let source = root.path().join("source");
        let target = root.path().join("target");
        write(&source, "X")?;

        // Same inode, different spelling.
        let detour = root.path().join(".").join("source");
        symlink(&detour, &target)?;

        assert_eq!(
            classify(&target, &source)?,
            LinkState::WrongLink { actual: detour }
        );

        Ok(())
    }

    #[test]
    fn classify_dangling_link_is_still_a_link() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let source = root.path().join("missing");
        let target = root.path().join("target");
        symlink(&source, &target)?;

        assert_eq!(classify(&target, &source)?, LinkState::CorrectLink);

        Ok(())
    }

    #[test]
    fn classify_blocking_nodes() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let file = root.path().join("file");
        let dir = root.path().join("dir");
        write(&file, "X")?;
        create_dir(&dir)?;

        assert_eq!(
            classify(&file, "/nowhere")?,
            LinkState::Blocked(NodeKind::File)
        );
        assert_eq!(
            classify(&dir, "/nowhere")?,
            LinkState::Blocked(NodeKind::Directory)
        );

        Ok(())
    }

    #[test]
    fn replace_symlink_swaps_existing_link() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let source = root.path().join("source");
        let target = root.path().join("target");
        symlink("/somewhere/else", &target)?;

        replace_symlink(&source, &target)?;

        assert_eq!(target.read_link()?, source);
        let leftovers = read_dir(root.path())?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);

        Ok(())
    }

    #[test]
    fn replace_symlink_missing_parent_fails() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let target = root.path().join("no").join("such").join("dir");

        let result = replace_symlink(root.path().join("source"), &target);

        assert!(matches!(result, Err(LinkError::Create { .. })));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::NotFound);

        Ok(())
    }
}
