// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine default locations for the pieces of state that dotlink reads or
//! writes: the user's home directory, the dotfile repository, the backup root,
//! and the configuration file. None of these functions check whether the
//! returned path exists.

use std::path::PathBuf;

/// Determine absolute path to user's home directory.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or(NoWayHome)
}

/// Determine default absolute path to the dotfile repository.
///
/// Uses `$HOME/.dotfiles`.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn default_source_dir() -> Result<PathBuf> {
    home_dir().map(|home| home.join(".dotfiles"))
}

/// Determine default absolute path to the backup root.
///
/// Uses XDG Base Directory path `$XDG_DATA_HOME/dotlink/backups`. Since the
/// data directory belongs to a single user, so does every snapshot archive
/// placed under it.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_backup_root() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|path| path.join("dotlink").join("backups"))
        .ok_or(NoWayHome)
}

/// Determine default absolute path to the configuration file.
///
/// Uses `$XDG_CONFIG_HOME/dotlink/config.toml`.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn default_config_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("dotlink").join("config.toml"))
        .ok_or(NoWayHome)
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[cfg(target_os = "linux")]
    #[sealed_test(env = [("HOME", "/home/blah"), ("XDG_DATA_HOME", "/home/blah/.local/share")])]
    fn default_paths_follow_environment() -> anyhow::Result<()> {
        assert_eq!(default_source_dir()?, PathBuf::from("/home/blah/.dotfiles"));
        assert_eq!(
            default_backup_root()?,
            PathBuf::from("/home/blah/.local/share/dotlink/backups")
        );

        Ok(())
    }
}
