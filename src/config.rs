// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Every invocation of dotlink works from one [`Config`] value. It is built
//! once, from defaults, an optional configuration file, and command line
//! overrides, then handed to [`Dotfiles`](crate::dotfiles::Dotfiles). Nothing
//! past this point looks up paths from the environment on its own.
//!
//! # General Layout
//!
//! ```toml
//! source_dir = "$HOME/.dotfiles"
//! target_dir = "~"
//! exclude = ["README.md", "*.swp"]
//!
//! [backup]
//! root = "$XDG_DATA_HOME/dotlink/backups"
//! retention_limit = 5
//! ```
//!
//! Every field is optional in the file. Missing fields fall back to the
//! defaults of [`Config::try_default`]. Path fields are shell expanded.

use crate::path::{default_backup_root, default_source_dir, home_dir, NoWayHome};

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
};

/// Default maximum number of snapshot archives to keep.
pub const DEFAULT_RETENTION_LIMIT: usize = 5;

/// Effective configuration for one invocation.
#[derive(Debug, PartialEq, Eq, Clone, Serialize)]
pub struct Config {
    /// Repository directory holding the canonical dotfiles.
    pub source_dir: PathBuf,

    /// Directory where symlinks to the dotfiles are placed.
    pub target_dir: PathBuf,

    /// Gitignore style patterns of source files to leave unmanaged.
    pub exclude: Vec<String>,

    /// Snapshot archive settings.
    pub backup: BackupSettings,
}

impl Config {
    /// Construct configuration out of default values.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::NoWayHome`] if home directory cannot be
    ///   determined.
    pub fn try_default() -> Result<Self> {
        Ok(Self {
            source_dir: default_source_dir()?,
            target_dir: home_dir()?,
            exclude: Vec::new(),
            backup: BackupSettings {
                root: default_backup_root()?,
                retention_limit: DEFAULT_RETENTION_LIMIT,
            },
        })
    }

    /// Load configuration file at target path.
    ///
    /// A missing file is not an error, the defaults are used instead.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::ReadFile`] if the file exists but cannot be
    ///   read.
    /// - Return any parse error of [`Config::from_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Self::try_default();
        }

        read_to_string(path)
            .map_err(|err| ConfigError::ReadFile {
                source: err,
                path: path.into(),
            })?
            .parse()
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let file: ConfigFile = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;
        let mut config = Self::try_default()?;

        if let Some(source_dir) = file.source_dir {
            config.source_dir = expand_path(&source_dir)?;
        }

        if let Some(target_dir) = file.target_dir {
            config.target_dir = expand_path(&target_dir)?;
        }

        if let Some(exclude) = file.exclude {
            config.exclude = exclude;
        }

        if let Some(backup) = file.backup {
            if let Some(root) = backup.root {
                config.backup.root = expand_path(&root)?;
            }

            if let Some(retention_limit) = backup.retention_limit {
                config.backup.retention_limit = retention_limit;
            }
        }

        // INVARIANT: Retention must always keep at least the newest snapshot.
        if config.backup.retention_limit == 0 {
            return Err(ConfigError::ZeroRetention);
        }

        Ok(config)
    }
}

impl Display for Config {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Snapshot archive settings.
#[derive(Debug, PartialEq, Eq, Clone, Serialize)]
pub struct BackupSettings {
    /// Directory holding snapshot archives.
    pub root: PathBuf,

    /// Maximum number of snapshot archives to keep.
    pub retention_limit: usize,
}

// On-disk layout, every field optional.
#[derive(Default, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    source_dir: Option<String>,
    target_dir: Option<String>,
    exclude: Option<Vec<String>>,
    backup: Option<BackupFile>,
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct BackupFile {
    root: Option<String>,
    retention_limit: Option<usize>,
}

fn expand_path(path: &str) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path)
            .map_err(ConfigError::ShellExpansion)?
            .into_owned(),
    ))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read configuration file at {:?}", path.display())]
    ReadFile {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),

    /// Default paths cannot be determined.
    #[error(transparent)]
    NoWayHome(#[from] NoWayHome),

    /// Retention limit of zero would delete every snapshot.
    #[error("backup retention limit must be at least 1")]
    ZeroRetention,
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("HOME", "/home/blah"), ("BLAH", "/srv/blah")])]
    fn deserialize_config() -> anyhow::Result<()> {
        let result: Config = r#"
            source_dir = "$BLAH/dotfiles"
            target_dir = "~"
            exclude = ["README.md", "*.swp"]

            [backup]
            root = "/srv/backups"
            retention_limit = 3
        "#
        .parse()?;

        let expect = Config {
            source_dir: "/srv/blah/dotfiles".into(),
            target_dir: "/home/blah".into(),
            exclude: vec!["README.md".into(), "*.swp".into()],
            backup: BackupSettings {
                root: "/srv/backups".into(),
                retention_limit: 3,
            },
        };

        assert_eq!(result, expect);

        Ok(())
    }

    #[sealed_test(env = [("HOME", "/home/blah")])]
    fn deserialize_partial_config_keeps_defaults() -> anyhow::Result<()> {
        let result: Config = r#"
            [backup]
            root = "/srv/backups"
        "#
        .parse()?;

        assert_eq!(result.source_dir, PathBuf::from("/home/blah/.dotfiles"));
        assert_eq!(result.target_dir, PathBuf::from("/home/blah"));
        assert_eq!(result.backup.root, PathBuf::from("/srv/backups"));
        assert_eq!(result.backup.retention_limit, DEFAULT_RETENTION_LIMIT);

        Ok(())
    }

    #[sealed_test(env = [("HOME", "/home/blah")])]
    fn reject_zero_retention_limit() {
        let result = "[backup]\nretention_limit = 0\n".parse::<Config>();
        assert!(matches!(result, Err(ConfigError::ZeroRetention)));
    }

    #[sealed_test(env = [("HOME", "/home/blah")])]
    fn reject_unknown_fields() {
        let result = "work_tree_alias = \"/tmp\"\n".parse::<Config>();
        assert!(matches!(result, Err(ConfigError::Deserialize(_))));
    }

    #[sealed_test(env = [("HOME", "/home/blah")])]
    fn load_missing_file_uses_defaults() -> anyhow::Result<()> {
        let result = Config::load("/nonexistent/dotlink/config.toml")?;
        assert_eq!(result, Config::try_default()?);

        Ok(())
    }

    #[test]
    fn serialize_config() {
        let result = Config {
            source_dir: "/home/blah/.dotfiles".into(),
            target_dir: "/home/blah".into(),
            exclude: vec!["README.md".into(), "*.swp".into()],
            backup: BackupSettings {
                root: "/home/blah/.local/share/dotlink/backups".into(),
                retention_limit: 5,
            },
        }
        .to_string();

        let expect = indoc! {r#"
            source_dir = "/home/blah/.dotfiles"
            target_dir = "/home/blah"
            exclude = [
                "README.md",
                "*.swp",
            ]

            [backup]
            root = "/home/blah/.local/share/dotlink/backups"
            retention_limit = 5
        "#};

        assert_eq!(result, expect);
    }
}
