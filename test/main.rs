// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT


use anyhow::Result;
use dotlink::{
    config::{BackupSettings, Config},
    Dotfiles, Timestamp,
};
use std::{
    collections::BTreeMap,
    fs::{create_dir, read_dir, read_to_string, write},
    path::{Path, PathBuf},
};
use tempfile::TempDir;

/// Scratch source, home, and backup directories wired into a [`Config`].
pub(crate) struct DotfilesFixture {
    root: TempDir,
    config: Config,
}

impl DotfilesFixture {
    pub(crate) fn new() -> Result<Self> {
        let root = TempDir::new()?;
        create_dir(root.path().join("dotfiles"))?;
        create_dir(root.path().join("home"))?;

        let config = Config {
            source_dir: root.path().join("dotfiles"),
            target_dir: root.path().join("home"),
            exclude: Vec::new(),
            backup: BackupSettings {
                root: root.path().join("backups"),
                retention_limit: 5,
            },
        };

        Ok(Self { root, config })
    }

    pub(crate) fn with_exclude(mut self, patterns: &[&str]) -> Self {
        self.config.exclude = patterns.iter().map(ToString::to_string).collect();
        self
    }

    pub(crate) fn source(&self) -> PathBuf {
        self.root.path().join("dotfiles")
    }

    pub(crate) fn home(&self) -> PathBuf {
        self.root.path().join("home")
    }

    pub(crate) fn backups(&self) -> PathBuf {
        self.root.path().join("backups")
    }

    pub(crate) fn add_source(&self, name: &str, contents: &str) -> Result<()> {
        write(self.source().join(name), contents)?;
        Ok(())
    }

    pub(crate) fn add_home(&self, name: &str, contents: &str) -> Result<()> {
        write(self.home().join(name), contents)?;
        Ok(())
    }

    pub(crate) fn open(&self) -> Result<Dotfiles> {
        Ok(Dotfiles::open(self.config.clone())?)
    }

    /// Describe every entry of home directory: link target or file content.
    pub(crate) fn home_state(&self) -> Result<BTreeMap<String, String>> {
        describe_dir(&self.home())
    }
}

pub(crate) fn describe_dir(dir: &Path) -> Result<BTreeMap<String, String>> {
    let mut state = BTreeMap::new();
    for entry in read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        let file_type = entry.file_type()?;
        let description = if file_type.is_symlink() {
            format!("-> {}", path.read_link()?.display())
        } else if file_type.is_dir() {
            "<dir>".to_string()
        } else {
            read_to_string(&path)?
        };
        state.insert(name, description);
    }

    Ok(state)
}

/// Sorted entry names of directory, for directories holding binary files.
pub(crate) fn dir_names(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in read_dir(dir)? {
        names.push(entry?.file_name().to_string_lossy().into_owned());
    }
    names.sort();

    Ok(names)
}

pub(crate) fn stamp(text: &str) -> Timestamp {
    Timestamp::parse(text).expect("valid timestamp")
}
