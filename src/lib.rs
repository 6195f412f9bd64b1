// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Symlink based dotfile deployment.
//!
//! Dotlink keeps a directory of dotfiles, the __source directory__, linked
//! into a __target directory__, usually the user's home. Every regular file at
//! the top-level of the source directory is a managed item, and deploying it
//! means placing a symlink to it at the same name in the target directory.
//!
//! Whatever real content already sits at a target path is renamed to a
//! timestamped backup before it is replaced, so deployment never loses data.
//! On top of that, the whole set of targets holding real content can be
//! packed into snapshot archives, of which only a bounded number is kept.
//!
//! There is no manifest. The source directory itself is the source of truth,
//! and the state of every target is inspected fresh on each run.

pub mod backup;
pub mod config;
pub mod dotfiles;
pub mod item;
pub mod link;
pub mod path;
pub mod reconcile;
pub mod status;

pub use backup::Timestamp;
pub use config::Config;
pub use dotfiles::{BackupReport, Dotfiles, DotfilesError};
pub use item::ManagedItem;
pub use link::LinkState;
