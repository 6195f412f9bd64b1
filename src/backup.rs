// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Backup handling.
//!
//! Dotlink never throws away content it did not create. Two kinds of backups
//! exist:
//!
//! - __File backups__: a target holding real content is renamed to
//!   `<target>.bak_<ts>` right before deployment replaces it with a symlink.
//!   These sit next to the original target.
//! - __Snapshots__: the `backup` command packs every managed target that
//!   holds real content into `<backup_root>/backup-<ts>.tar.gz`. Only a
//!   bounded number of snapshots is kept around.
//!
//! Both kinds share one [`Timestamp`](namer::Timestamp) per invocation.
//!
//! # See Also
//!
//! 1. [`namer`]
//! 2. [`snapshot`]
//! 3. [`retention`]

pub mod namer;
pub mod retention;
pub mod snapshot;

pub use namer::Timestamp;
pub use retention::{CleanupReport, RetentionPolicy};
pub use snapshot::{BackupRecord, SnapshotArchiver, SnapshotOutcome};
