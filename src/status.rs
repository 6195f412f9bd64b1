// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Read-only status reporting.

use crate::{
    item::ManagedItem,
    link::{classify, LinkError, LinkState},
};

use std::ffi::OsString;
use tracing::{debug, instrument};

/// Aggregated state of every managed item.
#[derive(Debug, Default)]
pub struct StatusReport {
    /// Items with a correct link.
    pub ok: usize,

    /// Items missing, wrongly linked, blocked, or not inspectable.
    pub errors: usize,

    /// State of each item that could be inspected, in item order.
    pub details: Vec<(OsString, LinkState)>,

    /// Items whose target could not be inspected.
    pub failures: Vec<(OsString, LinkError)>,
}

impl StatusReport {
    /// Every item is correctly linked.
    pub fn is_success(&self) -> bool {
        self.errors == 0
    }
}

/// Classify every managed item without touching anything.
#[instrument(skip(items), level = "debug")]
pub fn status(items: &[ManagedItem]) -> StatusReport {
    let mut report = StatusReport::default();
    for item in items {
        match classify(&item.target, &item.source) {
            Ok(state) => {
                debug!("{:?} is {state}", item.display_name());
                if state.is_correct() {
                    report.ok += 1;
                } else {
                    report.errors += 1;
                }
                report.details.push((item.name.clone(), state));
            }
            Err(err) => {
                report.errors += 1;
                report.failures.push((item.name.clone(), err));
            }
        }
    }

    report
}
