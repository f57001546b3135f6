//! Implementation of `baton status` and `baton cleanup-stale`.

use super::{Coordinator, Report};
use crate::error::Result;

/// Execute the `baton status` command.
///
/// Read-only: expired locks are excluded from the active counts but are not
/// removed.
pub fn cmd_status(coordinator: &Coordinator) -> Result<Report> {
    let status = coordinator.sessions().status()?;
    Report::ok(&status)
}

/// Execute the `baton cleanup-stale` command.
pub fn cmd_cleanup_stale(coordinator: &Coordinator) -> Result<Report> {
    let sweep = coordinator.reaper().sweep()?;
    Report::ok(&sweep)
}
