//! Implementation of the lock commands.

use super::{Coordinator, Report};
use crate::cli::{CheckLockArgs, LockArgs};
use crate::error::Result;
use chrono::Utc;
use serde_json::json;

/// Execute the `baton acquire-lock` command.
pub fn cmd_acquire(coordinator: &Coordinator, args: LockArgs) -> Result<Report> {
    let acquisition = coordinator
        .locks()
        .acquire(&args.resource, &args.agent, args.task.as_deref())?;
    Report::ok(&acquisition)
}

/// Execute the `baton release-lock` command.
pub fn cmd_release(coordinator: &Coordinator, args: LockArgs) -> Result<Report> {
    let lock = coordinator.locks().release(&args.resource, &args.agent)?;
    Report::ok(&json!({ "released": lock }))
}

/// Execute the `baton check-lock` command.
pub fn cmd_check(coordinator: &Coordinator, args: CheckLockArgs) -> Result<Report> {
    let lock = coordinator.locks().inspect(&args.resource)?;
    let remaining_seconds = lock.as_ref().map(|l| l.remaining_seconds(Utc::now()));
    Report::ok(&json!({
        "resource": args.resource,
        "locked": lock.is_some(),
        "remaining_seconds": remaining_seconds,
        "lock": lock,
    }))
}

/// Execute the `baton extend-lock` command.
pub fn cmd_extend(coordinator: &Coordinator, args: LockArgs) -> Result<Report> {
    let lock = coordinator.locks().extend(&args.resource, &args.agent)?;
    Report::ok(&json!({ "lock": lock }))
}
