//! Implementation of the session commands.

use super::{Coordinator, Report};
use crate::cli::{EndSessionArgs, EndStatus, RegisterArgs, SessionArgs};
use crate::error::Result;
use crate::sessions::SessionStatus;
use serde_json::json;

/// Execute the `baton register-session` command.
pub fn cmd_register(coordinator: &Coordinator, args: RegisterArgs) -> Result<Report> {
    let session =
        coordinator
            .sessions()
            .register(&args.agent, args.task.as_deref(), &args.agent_type)?;
    Report::ok(&json!({ "session": session }))
}

/// Execute the `baton heartbeat` command.
pub fn cmd_heartbeat(coordinator: &Coordinator, args: SessionArgs) -> Result<Report> {
    let session = coordinator.sessions().heartbeat(&args.session_id)?;
    Report::ok(&json!({ "session": session }))
}

/// Execute the `baton end-session` command.
pub fn cmd_end(coordinator: &Coordinator, args: EndSessionArgs) -> Result<Report> {
    let status = match args.status {
        EndStatus::Completed => SessionStatus::Completed,
        EndStatus::Failed => SessionStatus::Failed,
    };
    let report = coordinator.sessions().end(&args.session_id, status)?;
    Report::ok(&report)
}
