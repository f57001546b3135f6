//! Implementation of `baton validate-spawn` and `baton prepare-spawn`.

use super::{Coordinator, Report};
use crate::admission::AdmissionController;
use crate::cli::SpawnArgs;
use crate::error::Result;

/// Execute the `baton validate-spawn` command.
///
/// Prints the full decision either way; a denial exits with the code of the
/// first failing check.
pub fn cmd_validate(coordinator: &Coordinator, args: SpawnArgs) -> Result<Report> {
    let health = coordinator.health_signal();
    let controller = AdmissionController::new(&coordinator.store, &coordinator.config, &health);
    let decision = controller.admit(&args.agent_type, args.agent.as_deref(), &args.resources)?;

    match &decision.blocker {
        Some(err) => Report::denied(&decision, err),
        None => Report::ok(&decision),
    }
}

/// Execute the `baton prepare-spawn` command.
pub fn cmd_prepare(coordinator: &Coordinator, args: SpawnArgs) -> Result<Report> {
    let health = coordinator.health_signal();
    let controller = AdmissionController::new(&coordinator.store, &coordinator.config, &health);
    let grant = controller.prepare_spawn(
        &args.agent_type,
        args.agent.as_deref(),
        args.task.as_deref(),
        &args.resources,
    )?;
    Report::ok(&grant)
}
