//! Implementation of the `baton progress` subcommands.
//!
//! Each invocation opens exactly one transaction on the stage's document and
//! either commits it or rolls it back.

use super::{Coordinator, Report};
use crate::cli::{SetCheckpointArgs, SetPhaseArgs, StageArgs, UpdatePhaseArgs};
use crate::error::{BatonError, Result};
use serde_json::{Map, Value, json};

/// Execute the `baton progress show` command.
pub fn cmd_show(coordinator: &Coordinator, args: StageArgs) -> Result<Report> {
    let document = coordinator
        .progress()
        .with_transaction(&args.stage, |tx| Ok(tx.document().clone()))?;
    Report::ok(&json!({ "stage": args.stage, "document": document }))
}

/// Execute the `baton progress update-phase` command.
pub fn cmd_update_phase(coordinator: &Coordinator, args: UpdatePhaseArgs) -> Result<Report> {
    let mut fields = Map::new();
    for assignment in &args.fields {
        let (key, value) = parse_assignment(assignment)?;
        fields.insert(key, value);
    }
    if let Some(status) = &args.status {
        fields.insert("status".to_string(), Value::String(status.clone()));
    }

    let phase = coordinator
        .progress()
        .with_transaction(&args.stage, |tx| tx.update_phase(&args.phase, fields).cloned())?;
    Report::ok(&json!({
        "stage": args.stage,
        "phase_name": args.phase,
        "phase": phase,
    }))
}

/// Execute the `baton progress set-checkpoint` command.
pub fn cmd_set_checkpoint(coordinator: &Coordinator, args: SetCheckpointArgs) -> Result<Report> {
    let previous = coordinator.progress().with_transaction(&args.stage, |tx| {
        let previous = tx.document().checkpoint;
        tx.set_checkpoint(args.checkpoint);
        Ok(previous)
    })?;
    Report::ok(&json!({
        "stage": args.stage,
        "checkpoint": args.checkpoint,
        "previous_checkpoint": previous,
    }))
}

/// Execute the `baton progress set-phase` command.
pub fn cmd_set_phase(coordinator: &Coordinator, args: SetPhaseArgs) -> Result<Report> {
    let phase = if args.clear { None } else { args.phase.as_deref() };
    coordinator.progress().with_transaction(&args.stage, |tx| {
        tx.set_current_phase(phase);
        Ok(())
    })?;
    Report::ok(&json!({ "stage": args.stage, "current_phase": phase }))
}

/// Split `key=value`. The value is parsed as JSON when it is valid JSON and
/// kept as a plain string otherwise.
fn parse_assignment(assignment: &str) -> Result<(String, Value)> {
    let (key, raw) = assignment.split_once('=').ok_or_else(|| {
        BatonError::InvalidArgument(format!(
            "expected key=value, got '{}'",
            assignment
        ))
    })?;

    let key = key.trim();
    if key.is_empty() {
        return Err(BatonError::InvalidArgument(format!(
            "empty key in '{}'",
            assignment
        )));
    }

    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}
