//! Spawn admission for baton.
//!
//! Before a worker starts, the admission controller decides whether it may.
//! Checks run in a fixed order and stop at the first failure, so the reported
//! reason always names the first blocking condition:
//!
//! 1. Capacity: fewer than `max_concurrent` sessions are active
//! 2. Instance limit: the agent type is below its own limit
//! 3. Resources: every required key is free or already held by this holder
//! 4. Health: the external health signal reports no veto and no unresolved
//!    critical violations
//!
//! [`AdmissionController::prepare_spawn`] evaluates the same checks and then
//! registers the session and acquires the locks, all inside one store
//! transaction. If an acquisition fails partway, the locks taken so far are
//! released and the session is archived as `failed` in that same commit.

mod controller;
mod health;

#[cfg(test)]
mod tests;

pub use controller::{AdmissionController, Check, CheckKind, Decision, SpawnGrant};
pub use health::{FileHealthSignal, HealthReport, HealthSignal, Severity, Veto, Violation};
