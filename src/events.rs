//! Audit event log for baton.
//!
//! Coordination events are appended as NDJSON (one JSON object per line) to
//! `<state>/events/events.ndjson`, giving operators a trail of who held what
//! and why a session ended.
//!
//! # Event Format
//!
//! Each event is a JSON object with the following fields:
//! - `ts`: RFC3339 timestamp
//! - `action`: The action performed (lock_acquire, session_end, sweep, ...)
//! - `actor`: The invoking user (e.g., `user@HOST`)
//! - `agent`: Optional holder id the event concerns
//! - `details`: Freeform object with action-specific details
//!
//! Events are recorded after the state they describe has been committed.
//! [`record`] never fails the caller: a committed operation stays
//! committed even if the audit append does not go through.

use crate::context::CoordinationContext;
use crate::error::{BatonError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use tracing::warn;

/// Actions that can be logged as events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    LockAcquire,
    LockRelease,
    LockExtend,
    SessionRegister,
    SessionEnd,
    /// Stale reclamation that actually removed something.
    Sweep,
    Spawn,
    /// A prepare-spawn that failed partway and was unwound.
    SpawnRollback,
    ProgressCommit,
    /// A malformed progress document was replaced by its backup.
    ProgressRestore,
}

impl std::fmt::Display for EventAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EventAction::LockAcquire => "lock_acquire",
            EventAction::LockRelease => "lock_release",
            EventAction::LockExtend => "lock_extend",
            EventAction::SessionRegister => "session_register",
            EventAction::SessionEnd => "session_end",
            EventAction::Sweep => "sweep",
            EventAction::Spawn => "spawn",
            EventAction::SpawnRollback => "spawn_rollback",
            EventAction::ProgressCommit => "progress_commit",
            EventAction::ProgressRestore => "progress_restore",
        };
        f.write_str(name)
    }
}

/// An event record for the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub ts: DateTime<Utc>,
    pub action: EventAction,
    pub actor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    pub details: Value,
}

impl Event {
    /// Create a new event with the given action, stamped now.
    pub fn new(action: EventAction) -> Self {
        Self {
            ts: Utc::now(),
            action,
            actor: actor_string(),
            agent: None,
            details: Value::Object(serde_json::Map::new()),
        }
    }

    /// Set the holder id this event concerns.
    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent = Some(agent_id.into());
        self
    }

    /// Set the details object for this event.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// Serialize the event to a single-line JSON string.
    pub fn to_ndjson_line(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| BatonError::Io(format!("failed to serialize event to JSON: {}", e)))
    }
}

/// `user@host` for the invoking process.
pub fn actor_string() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}

/// Append an event to the events log.
pub fn append_event(ctx: &CoordinationContext, event: &Event) -> Result<()> {
    let json_line = event.to_ndjson_line()?;

    let events_dir = ctx.events_dir();
    if !events_dir.exists() {
        fs::create_dir_all(&events_dir).map_err(|e| {
            BatonError::Io(format!(
                "failed to create events directory '{}': {}",
                events_dir.display(),
                e
            ))
        })?;
    }

    let events_file = ctx.events_file();
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&events_file)
        .map_err(|e| {
            BatonError::Io(format!(
                "failed to open events file '{}': {}",
                events_file.display(),
                e
            ))
        })?;

    // One write per line so concurrent appenders never interleave within a line.
    file.write_all(format!("{}\n", json_line).as_bytes())
        .map_err(|e| {
            BatonError::Io(format!(
                "failed to write event to '{}': {}",
                events_file.display(),
                e
            ))
        })?;

    file.sync_all().map_err(|e| {
        BatonError::Io(format!(
            "failed to sync events file '{}': {}",
            events_file.display(),
            e
        ))
    })?;

    Ok(())
}

/// Append an event, logging instead of failing.
pub fn record(ctx: &CoordinationContext, event: Event) {
    if let Err(e) = append_event(ctx, &event) {
        warn!(action = %event.action, error = %e, "failed to append audit event");
    }
}

/// Read all events from the log, skipping lines that fail to parse.
#[cfg(test)]
pub(crate) fn read_events(ctx: &CoordinationContext) -> Result<Vec<Event>> {
    let Some(bytes) = crate::fs::read_if_exists(ctx.events_file())? else {
        return Ok(Vec::new());
    };

    Ok(String::from_utf8_lossy(&bytes)
        .lines()
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect())
}
