//! Session record and session table definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current on-disk format version of `sessions.json`.
pub const SESSION_TABLE_VERSION: u32 = 1;

/// Lifecycle state of a worker session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    /// The worker reported success.
    Completed,
    /// The worker reported failure (or its spawn was unwound).
    Failed,
    /// The worker died without reporting; ended by the reaper.
    Terminated,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
            SessionStatus::Terminated => "terminated",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Active)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "terminated" => Ok(Self::Terminated),
            other => Err(format!("unknown session status '{}'", other)),
        }
    }
}

/// One registered worker run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,

    #[serde(rename = "agent_id")]
    pub holder_id: String,

    #[serde(rename = "agent_type")]
    pub holder_type: String,

    pub task_id: Option<String>,

    pub status: SessionStatus,

    pub started_at: DateTime<Utc>,

    pub last_heartbeat: DateTime<Utc>,

    /// Lock ids currently owned by this session. Always empty once terminal.
    #[serde(default)]
    pub locks_held: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub termination_reason: Option<String>,

    /// Lock ids released when the session ended.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub released_locks: Vec<String>,
}

impl SessionRecord {
    /// Seconds since the last heartbeat at `now`.
    pub fn silence_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.last_heartbeat).num_seconds()
    }
}

/// Durable table of sessions: the active set plus a bounded terminal history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionTable {
    #[serde(default = "session_table_version")]
    pub version: u32,

    #[serde(default)]
    pub active: BTreeMap<String, SessionRecord>,

    /// Terminal sessions, oldest first.
    #[serde(default)]
    pub history: Vec<SessionRecord>,
}

impl Default for SessionTable {
    fn default() -> Self {
        Self {
            version: SESSION_TABLE_VERSION,
            active: BTreeMap::new(),
            history: Vec::new(),
        }
    }
}

fn session_table_version() -> u32 {
    SESSION_TABLE_VERSION
}
