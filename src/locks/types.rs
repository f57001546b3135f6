//! Lock record and lock table definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A lock may be extended exactly once.
pub const MAX_EXTENSIONS: u32 = 1;

/// Current on-disk format version of `locks.json`.
pub const LOCK_TABLE_VERSION: u32 = 1;

/// An exclusive, time-bounded grant on one resource key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// Unique for the lifetime of the store; never reused.
    pub lock_id: String,

    #[serde(rename = "agent_id")]
    pub holder_id: String,

    pub task_id: Option<String>,

    #[serde(rename = "file_path")]
    pub resource_key: String,

    pub acquired_at: DateTime<Utc>,

    pub expires_at: DateTime<Utc>,

    #[serde(rename = "extensions", default)]
    pub extension_count: u32,
}

impl LockRecord {
    /// Whether the lease has run out at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whether the single extension is still available.
    pub fn can_extend(&self) -> bool {
        self.extension_count < MAX_EXTENSIONS
    }

    /// Seconds of lease left at `now` (zero once expired).
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }
}

/// Durable table of resource locks, keyed by resource key.
///
/// Expired records may remain physically present until reclaimed; every
/// read path treats them as absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockTable {
    #[serde(default = "lock_table_version")]
    pub version: u32,

    #[serde(default)]
    pub locks: BTreeMap<String, LockRecord>,
}

impl Default for LockTable {
    fn default() -> Self {
        Self {
            version: LOCK_TABLE_VERSION,
            locks: BTreeMap::new(),
        }
    }
}

fn lock_table_version() -> u32 {
    LOCK_TABLE_VERSION
}

/// Outcome of a successful acquisition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Acquisition {
    pub lock: LockRecord,
    /// The expired lock removed to make room, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reclaimed: Option<LockRecord>,
    /// The holder already held this key; the existing lock was returned.
    pub reentrant: bool,
}
