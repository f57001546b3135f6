//! Progress document model.

use crate::error::{BatonError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_IN_PROGRESS: &str = "in_progress";
pub const STATUS_COMPLETED: &str = "completed";

/// One stage's shared progress.
///
/// `checkpoint`, `started_at`, `updated_at` and `phases` are required when
/// reading; a document missing any of them is malformed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressDocument {
    pub checkpoint: u64,

    #[serde(default)]
    pub current_phase: Option<String>,

    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub phases: BTreeMap<String, PhaseState>,

    #[serde(default)]
    pub validation: ValidationState,
}

/// State of one named phase. Fields other than the status and its
/// timestamps are free-form and preserved as written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseState {
    #[serde(default = "default_status")]
    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Default for PhaseState {
    fn default() -> Self {
        Self {
            status: default_status(),
            started_at: None,
            completed_at: None,
            fields: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationState {
    #[serde(default = "default_status")]
    pub status: String,

    #[serde(default)]
    pub issues: Vec<Value>,
}

impl Default for ValidationState {
    fn default() -> Self {
        Self {
            status: default_status(),
            issues: Vec::new(),
        }
    }
}

fn default_status() -> String {
    STATUS_PENDING.to_string()
}

impl ProgressDocument {
    /// The template written on a stage's first access.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            checkpoint: 0,
            current_phase: None,
            started_at: now,
            updated_at: now,
            phases: BTreeMap::new(),
            validation: ValidationState::default(),
        }
    }

    /// Merge `fields` into phase `name`, creating it if needed.
    ///
    /// `status`, `started_at` and `completed_at` map onto the typed fields;
    /// everything else is stored as given. Moving to `in_progress` stamps
    /// `started_at` and moving to `completed` stamps `completed_at`, unless
    /// already set.
    pub fn update_phase(
        &mut self,
        name: &str,
        fields: Map<String, Value>,
        now: DateTime<Utc>,
    ) -> Result<&PhaseState> {
        if name.trim().is_empty() {
            return Err(BatonError::InvalidArgument(
                "phase name must be non-empty".to_string(),
            ));
        }

        let phase = self.phases.entry(name.to_string()).or_default();
        for (key, value) in fields {
            match key.as_str() {
                "status" => {
                    phase.status = match value {
                        Value::String(s) => s,
                        other => other.to_string(),
                    }
                }
                "started_at" => phase.started_at = Some(parse_timestamp(&key, value)?),
                "completed_at" => phase.completed_at = Some(parse_timestamp(&key, value)?),
                _ => {
                    phase.fields.insert(key, value);
                }
            }
        }

        match phase.status.as_str() {
            STATUS_IN_PROGRESS => {
                phase.started_at.get_or_insert(now);
            }
            STATUS_COMPLETED => {
                phase.completed_at.get_or_insert(now);
            }
            _ => {}
        }

        Ok(phase)
    }
}

fn parse_timestamp(key: &str, value: Value) -> Result<DateTime<Utc>> {
    serde_json::from_value(value).map_err(|e| {
        BatonError::InvalidArgument(format!("'{}' must be an RFC3339 timestamp: {}", key, e))
    })
}
