//! External health and veto signal.
//!
//! The signal is owned by a separate health monitor; baton only reads it.
//! The production source is a JSON file:
//!
//! ```json
//! {
//!   "veto": {"active": true, "reason": "release freeze"},
//!   "violations": [
//!     {"id": "V-12", "severity": "critical", "resolved": false, "message": "index drift"}
//!   ]
//! }
//! ```
//!
//! A missing file means healthy. A file that cannot be parsed is treated as
//! corruption rather than silently ignored.

use crate::error::{BatonError, Result};
use crate::fs::read_if_exists;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Source of the external admission veto.
pub trait HealthSignal {
    fn check(&self) -> Result<HealthReport>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// An operator- or monitor-issued stop on all new spawns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Veto {
    #[serde(default = "default_active")]
    pub active: bool,

    #[serde(default)]
    pub reason: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_at: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub id: String,
    pub severity: Severity,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default)]
    pub message: String,
}

/// Snapshot of the external health signal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    #[serde(default)]
    pub veto: Option<Veto>,

    #[serde(default)]
    pub violations: Vec<Violation>,
}

impl HealthReport {
    /// Why admission must be blocked, or `None` when it may proceed.
    pub fn blocking_reason(&self) -> Option<String> {
        if let Some(veto) = &self.veto
            && veto.active
        {
            let reason = if veto.reason.is_empty() {
                "no reason given"
            } else {
                veto.reason.as_str()
            };
            return Some(match &veto.set_by {
                Some(by) => format!("active veto by {}: {}", by, reason),
                None => format!("active veto: {}", reason),
            });
        }

        let critical: Vec<&str> = self
            .violations
            .iter()
            .filter(|v| v.severity == Severity::Critical && !v.resolved)
            .map(|v| v.id.as_str())
            .collect();
        if !critical.is_empty() {
            return Some(format!(
                "{} unresolved critical violation(s): {}",
                critical.len(),
                critical.join(", ")
            ));
        }

        None
    }
}

/// A fixed report is its own signal.
impl HealthSignal for HealthReport {
    fn check(&self) -> Result<HealthReport> {
        Ok(self.clone())
    }
}

/// Reads the signal from a JSON file on every check.
#[derive(Debug, Clone)]
pub struct FileHealthSignal {
    path: PathBuf,
}

impl FileHealthSignal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl HealthSignal for FileHealthSignal {
    fn check(&self) -> Result<HealthReport> {
        let Some(bytes) = read_if_exists(&self.path)? else {
            return Ok(HealthReport::default());
        };

        serde_json::from_slice(&bytes).map_err(|e| {
            BatonError::Corruption(format!(
                "failed to parse health signal '{}': {}",
                self.path.display(),
                e
            ))
        })
    }
}
