//! Config struct definition and default implementation.

use super::types::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Configuration for a coordination domain.
///
/// This struct represents the contents of `<state>/config.yaml`.
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Capacity settings
    // =========================================================================
    /// Hard cap on concurrently active sessions.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: u32,

    /// Percentage of capacity at which status reports WARNING.
    #[serde(default = "default_warning_threshold_percent")]
    pub warning_threshold_percent: u32,

    /// Number of terminal sessions retained in the history list.
    #[serde(default = "default_session_history_limit")]
    pub session_history_limit: u32,

    // =========================================================================
    // Lease settings
    // =========================================================================
    /// Lifetime of a resource lock from acquisition (or its one extension).
    #[serde(default = "default_lock_lease_minutes")]
    pub lock_lease_minutes: u32,

    /// Seconds without a heartbeat after which a session is terminated.
    #[serde(default = "default_heartbeat_timeout_seconds")]
    pub heartbeat_timeout_seconds: u32,

    /// Maximum wait for the lease on a stage progress document.
    #[serde(default = "default_progress_lock_timeout_seconds")]
    pub progress_lock_timeout_seconds: u32,

    /// Maximum wait for the lease on the lock/session tables.
    #[serde(default = "default_store_lock_timeout_seconds")]
    pub store_lock_timeout_seconds: u32,

    // =========================================================================
    // Admission settings
    // =========================================================================
    /// Health/veto signal file, relative to the state directory unless absolute.
    #[serde(default = "default_health_signal_file")]
    pub health_signal_file: String,

    /// Per-type admission limits.
    #[serde(default = "default_agent_types")]
    pub agent_types: BTreeMap<String, AgentTypeConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            warning_threshold_percent: default_warning_threshold_percent(),
            session_history_limit: default_session_history_limit(),
            lock_lease_minutes: default_lock_lease_minutes(),
            heartbeat_timeout_seconds: default_heartbeat_timeout_seconds(),
            progress_lock_timeout_seconds: default_progress_lock_timeout_seconds(),
            store_lock_timeout_seconds: default_store_lock_timeout_seconds(),
            health_signal_file: default_health_signal_file(),
            agent_types: default_agent_types(),
        }
    }
}
