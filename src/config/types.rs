//! Configuration types and defaults for baton.
//!
//! This module defines the agent-type table, enums, and the default value
//! functions used by the Config struct.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Relative compute cost of an agent type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ComputeTier {
    Light,
    #[default]
    Standard,
    Heavy,
}

/// Admission limits for one agent type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentTypeConfig {
    /// Free-form grouping (e.g. "generation", "validation").
    #[serde(default = "default_category")]
    pub category: String,

    #[serde(default)]
    pub compute_tier: ComputeTier,

    /// Maximum concurrently active sessions of this type.
    #[serde(default = "default_max_instances")]
    pub max_instances: u32,

    /// Resource keys every instance of this type must hold exclusively.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclusive_resources: Vec<String>,

    /// Whether more than one instance may run at a time.
    #[serde(default = "default_true")]
    pub parallelizable: bool,
}

impl AgentTypeConfig {
    fn new(
        category: &str,
        compute_tier: ComputeTier,
        max_instances: u32,
        exclusive_resources: &[&str],
        parallelizable: bool,
    ) -> Self {
        Self {
            category: category.to_string(),
            compute_tier,
            max_instances,
            exclusive_resources: exclusive_resources.iter().map(|s| s.to_string()).collect(),
            parallelizable,
        }
    }

    /// The instance limit actually enforced: 1 for non-parallelizable types.
    pub fn effective_max_instances(&self) -> usize {
        if self.parallelizable {
            self.max_instances as usize
        } else {
            1
        }
    }
}

/// Built-in agent-type table for a documentation pipeline.
pub fn default_agent_types() -> BTreeMap<String, AgentTypeConfig> {
    let mut types = BTreeMap::new();
    types.insert(
        "orchestrator".to_string(),
        AgentTypeConfig::new("coordination", ComputeTier::Light, 1, &[], false),
    );
    types.insert(
        "planner".to_string(),
        AgentTypeConfig::new("planning", ComputeTier::Standard, 2, &[], true),
    );
    types.insert(
        "module-writer".to_string(),
        AgentTypeConfig::new("generation", ComputeTier::Heavy, 8, &[], true),
    );
    types.insert(
        "index-builder".to_string(),
        AgentTypeConfig::new(
            "generation",
            ComputeTier::Standard,
            1,
            &["module-index.md"],
            false,
        ),
    );
    types.insert(
        "validator".to_string(),
        AgentTypeConfig::new("validation", ComputeTier::Light, 4, &[], true),
    );
    types.insert(
        "reviewer".to_string(),
        AgentTypeConfig::new("validation", ComputeTier::Standard, 2, &[], true),
    );
    types
}

// Default value functions for serde
pub(crate) fn default_max_concurrent() -> u32 {
    12
}
pub(crate) fn default_lock_lease_minutes() -> u32 {
    15
}
pub(crate) fn default_heartbeat_timeout_seconds() -> u32 {
    60
}
pub(crate) fn default_progress_lock_timeout_seconds() -> u32 {
    30
}
pub(crate) fn default_store_lock_timeout_seconds() -> u32 {
    10
}
pub(crate) fn default_warning_threshold_percent() -> u32 {
    90
}
pub(crate) fn default_session_history_limit() -> u32 {
    500
}
pub(crate) fn default_health_signal_file() -> String {
    "health.json".to_string()
}
fn default_category() -> String {
    "general".to_string()
}
fn default_max_instances() -> u32 {
    1
}
fn default_true() -> bool {
    true
}
