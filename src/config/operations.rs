//! Config loading, validation, and accessors.

use super::model::Config;
use super::types::AgentTypeConfig;
use crate::error::{BatonError, Result};
use std::path::Path;
use std::time::Duration;

impl Config {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            BatonError::InvalidArgument(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Load config from a YAML file, falling back to defaults when the file
    /// does not exist. A present but malformed file is still an error.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse config from a YAML string.
    ///
    /// An empty document yields the defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(yaml).map_err(|e| {
            BatonError::InvalidArgument(format!("failed to parse config YAML: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| {
            BatonError::InvalidArgument(format!("failed to serialize config to YAML: {}", e))
        })
    }

    /// Validate config values and return error on invalid values.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("max_concurrent", self.max_concurrent),
            ("lock_lease_minutes", self.lock_lease_minutes),
            ("heartbeat_timeout_seconds", self.heartbeat_timeout_seconds),
            (
                "progress_lock_timeout_seconds",
                self.progress_lock_timeout_seconds,
            ),
            ("store_lock_timeout_seconds", self.store_lock_timeout_seconds),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(invalid(format!("{} must be greater than 0", name)));
            }
        }

        if !(1..=100).contains(&self.warning_threshold_percent) {
            return Err(invalid(format!(
                "warning_threshold_percent must be between 1 and 100 (found {})",
                self.warning_threshold_percent
            )));
        }

        for (name, agent_type) in &self.agent_types {
            if name.trim().is_empty() {
                return Err(invalid("agent_types keys must be non-empty".to_string()));
            }
            if agent_type.max_instances == 0 {
                return Err(invalid(format!(
                    "agent type '{}' must allow at least one instance",
                    name
                )));
            }
            if agent_type
                .exclusive_resources
                .iter()
                .any(|r| r.trim().is_empty())
            {
                return Err(invalid(format!(
                    "agent type '{}' has an empty exclusive resource key",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Look up an agent type's limits.
    pub fn agent_type(&self, name: &str) -> Result<&AgentTypeConfig> {
        self.agent_types.get(name).ok_or_else(|| {
            let known: Vec<&str> = self.agent_types.keys().map(String::as_str).collect();
            BatonError::InvalidArgument(format!(
                "unknown agent type '{}' (configured: {})",
                name,
                known.join(", ")
            ))
        })
    }

    /// Lifetime of a resource lock.
    pub fn lock_lease(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.lock_lease_minutes))
    }

    /// Heartbeat deadline for active sessions.
    pub fn heartbeat_timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::from(self.heartbeat_timeout_seconds))
    }

    pub fn progress_lock_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.progress_lock_timeout_seconds))
    }

    pub fn store_lock_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.store_lock_timeout_seconds))
    }
}

fn invalid(message: String) -> BatonError {
    BatonError::InvalidArgument(format!("config validation failed: {}", message))
}
