//! Error types for baton.
//!
//! Uses thiserror for derive macros. Every variant names the blocking entity
//! (which lock, which holder, which limit) so a calling script can decide
//! whether to retry, wait, or abort.

use crate::exit_codes;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use thiserror::Error;

/// Main error type for baton operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BatonError {
    /// A non-expired lock on the resource is held by another holder.
    #[error("resource '{resource}' is locked by {holder} until {expires_at}{}", task_suffix(.task))]
    Conflict {
        resource: String,
        holder: String,
        task: Option<String>,
        expires_at: DateTime<Utc>,
    },

    /// The lock or session is already gone (or never existed).
    #[error("{0}")]
    NotFound(String),

    /// The global concurrency cap has been reached.
    #[error("capacity exceeded: {active}/{max} sessions active")]
    CapacityExceeded { active: usize, max: usize },

    /// The per-type instance limit has been reached.
    #[error("instance limit exceeded for agent type '{agent_type}': {active}/{max} active")]
    InstanceLimitExceeded {
        agent_type: String,
        active: usize,
        max: usize,
    },

    /// The holder already has an active session.
    #[error("holder {holder} already has active session {session_id}")]
    HolderBusy { holder: String, session_id: String },

    /// The lock has already used its single extension.
    #[error("lock on '{resource}' held by {holder} has already been extended")]
    AlreadyExtended { resource: String, holder: String },

    /// The external health signal blocked admission.
    #[error("admission vetoed: {0}")]
    Vetoed(String),

    /// The lease on a store file could not be obtained in time.
    #[error("timed out after {waited_ms}ms waiting for lease on '{resource}'")]
    LockTimeout { resource: String, waited_ms: u64 },

    /// Persisted state is malformed and could not be recovered.
    #[error("corrupted state: {0}")]
    Corruption(String),

    /// Bad arguments or configuration.
    #[error("{0}")]
    InvalidArgument(String),

    /// Filesystem failure in the coordination substrate.
    #[error("I/O failure: {0}")]
    Io(String),
}

fn task_suffix(task: &Option<String>) -> String {
    match task {
        Some(task) => format!(" (task {})", task),
        None => String::new(),
    }
}

impl BatonError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            BatonError::Conflict { .. }
            | BatonError::NotFound(_)
            | BatonError::CapacityExceeded { .. }
            | BatonError::InstanceLimitExceeded { .. }
            | BatonError::HolderBusy { .. }
            | BatonError::AlreadyExtended { .. }
            | BatonError::Vetoed(_) => exit_codes::OPERATION_FAILURE,
            BatonError::InvalidArgument(_) => exit_codes::USAGE_ERROR,
            BatonError::LockTimeout { .. } | BatonError::Corruption(_) | BatonError::Io(_) => {
                exit_codes::STORE_FAILURE
            }
        }
    }

    /// Stable machine-readable identifier for this error.
    pub fn kind(&self) -> &'static str {
        match self {
            BatonError::Conflict { .. } => "conflict",
            BatonError::NotFound(_) => "not_found",
            BatonError::CapacityExceeded { .. } => "capacity_exceeded",
            BatonError::InstanceLimitExceeded { .. } => "instance_limit_exceeded",
            BatonError::HolderBusy { .. } => "holder_busy",
            BatonError::AlreadyExtended { .. } => "already_extended",
            BatonError::Vetoed(_) => "vetoed",
            BatonError::LockTimeout { .. } => "lock_timeout",
            BatonError::Corruption(_) => "corruption",
            BatonError::InvalidArgument(_) => "invalid_argument",
            BatonError::Io(_) => "io",
        }
    }

    /// Structured details of the blocking entity, if any.
    pub fn details(&self) -> Value {
        match self {
            BatonError::Conflict {
                resource,
                holder,
                task,
                expires_at,
            } => json!({
                "resource": resource,
                "holder": holder,
                "task_id": task,
                "expires_at": expires_at,
            }),
            BatonError::CapacityExceeded { active, max } => json!({
                "active_sessions": active,
                "max_concurrent": max,
                "capacity_remaining": max.saturating_sub(*active),
            }),
            BatonError::InstanceLimitExceeded {
                agent_type,
                active,
                max,
            } => json!({
                "agent_type": agent_type,
                "active_instances": active,
                "max_instances": max,
            }),
            BatonError::HolderBusy { holder, session_id } => json!({
                "holder": holder,
                "session_id": session_id,
            }),
            BatonError::AlreadyExtended { resource, holder } => json!({
                "resource": resource,
                "holder": holder,
            }),
            BatonError::LockTimeout {
                resource,
                waited_ms,
            } => json!({
                "resource": resource,
                "waited_ms": waited_ms,
            }),
            _ => Value::Null,
        }
    }

    /// Whether this error means the coordination substrate is broken rather
    /// than the request being denied.
    pub fn is_infrastructure(&self) -> bool {
        self.exit_code() == exit_codes::STORE_FAILURE
    }
}

impl From<std::io::Error> for BatonError {
    fn from(err: std::io::Error) -> Self {
        BatonError::Io(err.to_string())
    }
}

/// Result type alias for baton operations.
pub type Result<T> = std::result::Result<T, BatonError>;
