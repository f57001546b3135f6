//! Coordination status snapshot.

use super::types::SessionStatus;
use crate::config::Config;
use crate::store::Tables;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Capacity health of the coordination domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Health {
    Healthy,
    /// At or above the warning threshold of capacity.
    Warning,
    /// At capacity; no new session can register.
    Critical,
}

impl Health {
    /// Classify `active` sessions against `max` with a percentage threshold.
    pub fn classify(active: usize, max: usize, warning_percent: u32) -> Self {
        if active >= max {
            Health::Critical
        } else if active * 100 >= max * warning_percent as usize {
            Health::Warning
        } else {
            Health::Healthy
        }
    }
}

impl std::fmt::Display for Health {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Health::Healthy => "HEALTHY",
            Health::Warning => "WARNING",
            Health::Critical => "CRITICAL",
        })
    }
}

/// Point-in-time summary of locks and sessions.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// Lock records physically stored, expired or not.
    pub total_locks: usize,
    pub active_locks: usize,
    /// Holder id → resource keys of its live locks.
    pub locks_by_holder: BTreeMap<String, Vec<String>>,
    pub active_sessions: usize,
    pub sessions_by_type: BTreeMap<String, usize>,
    pub completed_sessions: usize,
    pub failed_sessions: usize,
    pub terminated_sessions: usize,
    pub max_concurrent: usize,
    pub capacity_remaining: usize,
    pub health: Health,
}

impl StatusReport {
    pub fn compute(tables: &Tables, config: &Config, now: DateTime<Utc>) -> Self {
        let mut locks_by_holder: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut active_locks = 0;
        for lock in tables.locks.active(now) {
            active_locks += 1;
            locks_by_holder
                .entry(lock.holder_id.clone())
                .or_default()
                .push(lock.resource_key.clone());
        }

        let mut sessions_by_type: BTreeMap<String, usize> = BTreeMap::new();
        for session in tables.sessions.active.values() {
            *sessions_by_type
                .entry(session.holder_type.clone())
                .or_default() += 1;
        }

        let active_sessions = tables.sessions.active_count();
        let max_concurrent = config.max_concurrent as usize;

        Self {
            total_locks: tables.locks.locks.len(),
            active_locks,
            locks_by_holder,
            active_sessions,
            sessions_by_type,
            completed_sessions: tables.sessions.history_count(SessionStatus::Completed),
            failed_sessions: tables.sessions.history_count(SessionStatus::Failed),
            terminated_sessions: tables.sessions.history_count(SessionStatus::Terminated),
            max_concurrent,
            capacity_remaining: max_concurrent.saturating_sub(active_sessions),
            health: Health::classify(
                active_sessions,
                max_concurrent,
                config.warning_threshold_percent,
            ),
        }
    }
}
