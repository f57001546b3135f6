//! Session table operations.
//!
//! Pure in-memory transitions parameterized by `now`. Ending a session is
//! split in two: [`SessionTable::begin_end`] makes the session terminal and
//! takes it out of the active set, and [`SessionTable::archive`] files it
//! into history once its locks have been dealt with by the caller.

use super::types::{SessionRecord, SessionStatus, SessionTable};
use crate::config::AgentTypeConfig;
use crate::error::{BatonError, Result};
use chrono::{DateTime, Utc};
use uuid::Uuid;

impl SessionTable {
    /// Register a new active session.
    ///
    /// Checked in order: the global cap, the per-type instance limit, then
    /// that the holder has no other active session.
    pub fn register(
        &mut self,
        holder_id: &str,
        holder_type: &str,
        type_config: &AgentTypeConfig,
        task_id: Option<&str>,
        max_concurrent: usize,
        now: DateTime<Utc>,
    ) -> Result<SessionRecord> {
        if holder_id.trim().is_empty() {
            return Err(BatonError::InvalidArgument(
                "holder id must be non-empty".to_string(),
            ));
        }

        let active = self.active_count();
        if active >= max_concurrent {
            return Err(BatonError::CapacityExceeded {
                active,
                max: max_concurrent,
            });
        }

        let of_type = self.active_of_type(holder_type);
        let type_limit = type_config.effective_max_instances();
        if of_type >= type_limit {
            return Err(BatonError::InstanceLimitExceeded {
                agent_type: holder_type.to_string(),
                active: of_type,
                max: type_limit,
            });
        }

        if let Some(existing) = self.find_active_by_holder(holder_id) {
            return Err(BatonError::HolderBusy {
                holder: holder_id.to_string(),
                session_id: existing.session_id.clone(),
            });
        }

        let session = SessionRecord {
            session_id: Uuid::new_v4().to_string(),
            holder_id: holder_id.to_string(),
            holder_type: holder_type.to_string(),
            task_id: task_id.map(str::to_string),
            status: SessionStatus::Active,
            started_at: now,
            last_heartbeat: now,
            locks_held: Vec::new(),
            ended_at: None,
            termination_reason: None,
            released_locks: Vec::new(),
        };
        self.active
            .insert(session.session_id.clone(), session.clone());
        Ok(session)
    }

    /// Record a liveness signal for an active session.
    pub fn heartbeat(&mut self, session_id: &str, now: DateTime<Utc>) -> Result<&SessionRecord> {
        if !self.active.contains_key(session_id) {
            return Err(self.not_active(session_id));
        }
        let session = self
            .active
            .get_mut(session_id)
            .ok_or_else(|| BatonError::NotFound(format!("session {} not found", session_id)))?;
        session.last_heartbeat = now;
        Ok(session)
    }

    /// First phase of ending: mark the session terminal and remove it from
    /// the active set. Its `locks_held` is returned intact for the caller to
    /// release.
    pub fn begin_end(
        &mut self,
        session_id: &str,
        status: SessionStatus,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<SessionRecord> {
        if !status.is_terminal() {
            return Err(BatonError::InvalidArgument(
                "a session can only end as completed, failed or terminated".to_string(),
            ));
        }

        let mut session = self
            .active
            .remove(session_id)
            .ok_or_else(|| self.not_active(session_id))?;
        session.status = status;
        session.ended_at = Some(now);
        session.termination_reason = reason;
        Ok(session)
    }

    /// Second phase of ending: file the terminal session into history,
    /// dropping the oldest entries beyond `history_limit`.
    pub fn archive(&mut self, session: SessionRecord, history_limit: usize) {
        self.history.push(session);
        if self.history.len() > history_limit {
            let excess = self.history.len() - history_limit;
            self.history.drain(..excess);
        }
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn active_of_type(&self, holder_type: &str) -> usize {
        self.active
            .values()
            .filter(|s| s.holder_type == holder_type)
            .count()
    }

    pub fn find_active_by_holder(&self, holder_id: &str) -> Option<&SessionRecord> {
        self.active.values().find(|s| s.holder_id == holder_id)
    }

    pub fn find_active_by_holder_mut(&mut self, holder_id: &str) -> Option<&mut SessionRecord> {
        self.active.values_mut().find(|s| s.holder_id == holder_id)
    }

    /// Count of archived sessions with `status`.
    pub fn history_count(&self, status: SessionStatus) -> usize {
        self.history.iter().filter(|s| s.status == status).count()
    }

    /// Active sessions whose last heartbeat is older than `timeout` at `now`.
    pub fn stale_ids(&self, timeout: chrono::Duration, now: DateTime<Utc>) -> Vec<String> {
        self.active
            .values()
            .filter(|s| now - s.last_heartbeat > timeout)
            .map(|s| s.session_id.clone())
            .collect()
    }

    fn not_active(&self, session_id: &str) -> BatonError {
        match self
            .history
            .iter()
            .rev()
            .find(|s| s.session_id == session_id)
        {
            Some(ended) => BatonError::NotFound(format!(
                "session {} already ended ({})",
                session_id, ended.status
            )),
            None => BatonError::NotFound(format!("session {} not found", session_id)),
        }
    }
}
