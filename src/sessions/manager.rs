//! Session registration, heartbeat, and end-of-life against the store.

use super::status::StatusReport;
use super::types::{SessionRecord, SessionStatus};
use crate::config::Config;
use crate::error::{BatonError, Result};
use crate::events::{self, Event, EventAction};
use crate::reaper::{self, SweepReport};
use crate::store::{CoordinationStore, EndedSession};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::info;

/// Outcome of ending a session, including the hygiene sweep that followed.
#[derive(Debug, Clone, Serialize)]
pub struct EndReport {
    pub session: SessionRecord,
    pub released_lock_ids: Vec<String>,
    pub sweep: SweepReport,
}

/// Session operations. Each call is one store transaction.
pub struct SessionManager<'a> {
    store: &'a CoordinationStore,
    config: &'a Config,
}

impl<'a> SessionManager<'a> {
    pub fn new(store: &'a CoordinationStore, config: &'a Config) -> Self {
        Self { store, config }
    }

    /// Register an active session for `holder_id` of type `holder_type`.
    pub fn register(
        &self,
        holder_id: &str,
        task_id: Option<&str>,
        holder_type: &str,
    ) -> Result<SessionRecord> {
        let type_config = self.config.agent_type(holder_type)?;
        let max_concurrent = self.config.max_concurrent as usize;

        let session = self.store.transact(|tables| {
            tables.sessions.register(
                holder_id,
                holder_type,
                type_config,
                task_id,
                max_concurrent,
                Utc::now(),
            )
        })?;

        info!(session = %session.session_id, holder = %holder_id, agent_type = %holder_type, "session registered");
        events::record(
            self.store.context(),
            Event::new(EventAction::SessionRegister)
                .with_agent(holder_id)
                .with_details(json!({
                    "session_id": session.session_id,
                    "agent_type": holder_type,
                    "task_id": task_id,
                })),
        );
        Ok(session)
    }

    /// Bump the session's `last_heartbeat`.
    pub fn heartbeat(&self, session_id: &str) -> Result<SessionRecord> {
        self.store.transact(|tables| {
            tables
                .sessions
                .heartbeat(session_id, Utc::now())
                .cloned()
        })
    }

    /// End an active session as `completed` or `failed`, releasing its locks,
    /// then sweep stale state in the same transaction.
    pub fn end(&self, session_id: &str, status: SessionStatus) -> Result<EndReport> {
        if !matches!(status, SessionStatus::Completed | SessionStatus::Failed) {
            return Err(BatonError::InvalidArgument(format!(
                "sessions can only be ended as completed or failed (got {})",
                status
            )));
        }

        let history_limit = self.config.session_history_limit as usize;
        let (ended, sweep): (EndedSession, SweepReport) = self.store.transact(|tables| {
            let now = Utc::now();
            let ended = tables.end_session(session_id, status, None, history_limit, now)?;
            let sweep = reaper::sweep_tables(tables, self.config, now);
            Ok((ended, sweep))
        })?;

        info!(
            session = %session_id,
            %status,
            released = ended.released.len(),
            "session ended"
        );
        events::record(
            self.store.context(),
            Event::new(EventAction::SessionEnd)
                .with_agent(ended.session.holder_id.clone())
                .with_details(json!({
                    "session_id": session_id,
                    "status": status,
                    "released_lock_ids": ended.released,
                })),
        );
        reaper::record_sweep(self.store.context(), &sweep);

        Ok(EndReport {
            session: ended.session,
            released_lock_ids: ended.released,
            sweep,
        })
    }

    /// Snapshot of capacity, locks, and session counts.
    pub fn status(&self) -> Result<StatusReport> {
        self.store
            .read(|tables| Ok(StatusReport::compute(tables, self.config, Utc::now())))
    }
}
