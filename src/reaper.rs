//! Stale reclamation.
//!
//! A sweep removes every expired lock and terminates every active session
//! that has missed its heartbeat deadline, releasing that session's locks.
//! Sweeps are idempotent: run twice with no intervening mutation, the second
//! run reclaims nothing. Because a sweep runs inside a store transaction,
//! concurrent sweeps serialize and never double-count.

use crate::config::Config;
use crate::context::CoordinationContext;
use crate::error::Result;
use crate::events::{self, Event, EventAction};
use crate::sessions::SessionStatus;
use crate::store::{CoordinationStore, Tables};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::info;

/// What a sweep reclaimed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub locks_reclaimed: usize,
    pub sessions_terminated: usize,
    /// One human-readable line per reclaimed lock or terminated session.
    pub details: Vec<String>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.locks_reclaimed == 0 && self.sessions_terminated == 0
    }
}

/// Standalone sweep entry point.
pub struct Reaper<'a> {
    store: &'a CoordinationStore,
    config: &'a Config,
}

impl<'a> Reaper<'a> {
    pub fn new(store: &'a CoordinationStore, config: &'a Config) -> Self {
        Self { store, config }
    }

    pub fn sweep(&self) -> Result<SweepReport> {
        let report = self
            .store
            .transact(|tables| Ok(sweep_tables(tables, self.config, Utc::now())))?;
        record_sweep(self.store.context(), &report);
        Ok(report)
    }
}

/// Sweep `tables` in place at `now`.
pub fn sweep_tables(tables: &mut Tables, config: &Config, now: DateTime<Utc>) -> SweepReport {
    let mut report = SweepReport::default();

    for lock in tables.reclaim_expired_locks(now) {
        report.locks_reclaimed += 1;
        report.details.push(format!(
            "reclaimed expired lock on '{}' held by {} (expired {})",
            lock.resource_key,
            lock.holder_id,
            lock.expires_at.to_rfc3339()
        ));
    }

    let timeout = config.heartbeat_timeout();
    let history_limit = config.session_history_limit as usize;
    for session_id in tables.sessions.stale_ids(timeout, now) {
        let silence = tables
            .sessions
            .active
            .get(&session_id)
            .map(|s| s.silence_seconds(now))
            .unwrap_or_default();
        let reason = format!(
            "no heartbeat for {}s (timeout {}s)",
            silence,
            timeout.num_seconds()
        );

        // Ids come from the active set, so ending them cannot miss.
        if let Ok(ended) = tables.end_session(
            &session_id,
            SessionStatus::Terminated,
            Some(reason.clone()),
            history_limit,
            now,
        ) {
            report.sessions_terminated += 1;
            report.details.push(format!(
                "terminated session {} ({}): {}; released {} lock(s)",
                session_id,
                ended.session.holder_id,
                reason,
                ended.released.len()
            ));
        }
    }

    if !report.is_empty() {
        info!(
            locks = report.locks_reclaimed,
            sessions = report.sessions_terminated,
            "stale state reclaimed"
        );
    }
    report
}

/// Audit a sweep that actually did something.
pub fn record_sweep(ctx: &CoordinationContext, report: &SweepReport) {
    if report.is_empty() {
        return;
    }
    events::record(
        ctx,
        Event::new(EventAction::Sweep).with_details(json!({
            "locks_reclaimed": report.locks_reclaimed,
            "sessions_terminated": report.sessions_terminated,
            "details": report.details,
        })),
    );
}
