//! Operations that span both tables.
//!
//! A session's `locks_held` must only ever name live locks of the same
//! holder, so every path that creates or removes a lock also updates the
//! owning session here.

use crate::error::Result;
use crate::locks::{Acquisition, LockRecord, LockTable};
use crate::sessions::{SessionRecord, SessionStatus, SessionTable};
use chrono::{DateTime, Duration, Utc};
use tracing::warn;

/// In-memory view of both tables for the duration of one transaction.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    pub locks: LockTable,
    pub sessions: SessionTable,
}

/// Result of ending a session.
#[derive(Debug, Clone)]
pub struct EndedSession {
    pub session: SessionRecord,
    /// Ids of the locks actually released by the cascade.
    pub released: Vec<String>,
}

impl Tables {
    /// Acquire a lock and record it on the holder's active session, if any.
    /// A re-entrant acquisition adopts the existing lock into that session.
    pub fn acquire_lock(
        &mut self,
        resource_key: &str,
        holder_id: &str,
        task_id: Option<&str>,
        lease: Duration,
        now: DateTime<Utc>,
    ) -> Result<Acquisition> {
        let acquisition = self
            .locks
            .acquire(resource_key, holder_id, task_id, lease, now)?;

        if let Some(reclaimed) = &acquisition.reclaimed {
            self.detach_lock(reclaimed);
        }
        if let Some(session) = self.sessions.find_active_by_holder_mut(holder_id)
            && !session.locks_held.contains(&acquisition.lock.lock_id)
        {
            session.locks_held.push(acquisition.lock.lock_id.clone());
        }

        Ok(acquisition)
    }

    /// Release a lock and drop it from the holder's session.
    pub fn release_lock(&mut self, resource_key: &str, holder_id: &str) -> Result<LockRecord> {
        let lock = self.locks.release(resource_key, holder_id)?;
        self.detach_lock(&lock);
        Ok(lock)
    }

    /// Remove every expired lock, keeping sessions consistent.
    pub fn reclaim_expired_locks(&mut self, now: DateTime<Utc>) -> Vec<LockRecord> {
        let reclaimed = self.locks.reclaim_expired(now);
        for lock in &reclaimed {
            self.detach_lock(lock);
        }
        reclaimed
    }

    /// End an active session and release the locks it holds.
    ///
    /// The session is made terminal first; each lock release afterwards is
    /// best effort. A lock that has already disappeared (reclaimed, or
    /// released directly) is logged and skipped, so the session always ends
    /// owning no locks.
    pub fn end_session(
        &mut self,
        session_id: &str,
        status: SessionStatus,
        reason: Option<String>,
        history_limit: usize,
        now: DateTime<Utc>,
    ) -> Result<EndedSession> {
        let mut session = self.sessions.begin_end(session_id, status, reason, now)?;

        let mut released = Vec::new();
        for lock_id in std::mem::take(&mut session.locks_held) {
            match self.locks.remove_by_id(&lock_id, &session.holder_id) {
                Some(lock) => released.push(lock.lock_id),
                None => warn!(
                    session = %session.session_id,
                    lock_id = %lock_id,
                    "lock no longer held by session; skipping release"
                ),
            }
        }

        session.released_locks = released.clone();
        self.sessions.archive(session.clone(), history_limit);
        Ok(EndedSession { session, released })
    }

    fn detach_lock(&mut self, lock: &LockRecord) {
        for session in self
            .sessions
            .active
            .values_mut()
            .filter(|s| s.holder_id == lock.holder_id)
        {
            session.locks_held.retain(|id| id != &lock.lock_id);
        }
    }
}
