//! Lock operations against the coordination store.

use super::types::{Acquisition, LockRecord};
use crate::config::Config;
use crate::error::Result;
use crate::events::{self, Event, EventAction};
use crate::store::CoordinationStore;
use chrono::Utc;
use serde_json::json;
use tracing::info;

/// Lock operations. Each call is one store transaction, so the conflict check
/// and the write it guards cannot interleave with another process.
pub struct LockManager<'a> {
    store: &'a CoordinationStore,
    config: &'a Config,
}

impl<'a> LockManager<'a> {
    pub fn new(store: &'a CoordinationStore, config: &'a Config) -> Self {
        Self { store, config }
    }

    /// Acquire `resource_key` for `holder_id` with a full lease.
    ///
    /// # Returns
    ///
    /// * `Ok(Acquisition)` - The new (or already held) lock
    /// * `Err(BatonError::Conflict)` - Another holder has a live lock; the
    ///   error names it
    pub fn acquire(
        &self,
        resource_key: &str,
        holder_id: &str,
        task_id: Option<&str>,
    ) -> Result<Acquisition> {
        let lease = self.config.lock_lease();
        let acquisition = self.store.transact(|tables| {
            tables.acquire_lock(resource_key, holder_id, task_id, lease, Utc::now())
        })?;

        if !acquisition.reentrant {
            info!(resource = %resource_key, holder = %holder_id, "lock acquired");
            events::record(
                self.store.context(),
                Event::new(EventAction::LockAcquire)
                    .with_agent(holder_id)
                    .with_details(json!({
                        "lock_id": acquisition.lock.lock_id,
                        "file_path": resource_key,
                        "task_id": task_id,
                        "reclaimed_from": acquisition.reclaimed.as_ref().map(|l| &l.holder_id),
                    })),
            );
        }
        Ok(acquisition)
    }

    /// Release `resource_key` if `holder_id` holds it; `NotFound` otherwise.
    pub fn release(&self, resource_key: &str, holder_id: &str) -> Result<LockRecord> {
        let lock = self
            .store
            .transact(|tables| tables.release_lock(resource_key, holder_id))?;

        info!(resource = %resource_key, holder = %holder_id, "lock released");
        events::record(
            self.store.context(),
            Event::new(EventAction::LockRelease)
                .with_agent(holder_id)
                .with_details(json!({
                    "lock_id": lock.lock_id,
                    "file_path": resource_key,
                })),
        );
        Ok(lock)
    }

    /// Use the lock's single extension.
    pub fn extend(&self, resource_key: &str, holder_id: &str) -> Result<LockRecord> {
        let lease = self.config.lock_lease();
        let lock = self
            .store
            .transact(|tables| tables.locks.extend(resource_key, holder_id, lease, Utc::now()))?;

        info!(resource = %resource_key, holder = %holder_id, expires_at = %lock.expires_at, "lock extended");
        events::record(
            self.store.context(),
            Event::new(EventAction::LockExtend)
                .with_agent(holder_id)
                .with_details(json!({
                    "lock_id": lock.lock_id,
                    "file_path": resource_key,
                    "expires_at": lock.expires_at,
                })),
        );
        Ok(lock)
    }

    /// The live lock on `resource_key`, if any. Never mutates the store.
    pub fn inspect(&self, resource_key: &str) -> Result<Option<LockRecord>> {
        self.store
            .read(|tables| Ok(tables.locks.inspect(resource_key, Utc::now()).cloned()))
    }

    /// Remove and return every expired lock.
    pub fn reclaim_expired(&self) -> Result<Vec<LockRecord>> {
        self.store
            .transact(|tables| Ok(tables.reclaim_expired_locks(Utc::now())))
    }
}
