//! Lock table operations.
//!
//! These are pure in-memory transitions parameterized by `now`; the caller
//! is responsible for running them inside a store transaction so that the
//! check and the write are one atomic step across processes.

use super::types::{Acquisition, LockRecord, LockTable};
use crate::error::{BatonError, Result};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

impl LockTable {
    /// Acquire `resource_key` for `holder_id`.
    ///
    /// An expired lock on the key is reclaimed first. A live lock held by the
    /// same holder is returned unchanged; one held by anyone else is a
    /// `Conflict` naming that holder.
    pub fn acquire(
        &mut self,
        resource_key: &str,
        holder_id: &str,
        task_id: Option<&str>,
        lease: Duration,
        now: DateTime<Utc>,
    ) -> Result<Acquisition> {
        validate_key(resource_key)?;
        validate_holder(holder_id)?;

        let mut reclaimed = None;
        if let Some(existing) = self.locks.get(resource_key) {
            if existing.is_expired(now) {
                reclaimed = self.locks.remove(resource_key);
            } else if existing.holder_id == holder_id {
                return Ok(Acquisition {
                    lock: existing.clone(),
                    reclaimed: None,
                    reentrant: true,
                });
            } else {
                return Err(conflict(existing));
            }
        }

        let lock = LockRecord {
            lock_id: Uuid::new_v4().to_string(),
            holder_id: holder_id.to_string(),
            task_id: task_id.map(str::to_string),
            resource_key: resource_key.to_string(),
            acquired_at: now,
            expires_at: now + lease,
            extension_count: 0,
        };
        self.locks.insert(resource_key.to_string(), lock.clone());

        Ok(Acquisition {
            lock,
            reclaimed,
            reentrant: false,
        })
    }

    /// Release `resource_key` if `holder_id` holds it.
    ///
    /// Anything else (no lock, or another holder's lock) is `NotFound`:
    /// there is nothing for this holder to release.
    pub fn release(&mut self, resource_key: &str, holder_id: &str) -> Result<LockRecord> {
        match self.locks.get(resource_key) {
            Some(lock) if lock.holder_id == holder_id => self
                .locks
                .remove(resource_key)
                .ok_or_else(|| not_held(resource_key, holder_id)),
            _ => Err(not_held(resource_key, holder_id)),
        }
    }

    /// Use the lock's single extension: the lease restarts from `now`.
    pub fn extend(
        &mut self,
        resource_key: &str,
        holder_id: &str,
        lease: Duration,
        now: DateTime<Utc>,
    ) -> Result<LockRecord> {
        let lock = match self.locks.get_mut(resource_key) {
            Some(lock) if lock.holder_id == holder_id && !lock.is_expired(now) => lock,
            _ => return Err(not_held(resource_key, holder_id)),
        };

        if !lock.can_extend() {
            return Err(BatonError::AlreadyExtended {
                resource: resource_key.to_string(),
                holder: holder_id.to_string(),
            });
        }

        lock.extension_count += 1;
        lock.expires_at = now + lease;
        Ok(lock.clone())
    }

    /// The live lock on `resource_key`, if any. Expired records read as absent
    /// but are left in place.
    pub fn inspect(&self, resource_key: &str, now: DateTime<Utc>) -> Option<&LockRecord> {
        self.locks
            .get(resource_key)
            .filter(|lock| !lock.is_expired(now))
    }

    /// Remove and return every expired lock.
    pub fn reclaim_expired(&mut self, now: DateTime<Utc>) -> Vec<LockRecord> {
        let expired: Vec<String> = self
            .locks
            .iter()
            .filter(|(_, lock)| lock.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        expired
            .into_iter()
            .filter_map(|key| self.locks.remove(&key))
            .collect()
    }

    /// Remove the lock with `lock_id` if it still belongs to `holder_id`.
    pub fn remove_by_id(&mut self, lock_id: &str, holder_id: &str) -> Option<LockRecord> {
        let key = self
            .locks
            .iter()
            .find(|(_, lock)| lock.lock_id == lock_id && lock.holder_id == holder_id)
            .map(|(key, _)| key.clone())?;
        self.locks.remove(&key)
    }

    /// Live locks at `now`, in resource-key order.
    pub fn active(&self, now: DateTime<Utc>) -> impl Iterator<Item = &LockRecord> {
        self.locks.values().filter(move |lock| !lock.is_expired(now))
    }
}

pub(crate) fn conflict(lock: &LockRecord) -> BatonError {
    BatonError::Conflict {
        resource: lock.resource_key.clone(),
        holder: lock.holder_id.clone(),
        task: lock.task_id.clone(),
        expires_at: lock.expires_at,
    }
}

fn not_held(resource_key: &str, holder_id: &str) -> BatonError {
    BatonError::NotFound(format!(
        "no active lock on '{}' held by {}",
        resource_key, holder_id
    ))
}

fn validate_key(resource_key: &str) -> Result<()> {
    if resource_key.trim().is_empty() {
        return Err(BatonError::InvalidArgument(
            "resource key must be non-empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_holder(holder_id: &str) -> Result<()> {
    if holder_id.trim().is_empty() {
        return Err(BatonError::InvalidArgument(
            "holder id must be non-empty".to_string(),
        ));
    }
    Ok(())
}
