//! Durable lock and session storage.
//!
//! The lock table and session table are two JSON files guarded by one lease
//! file. Every mutation runs as a transaction:
//!
//! 1. Take the exclusive lease on `coordination.lock` (bounded wait)
//! 2. Load `locks.json` and `sessions.json` (missing → empty)
//! 3. Run the caller's closure against the in-memory [`Tables`]
//! 4. On `Ok`, atomically write back whichever table changed
//! 5. Release the lease
//!
//! On `Err` nothing is written, so a check-then-act sequence inside one
//! closure is atomic with respect to every other process using the store.
//! Readers take a shared lease and never write.

mod tables;


pub use tables::{EndedSession, Tables};

use crate::config::Config;
use crate::context::CoordinationContext;
use crate::error::{BatonError, Result};
use crate::fs::{FileLease, atomic_write, read_if_exists};
use crate::locks::LockTable;
use crate::sessions::SessionTable;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Transactional access to the lock and session tables of one state dir.
#[derive(Debug, Clone)]
pub struct CoordinationStore {
    ctx: CoordinationContext,
    lease_timeout: Duration,
}

impl CoordinationStore {
    pub fn new(ctx: CoordinationContext, config: &Config) -> Self {
        Self {
            ctx,
            lease_timeout: config.store_lock_timeout(),
        }
    }

    pub fn context(&self) -> &CoordinationContext {
        &self.ctx
    }

    /// Run `f` against the tables under the exclusive lease, committing
    /// its changes if it returns `Ok`.
    pub fn transact<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Tables) -> Result<T>,
    {
        let _lease = FileLease::acquire_exclusive(self.ctx.store_lease_path(), self.lease_timeout)?;

        let locks_path = self.ctx.locks_path();
        let sessions_path = self.ctx.sessions_path();
        let (locks, locks_bytes) = load_table::<LockTable>(&locks_path)?;
        let (sessions, sessions_bytes) = load_table::<SessionTable>(&sessions_path)?;
        let mut tables = Tables { locks, sessions };

        let value = f(&mut tables)?;

        write_if_changed(&locks_path, &tables.locks, locks_bytes.as_deref())?;
        write_if_changed(&sessions_path, &tables.sessions, sessions_bytes.as_deref())?;
        Ok(value)
    }

    /// Run `f` against a consistent snapshot of the tables under a shared lease.
    pub fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Tables) -> Result<T>,
    {
        let _lease = FileLease::acquire_shared(self.ctx.store_lease_path(), self.lease_timeout)?;

        let (locks, _) = load_table::<LockTable>(&self.ctx.locks_path())?;
        let (sessions, _) = load_table::<SessionTable>(&self.ctx.sessions_path())?;
        f(&Tables { locks, sessions })
    }
}

fn load_table<T>(path: &Path) -> Result<(T, Option<Vec<u8>>)>
where
    T: DeserializeOwned + Default,
{
    let Some(bytes) = read_if_exists(path)? else {
        return Ok((T::default(), None));
    };

    let table = serde_json::from_slice(&bytes).map_err(|e| {
        BatonError::Corruption(format!(
            "failed to parse '{}': {}",
            path.display(),
            e
        ))
    })?;
    Ok((table, Some(bytes)))
}

/// A missing file reads as the empty table, so an empty table is not
/// written until it first gains content.
fn write_if_changed<T>(path: &Path, table: &T, original: Option<&[u8]>) -> Result<()>
where
    T: Serialize + Default + PartialEq,
{
    if original.is_none() && *table == T::default() {
        return Ok(());
    }

    let mut bytes = serde_json::to_vec_pretty(table)
        .map_err(|e| BatonError::Io(format!("failed to serialize '{}': {}", path.display(), e)))?;
    bytes.push(b'\n');

    if original == Some(bytes.as_slice()) {
        return Ok(());
    }

    debug!(path = %path.display(), "writing table");
    atomic_write(path, &bytes)
}
