//! Resource locks for baton.
//!
//! A lock grants one holder exclusive use of a resource key (usually a file
//! path shared between pipeline agents) for a fixed lease:
//! - At most one non-expired lock exists per resource key.
//! - A lock may be extended exactly once; the extension restarts the lease.
//! - Expiry is checked lazily. An expired lock is invisible to readers and is
//!   physically removed by the next acquisition of its key or by the reaper.
//!
//! # Lock Records
//!
//! All locks live in one table, `<state>/locks.json`:
//! `{lock_id, agent_id, task_id, file_path, acquired_at, expires_at, extensions}`.
//! The table is only ever mutated inside a
//! [`CoordinationStore`](crate::store::CoordinationStore) transaction.

mod manager;
mod table;
mod types;


pub use manager::LockManager;
pub(crate) use table::conflict;
pub use types::{Acquisition, LockRecord, LockTable, MAX_EXTENSIONS};
