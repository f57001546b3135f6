//! Per-stage progress documents for baton.
//!
//! Each pipeline stage keeps one shared JSON document under
//! `<state>/progress/<stage>.json`. Every mutation goes through a
//! [`ProgressTransaction`]:
//!
//! 1. Take the exclusive lease on `<stage>.json.lock` (bounded wait,
//!    `LockTimeout` past `progress_lock_timeout_seconds`)
//! 2. Load the document, creating the default one on first access. A
//!    malformed document is replaced by its backup; with no valid backup the
//!    open fails with `Corruption`
//! 3. Mutate the in-memory copy
//! 4. Commit: copy the on-disk document to `<stage>.json.bak`, write the new
//!    revision to a temp file, fsync, rename into place, release the lease
//!
//! A transaction that is rolled back or dropped without committing leaves the
//! document byte-identical to what it was when the transaction opened.

mod document;
mod transaction;


pub use document::{PhaseState, ProgressDocument, ValidationState};
pub use transaction::{ProgressStore, ProgressTransaction};
