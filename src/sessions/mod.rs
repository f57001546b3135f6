//! Worker sessions for baton.
//!
//! Every agent run registers a session before it starts work. Sessions:
//! - bound concurrency: at most `max_concurrent` are active at once, and at
//!   most `max_instances` of each agent type
//! - report liveness through heartbeats; a session that misses its deadline
//!   is terminated by the reaper
//! - own the locks their holder acquires, which are released when the
//!   session ends
//!
//! A session moves `active → completed | failed | terminated` exactly once and
//! is then immutable, archived in the bounded history of `sessions.json`.

mod manager;
mod status;
mod table;
mod types;


pub use manager::{EndReport, SessionManager};
pub use status::{Health, StatusReport};
pub use types::{SessionRecord, SessionStatus, SessionTable};
