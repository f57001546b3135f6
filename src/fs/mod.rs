//! Filesystem primitives for baton.
//!
//! Every persisted table and progress document is written through
//! [`atomic_write`], and every read-modify-write cycle is serialized through a
//! [`FileLease`] on a dedicated lease file.

pub mod atomic;
pub mod lease;

pub use atomic::{atomic_write, read_if_exists, temp_path_for};
pub use lease::FileLease;
