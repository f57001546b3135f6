//! Configuration model for baton.
//!
//! This module defines the Config struct that represents `<state>/config.yaml`.
//! It supports forward-compatible YAML parsing (unknown fields are ignored),
//! sensible defaults for every field, and validation of config values.

mod model;
mod operations;
pub mod types;

#[cfg(test)]
mod tests;

pub use model::Config;
pub use types::{AgentTypeConfig, ComputeTier};
