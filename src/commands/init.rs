//! Implementation of the `baton init` command.
//!
//! Creates the state directory layout and a `config.yaml` template (if
//! missing). Idempotent: an existing config is validated and left alone.

use super::{Coordinator, Report};
use crate::config::Config;
use crate::error::Result;
use crate::fs::atomic_write;
use serde_json::json;
use tracing::info;

/// Execute the `baton init` command.
pub fn cmd_init(coordinator: &Coordinator) -> Result<Report> {
    let ctx = &coordinator.ctx;
    ctx.ensure_dirs()?;

    let config_path = ctx.config_path();
    let config_created = !config_path.exists();
    if config_created {
        let yaml = Config::default().to_yaml()?;
        atomic_write(&config_path, yaml.as_bytes())?;
        info!(path = %config_path.display(), "wrote default config");
    }

    Report::ok(&json!({
        "state_dir": ctx.state_dir,
        "config_path": config_path,
        "config_created": config_created,
        "max_concurrent": coordinator.config.max_concurrent,
        "agent_types": coordinator.config.agent_types.keys().collect::<Vec<_>>(),
    }))
}
