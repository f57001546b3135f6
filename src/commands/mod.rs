//! Command implementations for baton.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations. Handlers return a [`Report`] instead of printing, so
//! `main` owns stdout, stderr, and the exit code.

mod init;
mod locks;
mod output;
mod progress;
mod sessions;
mod spawn;
mod status;


pub use output::Report;

use crate::admission::FileHealthSignal;
use crate::cli::{Command, ProgressAction, ProgressCommand};
use crate::config::Config;
use crate::context::CoordinationContext;
use crate::error::Result;
use crate::locks::LockManager;
use crate::progress::ProgressStore;
use crate::reaper::Reaper;
use crate::sessions::SessionManager;
use crate::store::CoordinationStore;
use std::path::Path;
use tracing::debug;

/// Dispatch a command to its implementation.
///
/// This is the main entry point for command execution. Each command
/// is routed to its handler function.
pub fn dispatch(state_dir: Option<&Path>, command: Command) -> Result<Report> {
    let ctx = CoordinationContext::resolve(state_dir)?;
    debug!(state_dir = %ctx.state_dir.display(), "resolved state directory");

    let coordinator = Coordinator::load(ctx)?;
    match command {
        Command::Init => init::cmd_init(&coordinator),
        Command::AcquireLock(args) => locks::cmd_acquire(&coordinator, args),
        Command::ReleaseLock(args) => locks::cmd_release(&coordinator, args),
        Command::CheckLock(args) => locks::cmd_check(&coordinator, args),
        Command::ExtendLock(args) => locks::cmd_extend(&coordinator, args),
        Command::RegisterSession(args) => sessions::cmd_register(&coordinator, args),
        Command::Heartbeat(args) => sessions::cmd_heartbeat(&coordinator, args),
        Command::EndSession(args) => sessions::cmd_end(&coordinator, args),
        Command::CleanupStale => status::cmd_cleanup_stale(&coordinator),
        Command::Status => status::cmd_status(&coordinator),
        Command::ValidateSpawn(args) => spawn::cmd_validate(&coordinator, args),
        Command::PrepareSpawn(args) => spawn::cmd_prepare(&coordinator, args),
        Command::Progress(progress_cmd) => dispatch_progress(&coordinator, progress_cmd),
    }
}

/// Dispatch progress subcommands.
fn dispatch_progress(coordinator: &Coordinator, progress_cmd: ProgressCommand) -> Result<Report> {
    match progress_cmd.action {
        ProgressAction::Show(args) => progress::cmd_show(coordinator, args),
        ProgressAction::UpdatePhase(args) => progress::cmd_update_phase(coordinator, args),
        ProgressAction::SetCheckpoint(args) => progress::cmd_set_checkpoint(coordinator, args),
        ProgressAction::SetPhase(args) => progress::cmd_set_phase(coordinator, args),
    }
}

/// Resolved state directory, its config, and the store over it.
pub(crate) struct Coordinator {
    pub(crate) ctx: CoordinationContext,
    pub(crate) config: Config,
    pub(crate) store: CoordinationStore,
}

impl Coordinator {
    /// Load config from the state directory, using defaults when it has none.
    pub(crate) fn load(ctx: CoordinationContext) -> Result<Self> {
        let config = Config::load_or_default(ctx.config_path())?;
        let store = CoordinationStore::new(ctx.clone(), &config);
        Ok(Self { ctx, config, store })
    }

    pub(crate) fn locks(&self) -> LockManager<'_> {
        LockManager::new(&self.store, &self.config)
    }

    pub(crate) fn sessions(&self) -> SessionManager<'_> {
        SessionManager::new(&self.store, &self.config)
    }

    pub(crate) fn reaper(&self) -> Reaper<'_> {
        Reaper::new(&self.store, &self.config)
    }

    pub(crate) fn progress(&self) -> ProgressStore {
        ProgressStore::new(self.ctx.clone(), &self.config)
    }

    pub(crate) fn health_signal(&self) -> FileHealthSignal {
        FileHealthSignal::new(self.ctx.health_signal_path(&self.config.health_signal_file))
    }
}
