//! CLI argument parsing for baton.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use crate::context::STATE_DIR_ENV;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Baton: cross-process coordination for pipeline workers.
///
/// Coordinates short-lived worker processes through files in a shared state
/// directory:
/// - Exclusive resource locks with expiring leases
/// - Sessions bounded by a global cap and per-type limits
/// - Stale reclamation of expired locks and silent sessions
/// - Crash-safe progress documents per pipeline stage
#[derive(Parser, Debug)]
#[command(name = "baton")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Coordination state directory.
    #[arg(long, global = true, env = STATE_DIR_ENV, value_name = "DIR")]
    pub state_dir: Option<PathBuf>,

    /// Log progress to stderr (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for baton.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize the state directory.
    ///
    /// Creates the directory layout and writes a default config.yaml if
    /// none exists.
    Init,

    /// Acquire an exclusive lock on a resource.
    AcquireLock(LockArgs),

    /// Release a lock held by an agent.
    ReleaseLock(LockArgs),

    /// Show the live lock on a resource, if any.
    CheckLock(CheckLockArgs),

    /// Extend a lock's lease (allowed once per lock).
    ExtendLock(LockArgs),

    /// Register an active session for an agent.
    RegisterSession(RegisterArgs),

    /// Record a heartbeat for an active session.
    Heartbeat(SessionArgs),

    /// End a session and release its locks.
    ///
    /// Also sweeps expired locks and silent sessions.
    EndSession(EndSessionArgs),

    /// Reclaim expired locks and terminate silent sessions.
    CleanupStale,

    /// Show capacity, sessions, and locks.
    Status,

    /// Check whether an agent may be spawned, without changing state.
    ValidateSpawn(SpawnArgs),

    /// Admit an agent, register its session, and acquire its resources.
    PrepareSpawn(SpawnArgs),

    /// Stage progress document commands.
    Progress(ProgressCommand),
}

/// Arguments for lock commands that act on behalf of an agent.
#[derive(Parser, Debug)]
pub struct LockArgs {
    /// Resource key (typically a file path).
    pub resource: String,

    /// Holder id of the agent.
    #[arg(long)]
    pub agent: String,

    /// Task the lock is taken for (acquire-lock only).
    #[arg(long)]
    pub task: Option<String>,
}

/// Arguments for the `check-lock` command.
#[derive(Parser, Debug)]
pub struct CheckLockArgs {
    /// Resource key to inspect.
    pub resource: String,
}

/// Arguments for the `register-session` command.
#[derive(Parser, Debug)]
pub struct RegisterArgs {
    /// Holder id of the agent.
    #[arg(long)]
    pub agent: String,

    /// Agent type, as configured in config.yaml.
    #[arg(long)]
    pub agent_type: String,

    /// Task the session works on.
    #[arg(long)]
    pub task: Option<String>,
}

/// Arguments for commands addressing one session.
#[derive(Parser, Debug)]
pub struct SessionArgs {
    /// Session id.
    pub session_id: String,
}

/// Final status a caller may end a session with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EndStatus {
    Completed,
    Failed,
}

/// Arguments for the `end-session` command.
#[derive(Parser, Debug)]
pub struct EndSessionArgs {
    /// Session id.
    pub session_id: String,

    /// Final status.
    #[arg(long, value_enum, default_value = "completed")]
    pub status: EndStatus,
}

/// Arguments for `validate-spawn` and `prepare-spawn`.
#[derive(Parser, Debug)]
pub struct SpawnArgs {
    /// Agent type to admit.
    #[arg(long)]
    pub agent_type: String,

    /// Holder id; prepare-spawn generates one when omitted.
    #[arg(long)]
    pub agent: Option<String>,

    /// Task the agent will work on.
    #[arg(long)]
    pub task: Option<String>,

    /// Extra resource to lock, beyond the type's exclusive resources.
    #[arg(long = "resource", value_name = "RESOURCE")]
    pub resources: Vec<String>,
}

/// Progress subcommands.
#[derive(Parser, Debug)]
pub struct ProgressCommand {
    #[command(subcommand)]
    pub action: ProgressAction,
}

/// Available progress actions. Each runs exactly one transaction.
#[derive(Subcommand, Debug)]
pub enum ProgressAction {
    /// Print a stage's progress document, creating it on first access.
    Show(StageArgs),

    /// Merge fields into a phase.
    UpdatePhase(UpdatePhaseArgs),

    /// Set the stage checkpoint counter.
    SetCheckpoint(SetCheckpointArgs),

    /// Set or clear the current phase marker.
    SetPhase(SetPhaseArgs),
}

/// Arguments for `progress show`.
#[derive(Parser, Debug)]
pub struct StageArgs {
    /// Pipeline stage name.
    pub stage: String,
}

/// Arguments for `progress update-phase`.
#[derive(Parser, Debug)]
pub struct UpdatePhaseArgs {
    /// Pipeline stage name.
    pub stage: String,

    /// Phase name.
    pub phase: String,

    /// New phase status (e.g. in_progress, completed).
    #[arg(long)]
    pub status: Option<String>,

    /// Field to set, as key=value; values are parsed as JSON when possible.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub fields: Vec<String>,
}

/// Arguments for `progress set-checkpoint`.
#[derive(Parser, Debug)]
pub struct SetCheckpointArgs {
    /// Pipeline stage name.
    pub stage: String,

    /// New checkpoint value.
    pub checkpoint: u64,
}

/// Arguments for `progress set-phase`.
#[derive(Parser, Debug)]
pub struct SetPhaseArgs {
    /// Pipeline stage name.
    pub stage: String,

    /// Phase to mark as current.
    #[arg(required_unless_present = "clear", conflicts_with = "clear")]
    pub phase: Option<String>,

    /// Clear the current phase marker.
    #[arg(long)]
    pub clear: bool,
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_debug_assert() {
        // Verifies the CLI arguments configuration is valid
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_init() {
        let cli = Cli::try_parse_from(["baton", "init"]).unwrap();
        assert!(matches!(cli.command, Command::Init));
        assert!(!cli.verbose);
    }

    #[test]
    fn parse_acquire_lock() {
        let cli = Cli::try_parse_from([
            "baton",
            "acquire-lock",
            "module-index.md",
            "--agent",
            "A",
            "--task",
            "T1",
        ])
        .unwrap();
        if let Command::AcquireLock(args) = cli.command {
            assert_eq!(args.resource, "module-index.md");
            assert_eq!(args.agent, "A");
            assert_eq!(args.task.as_deref(), Some("T1"));
        } else {
            panic!("Expected AcquireLock command");
        }
    }

    #[test]
    fn parse_lock_requires_agent() {
        let result = Cli::try_parse_from(["baton", "release-lock", "module-index.md"]);
        assert!(result.is_err());
    }

    #[test]
    fn parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["baton", "status", "--state-dir", "/tmp/state", "-v"])
            .unwrap();
        assert!(matches!(cli.command, Command::Status));
        assert_eq!(cli.state_dir, Some(PathBuf::from("/tmp/state")));
        assert!(cli.verbose);
    }

    #[test]
    fn parse_end_session_defaults_to_completed() {
        let cli = Cli::try_parse_from(["baton", "end-session", "abc"]).unwrap();
        if let Command::EndSession(args) = cli.command {
            assert_eq!(args.session_id, "abc");
            assert_eq!(args.status, EndStatus::Completed);
        } else {
            panic!("Expected EndSession command");
        }

        let cli =
            Cli::try_parse_from(["baton", "end-session", "abc", "--status", "failed"]).unwrap();
        if let Command::EndSession(args) = cli.command {
            assert_eq!(args.status, EndStatus::Failed);
        } else {
            panic!("Expected EndSession command");
        }
    }

    #[test]
    fn parse_end_session_rejects_terminated() {
        let result =
            Cli::try_parse_from(["baton", "end-session", "abc", "--status", "terminated"]);
        assert!(result.is_err());
    }

    #[test]
    fn parse_prepare_spawn_with_resources() {
        let cli = Cli::try_parse_from([
            "baton",
            "prepare-spawn",
            "--agent-type",
            "module-writer",
            "--resource",
            "a.md",
            "--resource",
            "b.md",
        ])
        .unwrap();
        if let Command::PrepareSpawn(args) = cli.command {
            assert_eq!(args.agent_type, "module-writer");
            assert!(args.agent.is_none());
            assert_eq!(args.resources, vec!["a.md", "b.md"]);
        } else {
            panic!("Expected PrepareSpawn command");
        }
    }

    #[test]
    fn parse_progress_update_phase() {
        let cli = Cli::try_parse_from([
            "baton",
            "progress",
            "update-phase",
            "stage-1",
            "drafting",
            "--status",
            "in_progress",
            "--set",
            "modules=3",
            "--set",
            "owner=writer-1",
        ])
        .unwrap();
        if let Command::Progress(ProgressCommand {
            action: ProgressAction::UpdatePhase(args),
        }) = cli.command
        {
            assert_eq!(args.stage, "stage-1");
            assert_eq!(args.phase, "drafting");
            assert_eq!(args.status.as_deref(), Some("in_progress"));
            assert_eq!(args.fields, vec!["modules=3", "owner=writer-1"]);
        } else {
            panic!("Expected progress update-phase command");
        }
    }

    #[test]
    fn parse_progress_set_phase_requires_phase_or_clear() {
        assert!(Cli::try_parse_from(["baton", "progress", "set-phase", "stage-1"]).is_err());
        assert!(
            Cli::try_parse_from(["baton", "progress", "set-phase", "stage-1", "x", "--clear"])
                .is_err()
        );

        let cli =
            Cli::try_parse_from(["baton", "progress", "set-phase", "stage-1", "--clear"]).unwrap();
        if let Command::Progress(ProgressCommand {
            action: ProgressAction::SetPhase(args),
        }) = cli.command
        {
            assert!(args.clear);
            assert!(args.phase.is_none());
        } else {
            panic!("Expected progress set-phase command");
        }
    }

    #[test]
    fn parse_progress_set_checkpoint_rejects_negative() {
        assert!(
            Cli::try_parse_from(["baton", "progress", "set-checkpoint", "stage-1", "-1"]).is_err()
        );
    }
}
