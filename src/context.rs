//! State directory resolution for baton.
//!
//! Every command locates persisted state through a [`CoordinationContext`],
//! so the lock table, session table, progress documents, and their lease
//! files always resolve to the same places regardless of how the command
//! was invoked.
//!
//! # Layout
//!
//! ```text
//! <state>/
//!   config.yaml
//!   health.json            (owned by an external health monitor)
//!   locks.json
//!   sessions.json
//!   coordination.lock      (lease over locks.json + sessions.json)
//!   events/events.ndjson
//!   progress/<stage>.json
//!   progress/<stage>.json.bak
//!   progress/.<stage>.json.tmp
//!   progress/<stage>.json.lock
//! ```

use crate::error::{BatonError, Result};
use regex::Regex;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Default state directory, relative to the working directory.
pub const DEFAULT_STATE_DIR: &str = ".baton";

/// Environment variable that overrides the state directory.
pub const STATE_DIR_ENV: &str = "BATON_STATE_DIR";

static STAGE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").expect("stage name pattern is valid")
});

/// Resolved paths for one coordination domain. All paths are absolute.
#[derive(Debug, Clone)]
pub struct CoordinationContext {
    /// Root of all persisted coordination state.
    pub state_dir: PathBuf,

    /// Directory holding one progress document per pipeline stage.
    pub progress_dir: PathBuf,
}

impl CoordinationContext {
    /// Resolve the context from an explicit directory, or the default
    /// `.baton` under the current working directory.
    pub fn resolve(state_dir: Option<&Path>) -> Result<Self> {
        let cwd = env::current_dir().map_err(|e| {
            BatonError::Io(format!("failed to get current working directory: {}", e))
        })?;

        let state_dir = match state_dir {
            Some(dir) if dir.is_absolute() => dir.to_path_buf(),
            Some(dir) => cwd.join(dir),
            None => cwd.join(DEFAULT_STATE_DIR),
        };

        Ok(Self::at(state_dir))
    }

    /// Build a context rooted at `state_dir` without touching the filesystem.
    pub fn at<P: AsRef<Path>>(state_dir: P) -> Self {
        let state_dir = state_dir.as_ref().to_path_buf();
        let progress_dir = state_dir.join("progress");
        Self {
            state_dir,
            progress_dir,
        }
    }

    /// Create the state and progress directories if they are missing.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.state_dir, &self.progress_dir, &self.events_dir()] {
            std::fs::create_dir_all(dir).map_err(|e| {
                BatonError::Io(format!(
                    "failed to create state directory '{}': {}",
                    dir.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Get the path to the config file.
    pub fn config_path(&self) -> PathBuf {
        self.state_dir.join("config.yaml")
    }

    /// Get the path to the lock table.
    pub fn locks_path(&self) -> PathBuf {
        self.state_dir.join("locks.json")
    }

    /// Get the path to the session table.
    pub fn sessions_path(&self) -> PathBuf {
        self.state_dir.join("sessions.json")
    }

    /// Get the path to the lease file guarding both tables.
    pub fn store_lease_path(&self) -> PathBuf {
        self.state_dir.join("coordination.lock")
    }

    /// Resolve the health signal file; relative names live in the state dir.
    pub fn health_signal_path(&self, configured: &str) -> PathBuf {
        let path = Path::new(configured);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.state_dir.join(path)
        }
    }

    /// Get the path to the events directory.
    pub fn events_dir(&self) -> PathBuf {
        self.state_dir.join("events")
    }

    /// Get the path to the main events log file.
    pub fn events_file(&self) -> PathBuf {
        self.events_dir().join("events.ndjson")
    }

    /// Get the path to a stage's progress document.
    pub fn progress_path(&self, stage: &str) -> Result<PathBuf> {
        validate_stage_name(stage)?;
        Ok(self.progress_dir.join(format!("{}.json", stage)))
    }

    /// Get the path to a stage's rolling backup.
    pub fn progress_backup_path(&self, stage: &str) -> Result<PathBuf> {
        validate_stage_name(stage)?;
        Ok(self.progress_dir.join(format!("{}.json.bak", stage)))
    }

    /// Get the path to a stage's lease file.
    pub fn progress_lease_path(&self, stage: &str) -> Result<PathBuf> {
        validate_stage_name(stage)?;
        Ok(self.progress_dir.join(format!("{}.json.lock", stage)))
    }
}

/// Reject stage names that could escape the progress directory or collide
/// with the backup/temp naming scheme.
pub fn validate_stage_name(stage: &str) -> Result<()> {
    if STAGE_NAME.is_match(stage) && !stage.contains("..") {
        Ok(())
    } else {
        Err(BatonError::InvalidArgument(format!(
            "invalid stage name '{}': use letters, digits, '-', '_' or '.'",
            stage
        )))
    }
}
