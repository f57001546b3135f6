//! Lease-guarded read-modify-write of a stage progress document.

use super::document::{PhaseState, ProgressDocument};
use crate::config::Config;
use crate::context::CoordinationContext;
use crate::error::{BatonError, Result};
use crate::events::{self, Event, EventAction};
use crate::fs::{FileLease, atomic_write, read_if_exists};
use chrono::Utc;
use serde_json::{Map, Value, json};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Entry point for progress transactions in one state directory.
#[derive(Debug, Clone)]
pub struct ProgressStore {
    ctx: CoordinationContext,
    lease_timeout: Duration,
}

impl ProgressStore {
    pub fn new(ctx: CoordinationContext, config: &Config) -> Self {
        Self {
            ctx,
            lease_timeout: config.progress_lock_timeout(),
        }
    }

    /// Open a transaction on `stage`, waiting for its lease.
    pub fn open(&self, stage: &str) -> Result<ProgressTransaction> {
        ProgressTransaction::open(&self.ctx, stage, self.lease_timeout)
    }

    /// Run `f` in a transaction on `stage`: commit if it returns `Ok`,
    /// roll back if it returns `Err`.
    pub fn with_transaction<T, F>(&self, stage: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut ProgressTransaction) -> Result<T>,
    {
        let mut tx = self.open(stage)?;
        match f(&mut tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!(%stage, error = %rollback_err, "progress rollback failed");
                }
                Err(e)
            }
        }
    }
}

/// An open transaction on one stage's progress document.
///
/// Holds the stage lease until [`commit`](Self::commit) or
/// [`rollback`](Self::rollback). Dropping an unfinished transaction rolls it
/// back.
#[derive(Debug)]
pub struct ProgressTransaction {
    ctx: CoordinationContext,
    stage: String,
    path: PathBuf,
    backup_path: PathBuf,
    document: ProgressDocument,
    /// On-disk bytes as of open.
    original: Vec<u8>,
    dirty: bool,
    lease: Option<FileLease>,
}

impl ProgressTransaction {
    fn open(ctx: &CoordinationContext, stage: &str, timeout: Duration) -> Result<Self> {
        let path = ctx.progress_path(stage)?;
        let backup_path = ctx.progress_backup_path(stage)?;
        let lease = FileLease::acquire_exclusive(ctx.progress_lease_path(stage)?, timeout)?;

        let (document, original) = match read_if_exists(&path)? {
            None => {
                debug!(%stage, "creating progress document");
                let document = ProgressDocument::new(Utc::now());
                let bytes = serialize(stage, &document)?;
                atomic_write(&path, &bytes)?;
                (document, bytes)
            }
            Some(bytes) => match serde_json::from_slice::<ProgressDocument>(&bytes) {
                Ok(document) => (document, bytes),
                Err(parse_err) => {
                    restore_from_backup(ctx, stage, &path, &backup_path, &parse_err)?
                }
            },
        };

        Ok(Self {
            ctx: ctx.clone(),
            stage: stage.to_string(),
            path,
            backup_path,
            document,
            original,
            dirty: false,
            lease: Some(lease),
        })
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    pub fn document(&self) -> &ProgressDocument {
        &self.document
    }

    pub fn get_phase(&self, name: &str) -> Option<&PhaseState> {
        self.document.phases.get(name)
    }

    pub fn update_phase(&mut self, name: &str, fields: Map<String, Value>) -> Result<&PhaseState> {
        self.dirty = true;
        self.document.update_phase(name, fields, Utc::now())
    }

    pub fn set_checkpoint(&mut self, checkpoint: u64) {
        self.dirty = true;
        self.document.checkpoint = checkpoint;
    }

    /// Set or clear the current phase marker.
    pub fn set_current_phase(&mut self, phase: Option<&str>) {
        self.dirty = true;
        self.document.current_phase = phase.map(str::to_string);
    }

    /// Write the document durably and release the lease.
    ///
    /// The previous on-disk revision becomes the backup. A transaction that
    /// changed nothing writes nothing.
    pub fn commit(mut self) -> Result<()> {
        if self.dirty {
            self.write()?;
            info!(stage = %self.stage, checkpoint = self.document.checkpoint, "progress committed");
            events::record(
                &self.ctx,
                Event::new(EventAction::ProgressCommit).with_details(json!({
                    "stage": self.stage,
                    "checkpoint": self.document.checkpoint,
                    "current_phase": self.document.current_phase,
                })),
            );
        }
        self.lease = None;
        Ok(())
    }

    /// Abandon the mutations and release the lease, restoring the document
    /// as it was at open if anything has changed it since.
    pub fn rollback(mut self) -> Result<()> {
        self.restore_original()
    }

    fn write(&mut self) -> Result<()> {
        if let Some(current) = read_if_exists(&self.path)? {
            atomic_write(&self.backup_path, &current)?;
        }

        self.document.updated_at = Utc::now();
        let bytes = serialize(&self.stage, &self.document)?;
        atomic_write(&self.path, &bytes)
    }

    fn restore_original(&mut self) -> Result<()> {
        if self.lease.is_none() {
            return Ok(());
        }

        let current = read_if_exists(&self.path)?;
        let result = if current.as_deref() == Some(self.original.as_slice()) {
            Ok(())
        } else {
            warn!(stage = %self.stage, "restoring progress document to its state at open");
            atomic_write(&self.path, &self.original)
        };

        self.lease = None;
        result
    }
}

impl Drop for ProgressTransaction {
    fn drop(&mut self) {
        if self.lease.is_some()
            && let Err(e) = self.restore_original()
        {
            warn!(stage = %self.stage, error = %e, "progress rollback on drop failed");
        }
    }
}

fn serialize(stage: &str, document: &ProgressDocument) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(document).map_err(|e| {
        BatonError::Io(format!(
            "failed to serialize progress for stage '{}': {}",
            stage, e
        ))
    })?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Replace a malformed document with its backup, returning the parsed
/// backup and its bytes.
fn restore_from_backup(
    ctx: &CoordinationContext,
    stage: &str,
    path: &Path,
    backup_path: &Path,
    parse_err: &serde_json::Error,
) -> Result<(ProgressDocument, Vec<u8>)> {
    let corruption = |detail: String| {
        BatonError::Corruption(format!(
            "progress document for stage '{}' is malformed ({}) and {}",
            stage, parse_err, detail
        ))
    };

    let Some(bytes) = read_if_exists(backup_path)? else {
        return Err(corruption("no backup exists".to_string()));
    };
    let document = serde_json::from_slice::<ProgressDocument>(&bytes)
        .map_err(|e| corruption(format!("the backup is unusable: {}", e)))?;

    atomic_write(path, &bytes)?;
    warn!(%stage, error = %parse_err, "malformed progress document restored from backup");
    events::record(
        ctx,
        Event::new(EventAction::ProgressRestore).with_details(json!({
            "stage": stage,
            "error": parse_err.to_string(),
            "checkpoint": document.checkpoint,
        })),
    );
    Ok((document, bytes))
}
