//! Cross-process leases on store files.
//!
//! A [`FileLease`] is an OS advisory lock (`flock`/`LockFileEx` via `fs2`)
//! held on a dedicated lease file next to the state it protects. Acquisition
//! polls a non-blocking lock attempt until it succeeds or the timeout
//! elapses, so no caller ever waits unboundedly.
//!
//! The lock is tied to the open file handle: it is released when the lease
//! is dropped, and the kernel releases it if the process dies.

use crate::error::{BatonError, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Interval between lock attempts while waiting.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Whether a lease excludes everyone or only writers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseMode {
    /// Many readers may hold a shared lease together.
    Shared,
    /// Exactly one holder; excludes shared holders too.
    Exclusive,
}

/// RAII guard for an advisory lock on a lease file.
#[derive(Debug)]
pub struct FileLease {
    file: File,
    path: PathBuf,
}

impl FileLease {
    /// Acquire an exclusive lease, waiting up to `timeout`.
    pub fn acquire_exclusive<P: AsRef<Path>>(path: P, timeout: Duration) -> Result<Self> {
        Self::acquire(path.as_ref(), LeaseMode::Exclusive, timeout)
    }

    /// Acquire a shared lease, waiting up to `timeout`.
    pub fn acquire_shared<P: AsRef<Path>>(path: P, timeout: Duration) -> Result<Self> {
        Self::acquire(path.as_ref(), LeaseMode::Shared, timeout)
    }

    fn acquire(path: &Path, mode: LeaseMode, timeout: Duration) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| {
                BatonError::Io(format!(
                    "failed to create lease directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(|e| {
                BatonError::Io(format!(
                    "failed to open lease file '{}': {}",
                    path.display(),
                    e
                ))
            })?;

        let started = Instant::now();
        loop {
            match try_lock(&file, mode) {
                Ok(()) => {
                    debug!(path = %path.display(), ?mode, "lease acquired");
                    return Ok(Self {
                        file,
                        path: path.to_path_buf(),
                    });
                }
                Err(e) if is_contended(&e) => {
                    let waited = started.elapsed();
                    if waited >= timeout {
                        return Err(BatonError::LockTimeout {
                            resource: path.display().to_string(),
                            waited_ms: waited.as_millis() as u64,
                        });
                    }
                    thread::sleep(POLL_INTERVAL.min(timeout - waited));
                }
                Err(e) => {
                    return Err(BatonError::Io(format!(
                        "failed to lock lease file '{}': {}",
                        path.display(),
                        e
                    )));
                }
            }
        }
    }
}

impl Drop for FileLease {
    fn drop(&mut self) {
        // Closing the handle releases the lock as well; the explicit unlock
        // only makes the release immediate for other handles in this process.
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(path = %self.path.display(), error = %e, "failed to release lease");
        }
    }
}

fn try_lock(file: &File, mode: LeaseMode) -> io::Result<()> {
    // Fully qualified: std's inherent File locking methods shadow these names.
    match mode {
        LeaseMode::Shared => FileExt::try_lock_shared(file),
        LeaseMode::Exclusive => FileExt::try_lock_exclusive(file),
    }
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use tempfile::TempDir;

    #[test]
    fn test_exclusive_lease_blocks_second_holder() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store.lock");

        let first = FileLease::acquire_exclusive(&path, Duration::from_secs(1)).unwrap();
        let second = FileLease::acquire_exclusive(&path, Duration::from_millis(100));

        match second {
            Err(BatonError::LockTimeout { resource, waited_ms }) => {
                assert!(resource.ends_with("store.lock"));
                assert!(waited_ms >= 100);
            }
            other => panic!("expected LockTimeout, got {:?}", other),
        }

        drop(first);
        FileLease::acquire_exclusive(&path, Duration::from_millis(100)).unwrap();
    }

    #[test]
    fn test_shared_leases_coexist() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store.lock");

        let _a = FileLease::acquire_shared(&path, Duration::from_millis(100)).unwrap();
        let _b = FileLease::acquire_shared(&path, Duration::from_millis(100)).unwrap();

        let writer = FileLease::acquire_exclusive(&path, Duration::from_millis(50));
        assert!(matches!(writer, Err(BatonError::LockTimeout { .. })));
    }

    #[test]
    fn test_waiter_gets_lease_after_release() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store.lock");

        let held = FileLease::acquire_exclusive(&path, Duration::from_secs(1)).unwrap();
        let (tx, rx) = mpsc::channel();
        let waiter_path = path.clone();
        let waiter = thread::spawn(move || {
            tx.send(()).unwrap();
            FileLease::acquire_exclusive(&waiter_path, Duration::from_secs(5)).is_ok()
        });

        rx.recv().unwrap();
        thread::sleep(Duration::from_millis(100));
        drop(held);

        assert!(waiter.join().unwrap());
    }

    #[test]
    fn test_lease_creates_parent_directory() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("progress").join("stage.json.lock");

        let _lease = FileLease::acquire_exclusive(&path, Duration::from_millis(100)).unwrap();

        assert!(path.exists());
    }
}
