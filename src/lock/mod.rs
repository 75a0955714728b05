//! Single-run lock
//!
//! At most one orchestration run per host, enforced by a marker file at a
//! well-known path. Existence is the whole protocol: no lease, no timeout.
//! A crashed run leaves a stale marker that an operator must remove by hand.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

/// Run lock acquisition errors.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another run already holds the lock. The caller must not proceed to
    /// any other component; the pre-existing marker is left untouched.
    #[error("another run is active (lockfile exists at {0})")]
    Held(PathBuf),

    #[error("failed to create lockfile {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Scoped run lock.
///
/// Release is tied to `Drop`, so the marker is removed on every exit path
/// once acquisition succeeded, including panics unwinding through the
/// pipeline.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    released: bool,
}

impl RunLock {
    /// Create the marker file, failing with [`LockError::Held`] if it already
    /// exists. Creation is atomic (`create_new`), so two racing processes
    /// cannot both acquire.
    pub fn acquire(path: &Path) -> Result<Self, LockError> {
        match fs::OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(_) => {
                info!(path = %path.display(), "run lock acquired");
                Ok(Self {
                    path: path.to_path_buf(),
                    released: false,
                })
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                Err(LockError::Held(path.to_path_buf()))
            }
            Err(err) => Err(LockError::Create {
                path: path.to_path_buf(),
                source: err,
            }),
        }
    }

    /// Remove the marker. Idempotent; an already-absent marker is not an
    /// error, and removal failures are logged rather than raised.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match fs::remove_file(&self.path) {
            Ok(()) => info!(path = %self.path.display(), "run lock released"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "failed to remove lockfile")
            }
        }
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_creates_marker_and_drop_removes_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lockfile");

        {
            let _lock = RunLock::acquire(&path).unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }

    #[test]
    fn second_acquire_fails_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lockfile");

        let _lock = RunLock::acquire(&path).unwrap();
        match RunLock::acquire(&path) {
            Err(LockError::Held(held)) => assert_eq!(held, path),
            other => panic!("expected Held, got {other:?}"),
        }
    }

    #[test]
    fn failed_acquire_leaves_existing_marker_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lockfile");
        fs::write(&path, b"").unwrap();

        assert!(RunLock::acquire(&path).is_err());
        assert!(path.exists(), "failed acquirer must not delete the marker");
    }

    #[test]
    fn release_is_idempotent_and_tolerates_missing_marker() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lockfile");

        let mut lock = RunLock::acquire(&path).unwrap();
        lock.release();
        lock.release();
        assert!(!path.exists());

        let mut lock = RunLock::acquire(&path).unwrap();
        fs::remove_file(&path).unwrap();
        lock.release();
    }
}
