//! Scoped advisory file locking
//!
//! Every read-modify-write sequence on the data directory runs under an
//! exclusive advisory lock. The guard releases on drop, so no code path
//! can leak a lock past the invocation. `locking=off` (NFS) yields a
//! no-op guard.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use fs2::FileExt;
use log::{debug, warn};

use crate::error::StorageError;

/// Bounded retry schedule for contended locks.
const LOCK_ATTEMPTS: u32 = 10;
const LOCK_RETRY_DELAY: Duration = Duration::from_millis(100);

/// An exclusive lock on one data file, released when dropped.
#[derive(Debug)]
pub struct FileLock {
    file: Option<File>,
    path: PathBuf,
}

impl FileLock {
    /// Acquire an exclusive lock, retrying a bounded number of times.
    /// With `enabled` false the guard is a no-op.
    pub fn acquire(path: &Path, enabled: bool) -> Result<Self, StorageError> {
        if !enabled {
            return Ok(Self {
                file: None,
                path: path.to_path_buf(),
            });
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| StorageError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        for attempt in 1..=LOCK_ATTEMPTS {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    debug!("locked {} (attempt {attempt})", path.display());
                    return Ok(Self {
                        file: Some(file),
                        path: path.to_path_buf(),
                    });
                }
                Err(_) if attempt < LOCK_ATTEMPTS => {
                    thread::sleep(LOCK_RETRY_DELAY);
                }
                Err(_) => break,
            }
        }

        Err(StorageError::LockTimeout {
            path: path.to_path_buf(),
            attempts: LOCK_ATTEMPTS,
        })
    }

    /// Release the lock now instead of at drop.
    pub fn release(mut self) {
        self.unlock();
    }

    fn unlock(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = file.unlock() {
                warn!("failed to unlock {}: {e}", self.path.display());
            }
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        self.unlock();
    }
}
