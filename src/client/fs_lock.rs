//! Filesystem-based locking for cross-process coordination
//!
//! Two `easy-rag` processes ingesting the same knowledge base would race on
//! its index directory. Each ingest takes an exclusive flock() on
//! `<index_dir>/.locks/<namespace>.lock`; the in-process half lives in
//! index_lock.rs.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Guard that holds an exclusive filesystem lock
///
/// The lock is released when this guard is dropped, or by the OS if the
/// process dies.
pub struct FsLockGuard {
    _file: File,
    path: PathBuf,
}

impl FsLockGuard {
    /// Try to acquire an exclusive filesystem lock, non-blocking
    ///
    /// Returns:
    /// - `Ok(Some(guard))` if the lock was acquired
    /// - `Ok(None)` if another holder has it
    /// - `Err(...)` on IO errors
    pub fn try_acquire(lock_path: &Path) -> Result<Option<Self>> {
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent).context("Failed to create lock directory")?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(lock_path)
            .context("Failed to open lock file")?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                tracing::debug!("Acquired filesystem lock {:?}", lock_path);
                Ok(Some(Self {
                    _file: file,
                    path: lock_path.to_path_buf(),
                }))
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                tracing::debug!("Filesystem lock {:?} is held elsewhere", lock_path);
                Ok(None)
            }
            Err(e) => Err(e).context("Failed to acquire filesystem lock"),
        }
    }

    /// Acquire the lock, polling until it is free or `timeout` expires
    ///
    /// Returns `Ok(None)` on timeout.
    pub fn acquire_blocking(lock_path: &Path, timeout: Duration) -> Result<Option<Self>> {
        let start = Instant::now();
        let sleep_interval = Duration::from_millis(200);
        let mut announced = false;

        loop {
            if let Some(guard) = Self::try_acquire(lock_path)? {
                if announced {
                    tracing::info!("Acquired filesystem lock after {:?}", start.elapsed());
                }
                return Ok(Some(guard));
            }
            if start.elapsed() >= timeout {
                tracing::warn!(
                    "Timeout waiting for filesystem lock {:?} after {:?}",
                    lock_path,
                    timeout
                );
                return Ok(None);
            }
            if !announced {
                tracing::info!(
                    "Waiting for another process to finish ingesting (lock {:?}, timeout {:?})",
                    lock_path,
                    timeout
                );
                announced = true;
            }
            std::thread::sleep(sleep_interval.min(timeout.saturating_sub(start.elapsed())));
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FsLockGuard {
    fn drop(&mut self) {
        // Closing the file releases the flock; the file itself is reused
        tracing::debug!("Releasing filesystem lock {:?}", self.path);
    }
}
