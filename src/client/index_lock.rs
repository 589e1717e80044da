//! Per-namespace ingest locking
//!
//! Two layers:
//! 1. In-memory locks (in-process) - one `tokio::sync::Mutex` per namespace,
//!    so concurrent ingests of the same knowledge base queue up
//! 2. Filesystem locks (cross-process) - see fs_lock.rs
//!
//! Ingests of different namespaces never contend. Readers take no lock.

use super::fs_lock::FsLockGuard;
use crate::error::{IngestError, RagError};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of per-namespace ingest mutexes
#[derive(Default)]
pub(crate) struct NamespaceLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl NamespaceLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn mutex_for(&self, namespace: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks
            .entry(namespace.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Take both lock layers for `namespace`, waiting at most `timeout` in total
    pub(crate) async fn acquire(
        &self,
        namespace: &str,
        lock_path: PathBuf,
        timeout: Duration,
    ) -> Result<IngestLockGuard, RagError> {
        let start = Instant::now();
        let busy = || RagError::from(IngestError::Busy(namespace.to_string()));

        let mutex = self.mutex_for(namespace);
        let local = match mutex.clone().try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::info!(
                    "Another ingest of '{}' is running in this process, waiting",
                    namespace
                );
                tokio::time::timeout(timeout, mutex.lock_owned())
                    .await
                    .map_err(|_| busy())?
            }
        };

        let remaining = timeout.saturating_sub(start.elapsed());
        let fs_lock =
            tokio::task::spawn_blocking(move || FsLockGuard::acquire_blocking(&lock_path, remaining))
                .await
                .map_err(|e| RagError::other(format!("lock task failed: {}", e)))??
                .ok_or_else(busy)?;

        Ok(IngestLockGuard {
            _fs_lock: fs_lock,
            _local: local,
        })
    }
}

/// Held for the duration of one ingest; dropping it releases both layers
pub(crate) struct IngestLockGuard {
    // Declared first so the cross-process lock is released before local waiters wake
    _fs_lock: FsLockGuard,
    _local: OwnedMutexGuard<()>,
}
