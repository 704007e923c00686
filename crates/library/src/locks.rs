//! Per-directory write locks.
//!
//! Rebuilding a directory's facets and folding a change event into them are
//! both read-modify-write cycles over the same record. Whoever writes a
//! directory's facets holds its lock for the whole cycle.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Default)]
pub struct DirLocks {
    locks: Mutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>,
}

impl DirLocks {
    /// Wait for exclusive access to `dir`. Access ends when the guard is
    /// dropped.
    pub async fn lock(&self, dir: impl AsRef<Path>) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            // Only the map itself still refers to these.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(dir.as_ref().to_path_buf()).or_default())
        };
        lock.lock_owned().await
    }

    /// Whether someone currently holds the lock of `dir`.
    pub fn is_locked(&self, dir: impl AsRef<Path>) -> bool {
        let locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.get(dir.as_ref()).is_some_and(|lock| lock.try_lock().is_err())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_directory_waits() {
        let locks = DirLocks::default();
        let guard = locks.lock("d").await;
        assert!(locks.is_locked("d"));
        assert!(tokio::time::timeout(Duration::from_millis(20), locks.lock("d")).await.is_err());
        drop(guard);
        assert!(!locks.is_locked("d"));
        let _guard = locks.lock("d").await;
    }

    #[tokio::test]
    async fn test_other_directories_do_not_wait() {
        let locks = DirLocks::default();
        let _d = locks.lock("d").await;
        let _e = tokio::time::timeout(Duration::from_millis(20), locks.lock("e")).await.unwrap();
        assert!(!locks.is_locked("d/e"));
    }

    #[tokio::test]
    async fn test_released_locks_are_pruned() {
        let locks = DirLocks::default();
        drop(locks.lock("d").await);
        drop(locks.lock("e").await);
        assert_eq!(locks.locks.lock().unwrap().len(), 1);
    }
}
