//! Per-file mutual exclusion.
//!
//! Schedule, cancel, purge and sweep all take the lock of the file they touch,
//! so at most one of them runs for a given `file_id` at any time while
//! operations on different files proceed in parallel. Table entries are
//! removed as soon as no task holds or waits on them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockTable = HashMap<i64, Arc<AsyncMutex<()>>>;

/// Lock table keyed by file id.
#[derive(Clone, Default)]
pub struct FileLocks {
    table: Arc<Mutex<LockTable>>,
}

/// Exclusive hold on one file. Releases (and reclaims the table entry) on drop.
pub struct FileLockGuard {
    file_id: i64,
    guard: Option<OwnedMutexGuard<()>>,
    lock: Arc<AsyncMutex<()>>,
    table: Arc<Mutex<LockTable>>,
}

impl FileLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, LockTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait for exclusive access to `file_id`.
    pub async fn acquire(&self, file_id: i64) -> FileLockGuard {
        let lock = self.table().entry(file_id).or_default().clone();
        let guard = lock.clone().lock_owned().await;
        FileLockGuard {
            file_id,
            guard: Some(guard),
            lock,
            table: self.table.clone(),
        }
    }

    /// Number of files with a live table entry.
    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }

    /// Drop entries nobody references. Entries normally go away with their
    /// last guard; this catches waiters that were cancelled mid-acquire.
    pub fn prune(&self) -> usize {
        let mut table = self.table();
        let before = table.len();
        table.retain(|_, lock| Arc::strong_count(lock) > 1);
        before - table.len()
    }
}

impl FileLockGuard {
    pub fn file_id(&self) -> i64 {
        self.file_id
    }
}

impl Drop for FileLockGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the table, one here: nobody else holds or waits.
        let unused = table
            .get(&self.file_id)
            .is_some_and(|entry| Arc::ptr_eq(entry, &self.lock) && Arc::strong_count(entry) == 2);
        if unused {
            table.remove(&self.file_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_entry_reclaimed_after_release() {
        let locks = FileLocks::new();
        {
            let guard = locks.acquire(7).await;
            assert_eq!(guard.file_id(), 7);
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_different_files_do_not_block() {
        let locks = FileLocks::new();
        let _a = locks.acquire(1).await;
        let b = tokio::time::timeout(Duration::from_millis(50), locks.acquire(2)).await;
        assert!(b.is_ok());
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_file_is_exclusive() {
        let locks = FileLocks::new();
        let first = locks.acquire(1).await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.acquire(1).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        drop(first);
        // Entry survives while the waiter still references it.
        waiter.await.unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_prune_removes_abandoned_entries() {
        let locks = FileLocks::new();
        let holder = locks.acquire(3).await;

        let cancelled = tokio::time::timeout(Duration::from_millis(10), locks.acquire(3)).await;
        assert!(cancelled.is_err());

        drop(holder);
        assert_eq!(locks.prune(), 0);
        assert!(locks.is_empty());
    }
}
