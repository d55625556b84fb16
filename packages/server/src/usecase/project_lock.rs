//! Per-project critical sections.
//!
//! Read-modify-write sequences against the store (find, then update) must not
//! interleave for the same project, otherwise two concurrent uploads can lose
//! a file reference or reorder the list.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::ProjectId;

type Entries = HashMap<ProjectId, Arc<AsyncMutex<()>>>;

/// One async mutex per project id, created on first use and dropped once
/// nobody holds or waits for it.
#[derive(Default)]
pub struct ProjectLocks {
    locks: Mutex<Entries>,
}

impl ProjectLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, Entries> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait for exclusive access to `id`. Released when the guard drops.
    pub async fn lock(&self, id: ProjectId) -> ProjectLockGuard<'_> {
        let lock = self.entries().entry(id).or_default().clone();
        let guard = lock.lock_owned().await;
        ProjectLockGuard {
            locks: self,
            id,
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries().len()
    }
}

/// Exclusive access to one project.
pub struct ProjectLockGuard<'a> {
    locks: &'a ProjectLocks,
    id: ProjectId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ProjectLockGuard<'_> {
    fn drop(&mut self) {
        // 待機中のタスクはエントリの Arc を保持しているので削除されない
        let mut entries = self.locks.entries();
        drop(self.guard.take());
        if entries
            .get(&self.id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            entries.remove(&self.id);
        }
    }
}
