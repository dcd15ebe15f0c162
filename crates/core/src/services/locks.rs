//! Per-poll exclusive locks.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// Async mutexes keyed by poll ID.
///
/// Vote evaluation and commit, update and delete of the same poll run one at
/// a time; different polls never contend.
#[derive(Clone, Default)]
pub struct PollLocks {
    locks: Arc<RwLock<HashMap<String, Arc<Mutex<()>>>>>,
}

impl PollLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `poll_id`.
    pub async fn acquire(&self, poll_id: &str) -> OwnedMutexGuard<()> {
        let existing = self.locks.read().await.get(poll_id).cloned();
        let lock = match existing {
            Some(lock) => lock,
            None => self
                .locks
                .write()
                .await
                .entry(poll_id.to_string())
                .or_default()
                .clone(),
        };
        lock.lock_owned().await
    }

    /// Drop the entry for a deleted or missing poll once nobody else holds it.
    pub async fn forget(&self, poll_id: &str) {
        let mut locks = self.locks.write().await;
        // One reference is the map itself, one is the caller's guard
        if locks.get(poll_id).is_some_and(|l| Arc::strong_count(l) <= 2) {
            locks.remove(poll_id);
        }
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.locks.read().await.len()
    }
}
