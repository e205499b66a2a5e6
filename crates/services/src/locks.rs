use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use curriculum_core::model::UserId;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Entries beyond this count trigger a sweep of idle locks.
const PRUNE_THRESHOLD: usize = 1024;

/// One async mutex per user, so read-modify-write cycles on the same user's
/// blob never interleave while different users proceed in parallel.
#[derive(Default)]
pub struct UserLocks {
    locks: Mutex<HashMap<UserId, Arc<AsyncMutex<()>>>>,
}

impl UserLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `user_id`. Released when the guard drops.
    pub async fn acquire(&self, user_id: &UserId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            if locks.len() >= PRUNE_THRESHOLD {
                // Only the map holds an idle lock.
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            Arc::clone(locks.entry(user_id.clone()).or_default())
        };
        lock.lock_owned().await
    }
}
