use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-user critical sections. Anything that read-modify-writes a user's trip
/// index or profile holds the user's guard for the whole sequence.
#[derive(Clone, Default)]
pub struct UserLocks {
    inner: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl UserLocks {
    pub async fn acquire(&self, user_id: &str) -> OwnedMutexGuard<()> {
        // The map shard guard must be released before awaiting.
        let lock = Arc::clone(&self.inner.entry(user_id.to_string()).or_default());
        lock.lock_owned().await
    }
}
