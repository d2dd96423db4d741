//! Serializes concurrent deliveries of the same video inside one process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Default)]
pub struct VideoLocks {
    inner: Arc<Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>>,
}

/// Held while a delivery owns its video. Dropping it releases the lock.
pub struct VideoLock {
    video_id: i64,
    guard: Option<OwnedMutexGuard<()>>,
    table: Arc<Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>>,
}

impl VideoLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other delivery in this process holds `video_id`.
    /// The second return value is true when the caller had to wait.
    pub async fn acquire(&self, video_id: i64) -> (VideoLock, bool) {
        let slot = {
            let mut table = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            table.entry(video_id).or_default().clone()
        };

        let (guard, contended) = match slot.clone().try_lock_owned() {
            Ok(guard) => (guard, false),
            Err(_) => (slot.lock_owned().await, true),
        };

        (
            VideoLock {
                video_id,
                guard: Some(guard),
                table: self.inner.clone(),
            },
            contended,
        )
    }

    pub fn held(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Drop for VideoLock {
    fn drop(&mut self) {
        let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        drop(self.guard.take());
        // only the table still references the slot: nobody holds or waits on it
        if let Some(slot) = table.get(&self.video_id) {
            if Arc::strong_count(slot) == 1 {
                table.remove(&self.video_id);
            }
        }
    }
}
