use super::{KeyValueStore, StoreMap, StoreUpdate};
use crate::error::{ReminderError, ReminderResult};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// Process-local store used by tests.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<StoreMap>,
    failing_updates: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `count` calls to `update` fail without writing.
    pub fn fail_next_updates(&self, count: usize) {
        self.failing_updates.store(count, Ordering::SeqCst);
    }
}

fn select(entries: &StoreMap, keys: &[&str]) -> StoreMap {
    keys.iter()
        .filter_map(|key| {
            entries
                .get(*key)
                .map(|value| ((*key).to_string(), value.clone()))
        })
        .collect()
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, keys: &[&str]) -> ReminderResult<StoreMap> {
        Ok(select(&*self.entries.read().await, keys))
    }

    async fn set(&self, entries: StoreMap) -> ReminderResult<()> {
        // Yield first so callers that read, then set, can interleave.
        tokio::task::yield_now().await;
        self.entries.write().await.extend(entries);
        Ok(())
    }

    async fn update(&self, keys: &[&str], apply: StoreUpdate<'_>) -> ReminderResult<()> {
        let failing = self
            .failing_updates
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ReminderError::Store("update rejected".to_string()));
        }

        let mut entries = self.entries.write().await;
        let mut selected = select(&entries, keys);

        apply(&mut selected)?;
        entries.extend(selected);
        Ok(())
    }
}
