use crate::error::{ReminderError, ReminderResult};
use crate::models::NotificationRecord;
use crate::store::{KeyValueStore, StoreMap, keys};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Most recent entries kept in History.
pub const HISTORY_LIMIT: usize = 100;

/// Notification history and favorites, both kept in the key-value store.
///
/// History is newest-first. Favorites hold copies of History records joined by
/// `id`. Every mutation is one [`KeyValueStore::update`], so concurrent
/// writers never lose each other's changes, even across processes.
///
/// Entries that no longer decode as a [`NotificationRecord`] are skipped when
/// reading. The next mutation rewrites both lists without them.
#[derive(Clone)]
pub struct HistoryStore {
    store: Arc<dyn KeyValueStore>,
}

struct Lists {
    history: Vec<NotificationRecord>,
    favorites: Vec<NotificationRecord>,
}

impl Lists {
    fn take(entries: &mut StoreMap) -> Self {
        Self {
            history: decode_list(keys::HISTORY, entries.remove(keys::HISTORY)),
            favorites: decode_list(keys::FAVORITES, entries.remove(keys::FAVORITES)),
        }
    }

    fn put(&self, entries: &mut StoreMap) -> ReminderResult<()> {
        for (key, list) in [(keys::HISTORY, &self.history), (keys::FAVORITES, &self.favorites)] {
            let encoded = serde_json::to_value(list)
                .map_err(|error| ReminderError::Store(error.to_string()))?;
            entries.insert(key.to_string(), encoded);
        }

        Ok(())
    }
}

impl HistoryStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn history(&self) -> ReminderResult<Vec<NotificationRecord>> {
        Ok(self.read_lists().await?.history)
    }

    pub async fn favorites(&self) -> ReminderResult<Vec<NotificationRecord>> {
        Ok(self.read_lists().await?.favorites)
    }

    pub async fn find(&self, id: &str) -> ReminderResult<Option<NotificationRecord>> {
        let lists = self.read_lists().await?;

        Ok(lists
            .history
            .into_iter()
            .chain(lists.favorites)
            .find(|record| record.id == id))
    }

    /// Prepends `record` and keeps only the newest [`HISTORY_LIMIT`] entries.
    pub async fn append(&self, record: NotificationRecord) -> ReminderResult<()> {
        self.mutate(move |lists| {
            lists.history.insert(0, record);
            lists.history.truncate(HISTORY_LIMIT);
        })
        .await
    }

    /// Returns the new favorite state, or `None` when `id` is in neither list.
    pub async fn toggle_favorite(&self, id: &str) -> ReminderResult<Option<bool>> {
        let favorite = self
            .mutate(|lists| {
                if lists.favorites.iter().any(|record| record.id == id) {
                    lists.favorites.retain(|record| record.id != id);
                    return Some(false);
                }

                let record = lists.history.iter().find(|record| record.id == id)?.clone();
                lists.favorites.push(record);
                Some(true)
            })
            .await?;

        match favorite {
            Some(true) => debug!(id, "added to favorites"),
            Some(false) => debug!(id, "removed from favorites"),
            None => debug!(id, "toggle favorite ignored, record not found"),
        }

        Ok(favorite)
    }

    /// Forgets `id` in both lists, whichever view the delete came from.
    pub async fn delete(&self, id: &str, from_favorites_view: bool) -> ReminderResult<bool> {
        let removed = self
            .mutate(|lists| {
                let before = lists.history.len() + lists.favorites.len();
                lists.history.retain(|record| record.id != id);
                lists.favorites.retain(|record| record.id != id);
                before != lists.history.len() + lists.favorites.len()
            })
            .await?;
        debug!(id, from_favorites_view, removed, "delete notification");

        Ok(removed)
    }

    /// Drops every History entry that is not favorited. Favorites stay as they are.
    pub async fn sweep_unfavorited(&self) -> ReminderResult<usize> {
        let (removed, kept) = self
            .mutate(|lists| {
                let favorite_ids = lists
                    .favorites
                    .iter()
                    .map(|record| record.id.clone())
                    .collect::<HashSet<_>>();
                let before = lists.history.len();
                lists
                    .history
                    .retain(|record| favorite_ids.contains(&record.id));
                (before - lists.history.len(), lists.history.len())
            })
            .await?;
        info!(removed, kept, "unfavorited notifications swept");

        Ok(removed)
    }

    async fn read_lists(&self) -> ReminderResult<Lists> {
        let mut entries = self.store.get(&[keys::HISTORY, keys::FAVORITES]).await?;
        Ok(Lists::take(&mut entries))
    }

    /// Runs `change` on both lists inside one store update and writes them back.
    async fn mutate<T, F>(&self, change: F) -> ReminderResult<T>
    where
        F: FnOnce(&mut Lists) -> T + Send,
        T: Send,
    {
        let mut output = None;

        self.store
            .update(
                &[keys::HISTORY, keys::FAVORITES],
                Box::new(|entries: &mut StoreMap| -> ReminderResult<()> {
                    let mut lists = Lists::take(entries);
                    output = Some(change(&mut lists));
                    lists.put(entries)
                }),
            )
            .await?;

        output.ok_or_else(|| ReminderError::Store("history update was not applied".to_string()))
    }
}

fn decode_list(key: &str, value: Option<Value>) -> Vec<NotificationRecord> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(record) => Some(record),
            Err(error) => {
                warn!(list = key, error = %error, "skipping malformed notification entry");
                None
            }
        })
        .collect()
}
