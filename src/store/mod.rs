#[cfg(test)]
pub mod memory;
pub mod queries;

use crate::error::{ReminderError, ReminderResult};
use crate::models::{Settings, SettingsPatch};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

pub type StoreMap = Map<String, Value>;

/// Edits the entries read by [`KeyValueStore::update`]. Keys left in the map
/// are written back, keys removed from it are left untouched in the store.
pub type StoreUpdate<'a> = Box<dyn FnOnce(&mut StoreMap) -> ReminderResult<()> + Send + 'a>;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub mod keys {
    pub const SETTINGS: &str = "settings";
    pub const PRAYER_TIMES: &str = "prayerTimes";
    pub const LOCATION: &str = "location";
    pub const COORDINATES: &str = "coordinates";
    pub const HISTORY: &str = "notifications";
    pub const FAVORITES: &str = "favorites";
    pub const LAST_AYAH: &str = "lastAyah";
}

/// Durable string key to JSON value mapping shared by every handler.
///
/// `get` omits absent keys from the returned map. `update` reads `keys`,
/// applies `apply` and writes the result as one step: no other writer, in this
/// process or another one sharing the store, can land in between.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, keys: &[&str]) -> ReminderResult<StoreMap>;

    async fn set(&self, entries: StoreMap) -> ReminderResult<()>;

    async fn update(&self, keys: &[&str], apply: StoreUpdate<'_>) -> ReminderResult<()>;
}

pub async fn read_value<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> ReminderResult<Option<T>> {
    let mut entries = store.get(&[key]).await?;

    entries
        .remove(key)
        .filter(|value| !value.is_null())
        .map(|value| {
            serde_json::from_value(value)
                .map_err(|error| ReminderError::Store(format!("malformed `{key}` entry: {error}")))
        })
        .transpose()
}

pub async fn write_value<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> ReminderResult<()> {
    let encoded = serde_json::to_value(value)
        .map_err(|error| ReminderError::Store(format!("failed to encode `{key}`: {error}")))?;

    let mut entries = StoreMap::new();
    entries.insert(key.to_string(), encoded);
    store.set(entries).await
}

/// Settings for one handler invocation. Absent settings mean defaults.
pub async fn load_settings(store: &dyn KeyValueStore) -> ReminderResult<Settings> {
    Ok(read_value(store, keys::SETTINGS).await?.unwrap_or_default())
}

/// Applies `patch` on top of the stored settings and returns the result.
pub async fn update_settings(
    store: &dyn KeyValueStore,
    patch: SettingsPatch,
) -> ReminderResult<Settings> {
    let mut saved = None;

    store
        .update(
            &[keys::SETTINGS],
            Box::new(|entries: &mut StoreMap| -> ReminderResult<()> {
                let mut settings: Settings = match entries
                    .remove(keys::SETTINGS)
                    .filter(|value| !value.is_null())
                {
                    Some(value) => serde_json::from_value(value).map_err(|error| {
                        ReminderError::Store(format!("malformed `settings` entry: {error}"))
                    })?,
                    None => Settings::default(),
                };
                settings.apply(patch);

                let encoded = serde_json::to_value(settings)
                    .map_err(|error| ReminderError::Store(error.to_string()))?;
                entries.insert(keys::SETTINGS.to_string(), encoded);
                saved = Some(settings);
                Ok(())
            }),
        )
        .await?;

    saved.ok_or_else(|| ReminderError::Store("settings update was not applied".to_string()))
}

/// First-install bootstrap: default settings and empty lists, only where absent.
pub async fn ensure_defaults(store: &dyn KeyValueStore) -> ReminderResult<()> {
    let existing = store
        .get(&[keys::SETTINGS, keys::HISTORY, keys::FAVORITES])
        .await?;

    let mut missing = StoreMap::new();
    if !existing.contains_key(keys::SETTINGS) {
        let defaults = serde_json::to_value(Settings::default())
            .map_err(|error| ReminderError::Store(error.to_string()))?;
        missing.insert(keys::SETTINGS.to_string(), defaults);
    }
    for list in [keys::HISTORY, keys::FAVORITES] {
        if !existing.contains_key(list) {
            missing.insert(list.to_string(), Value::Array(Vec::new()));
        }
    }

    if missing.is_empty() {
        return Ok(());
    }

    store.set(missing).await
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite DB: {}", path.display()))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .context("Failed to set SQLite busy timeout")?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;

        Ok(store)
    }

    fn init_schema(&self) -> ReminderResult<()> {
        let conn = self.lock()?;
        queries::schema_statements()
            .iter()
            .try_for_each(|statement| conn.execute(statement, []).map(|_| ()))
            .map_err(ReminderError::from)
    }

    fn lock(&self) -> ReminderResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ReminderError::Store("SQLite connection lock poisoned".to_string()))
    }
}

fn select_entries(conn: &Connection, keys: &[&str]) -> ReminderResult<StoreMap> {
    let mut statement = conn.prepare_cached(queries::SELECT_ENTRY)?;

    let mut entries = StoreMap::new();
    for key in keys {
        let raw: Option<String> = statement
            .query_row(params![key], |row| row.get(0))
            .optional()?;

        if let Some(raw) = raw {
            let value = serde_json::from_str(&raw).map_err(|error| {
                ReminderError::Store(format!("stored `{key}` is not JSON: {error}"))
            })?;
            entries.insert((*key).to_string(), value);
        }
    }

    Ok(entries)
}

fn upsert_entries(conn: &Connection, entries: &StoreMap) -> ReminderResult<()> {
    let updated_at = Utc::now().timestamp_millis();
    let mut statement = conn.prepare_cached(queries::UPSERT_ENTRY)?;

    for (key, value) in entries {
        statement.execute(params![key, value.to_string(), updated_at])?;
    }

    Ok(())
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, keys: &[&str]) -> ReminderResult<StoreMap> {
        let conn = self.lock()?;
        select_entries(&conn, keys)
    }

    async fn set(&self, entries: StoreMap) -> ReminderResult<()> {
        let mut conn = self.lock()?;
        let transaction = conn.transaction()?;

        upsert_entries(&transaction, &entries)?;

        transaction.commit()?;
        Ok(())
    }

    async fn update(&self, keys: &[&str], apply: StoreUpdate<'_>) -> ReminderResult<()> {
        let mut conn = self.lock()?;
        // IMMEDIATE takes the database write lock before the read, so other
        // connections to the same file wait on the busy timeout.
        let transaction = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut entries = select_entries(&transaction, keys)?;
        apply(&mut entries)?;
        upsert_entries(&transaction, &entries)?;

        transaction.commit()?;
        Ok(())
    }
}
