pub const CREATE_ENTRIES: &str = r#"
CREATE TABLE IF NOT EXISTS kv_entries (
  key        TEXT PRIMARY KEY,
  value      TEXT NOT NULL,
  updated_at INTEGER NOT NULL
);
"#;

pub const SELECT_ENTRY: &str = "SELECT value FROM kv_entries WHERE key = ?1";

pub const UPSERT_ENTRY: &str = "INSERT INTO kv_entries (key, value, updated_at)
     VALUES (?1, ?2, ?3)
     ON CONFLICT(key)
     DO UPDATE SET value=excluded.value, updated_at=excluded.updated_at";

pub fn schema_statements() -> Vec<&'static str> {
    vec![CREATE_ENTRIES]
}
