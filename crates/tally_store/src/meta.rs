//! The `meta` key-value table: cursors and other small named values.

use crate::error::StoreResult;
use crate::store::LocalStore;
use rusqlite::{params, OptionalExtension};

/// Meta key for the timestamp watermark.
pub fn meta_key_timestamp_cursor() -> String {
    "last_sync_timestamp".to_string()
}

/// Meta key for the per-user server-version watermark.
pub fn meta_key_version_cursor(user_id: &str) -> String {
    format!("last_pull_server_version:{user_id}")
}

impl LocalStore {
    /// Reads a string value from `meta`.
    pub fn meta_get(&self, key: &str) -> StoreResult<Option<String>> {
        let conn = self.conn.lock();
        let value = conn
            .query_row(
                "SELECT value FROM meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Writes a string value into `meta`.
    pub fn meta_set(&self, key: &str, value: &str) -> StoreResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// Reads an integer value from `meta`. Unparseable values read as absent.
    pub fn meta_get_i64(&self, key: &str) -> StoreResult<Option<i64>> {
        Ok(self.meta_get(key)?.and_then(|value| value.parse().ok()))
    }

    /// Writes an integer value into `meta`.
    pub fn meta_set_i64(&self, key: &str, value: i64) -> StoreResult<()> {
        self.meta_set(key, &value.to_string())
    }
}
