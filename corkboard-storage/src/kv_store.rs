//! SQLite-backed key-value store.
//!
//! The durable stand-in for browser-local storage: a handful of
//! independently keyed JSON documents (note collection, viewport,
//! settings, sync queue). Access is whole-value read/write per key; there
//! is no partial-update API.

use crate::error::StorageResult;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Well-known storage keys.
pub mod keys {
    /// The full note collection, as a JSON array.
    pub const NOTES: &str = "notes";
    /// Canvas viewport state `{ x, y, zoom }`.
    pub const VIEWPORT: &str = "viewport";
    /// Customization settings.
    pub const SETTINGS: &str = "settings";
    /// Pending sync queue entries, as a JSON array.
    pub const SYNC_QUEUE: &str = "sync-queue";
}

/// Durable key-value store backed by SQLite.
///
/// Cloning shares the underlying connection, so every collaborator sees
/// the same data regardless of which handle wrote it.
#[derive(Clone)]
pub struct KvStore {
    conn: Arc<Mutex<Connection>>,
}

impl KvStore {
    /// Opens or creates a store at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Reads the value stored under `key`, if any.
    pub fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let result = conn.query_row(
            "SELECT value FROM kv_entries WHERE key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );
        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes `value` under `key`, replacing any existing value.
    pub fn put(&self, key: &str, value: &str) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO kv_entries (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, corkboard_types::now_millis()],
        )?;
        Ok(())
    }

    /// Removes the value stored under `key`.
    pub fn remove(&self, key: &str) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM kv_entries WHERE key = ?1", params![key])?;
        Ok(())
    }
}

fn initialize_schema(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS kv_entries (
            key        TEXT PRIMARY KEY,
            value      TEXT NOT NULL,
            updated_at BIGINT NOT NULL
        );
        "#,
    )?;
    Ok(())
}
