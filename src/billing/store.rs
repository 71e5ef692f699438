//! Local key-value persistence for the usage ledger
//!
//! One string value per key, like a browser's per-origin storage.
//! The default store is a SQLite file under the app's config directory.

use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Could not determine data directory")]
    NoDataDir,
    #[error("Failed to create data directory: {0}")]
    CreateDir(#[from] std::io::Error),
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Failed to serialize value: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// String key-value storage
pub trait UsageStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Helper to acquire a mutex with poison recovery
fn acquire_lock<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    lock.lock().unwrap_or_else(|poisoned: PoisonError<MutexGuard<'_, T>>| {
        warn!("Mutex was poisoned, recovering inner value");
        poisoned.into_inner()
    })
}

/// SQLite-backed key-value store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Create or open `state.db` inside `data_dir`
    pub fn open(data_dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(data_dir)?;
        let db_path = data_dir.join("state.db");
        let conn = Connection::open(&db_path)?;
        debug!(path = %db_path.display(), "Opened state database");
        Self::with_connection(conn)
    }

    /// Open the store at the platform default location
    pub fn open_default() -> Result<Self, StoreError> {
        let dir = default_data_dir().ok_or(StoreError::NoDataDir)?;
        Self::open(&dir)
    }

    /// Volatile store, for tests and throwaway sessions
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
        "#,
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl UsageStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = acquire_lock(&self.conn);
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let conn = acquire_lock(&self.conn);
        conn.execute(
            r#"
            INSERT INTO kv (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![key, value, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let conn = acquire_lock(&self.conn);
        conn.execute("DELETE FROM kv WHERE key = ?", params![key])?;
        Ok(())
    }
}

/// In-process store
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UsageStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(acquire_lock(&self.values).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        acquire_lock(&self.values).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        acquire_lock(&self.values).remove(key);
        Ok(())
    }
}

/// ~/.config/costume-studio (or the platform equivalent)
pub fn default_data_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("costume-studio"))
}
