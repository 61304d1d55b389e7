//! Encrypted local record store.
//!
//! One SQLite row per record: `id` in clear, the bincode-encoded [`Record`]
//! sealed with the [`StoreKey`] and bound to its id. Nothing else about a
//! record is visible on disk.

use crate::crypto::{self, CryptoError, StoreKey};
use crate::record::Record;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use uuid::Uuid;

/// Errors from the local record store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Keyed store of records for a single user.
///
/// Assumes a single local writer; the connection is behind a mutex so the
/// store can be shared with the sync task.
pub struct RecordStore {
    conn: Mutex<Connection>,
    key: StoreKey,
}

impl RecordStore {
    /// Open (creating if needed) the store at `path`.
    pub fn open<P: AsRef<Path>>(path: P, key: StoreKey) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn, key)
    }

    /// Create a new in-memory store for testing
    pub fn in_memory(key: StoreKey) -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, key)
    }

    fn with_connection(conn: Connection, key: StoreKey) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS records (
                id TEXT PRIMARY KEY,
                sealed BLOB NOT NULL,
                updated_at INTEGER NOT NULL
             );",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            key,
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// All records, in no particular order, regardless of status.
    pub fn get_all(&self) -> Result<Vec<Record>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, sealed FROM records")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.iter()
            .map(|(id, sealed)| self.unseal(id, sealed))
            .collect()
    }

    /// Insert or replace the record with the same id.
    pub fn save(&self, record: &Record) -> Result<()> {
        let id = record.id.to_string();
        let encoded =
            bincode::serialize(record).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let sealed = crypto::seal(&self.key, id.as_bytes(), &encoded)?;

        self.conn()?.execute(
            "INSERT INTO records (id, sealed, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET sealed = excluded.sealed, updated_at = excluded.updated_at",
            params![id, sealed, chrono::Utc::now().timestamp()],
        )?;
        Ok(())
    }

    /// Look up one record. An unknown id is `Ok(None)`.
    pub fn get_by_id(&self, id: Uuid) -> Result<Option<Record>> {
        let id = id.to_string();
        let sealed: Option<Vec<u8>> = self
            .conn()?
            .query_row(
                "SELECT sealed FROM records WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;

        sealed.map(|sealed| self.unseal(&id, &sealed)).transpose()
    }

    pub fn exists(&self, id: Uuid) -> Result<bool> {
        let found: Option<i64> = self
            .conn()?
            .query_row(
                "SELECT 1 FROM records WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Physically remove a record. Removing an unknown id is a no-op.
    pub fn delete(&self, id: Uuid) -> Result<()> {
        self.conn()?
            .execute("DELETE FROM records WHERE id = ?1", params![id.to_string()])?;
        Ok(())
    }

    fn unseal(&self, id: &str, sealed: &[u8]) -> Result<Record> {
        let encoded = crypto::open(&self.key, id.as_bytes(), sealed)?;
        bincode::deserialize(&encoded).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}
