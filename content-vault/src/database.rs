//! SQLite durable medium for vault slots
//!
//! One row per slot key, value stored as a JSON document.
//! Uses r2d2 connection pooling so reads never queue behind a mutex.

use crate::interface::VaultError;
use crate::slot::DurableMedium;
use chrono::Utc;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Thread-safe key/value table backed by SQLite
///
/// WAL mode lets readers proceed while a slot write is in flight.
pub struct SlotDatabase {
    pool: Pool<SqliteConnectionManager>,
}

impl SlotDatabase {
    /// Open or create a database at the given path, creating parent directories
    pub fn open<P: AsRef<Path>>(path: P) -> DatabaseResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch(
                "
                PRAGMA journal_mode=WAL;
                PRAGMA synchronous=NORMAL;
                PRAGMA busy_timeout=5000;
            ",
            )?;
            Ok(())
        });

        let pool = Pool::builder().max_size(4).build(manager)?;

        let db = Self { pool };
        db.setup_schema()?;
        Ok(db)
    }

    /// Open an in-memory database (tests and ephemeral sessions)
    pub fn open_in_memory() -> DatabaseResult<Self> {
        let manager = SqliteConnectionManager::memory();

        // In-memory needs a single connection that is never recycled
        let pool = Pool::builder()
            .max_size(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .build(manager)?;

        let db = Self { pool };
        db.setup_schema()?;
        Ok(db)
    }

    fn get_conn(&self) -> DatabaseResult<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    fn setup_schema(&self) -> DatabaseResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS slots (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL,
                updatedAt TEXT NOT NULL
            );
        "#,
        )?;
        Ok(())
    }

    /// Raw JSON stored under `key`, if any
    pub fn load_value(&self, key: &str) -> DatabaseResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row("SELECT value FROM slots WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    /// Insert or replace the raw JSON stored under `key`
    pub fn save_value(&self, key: &str, value: &str) -> DatabaseResult<()> {
        let conn = self.get_conn()?;
        let updated_at = Utc::now().format("%Y-%m-%d %H:%M:%S%.f").to_string();
        conn.execute(
            r#"INSERT INTO slots (key, value, updatedAt) VALUES (?1, ?2, ?3)
               ON CONFLICT(key) DO UPDATE SET value = excluded.value, updatedAt = excluded.updatedAt"#,
            params![key, value, updated_at],
        )?;
        Ok(())
    }

    /// Get the database size in bytes
    pub fn database_size(&self) -> DatabaseResult<i64> {
        let conn = self.get_conn()?;
        let page_count: i64 = conn.query_row("PRAGMA page_count", [], |row| row.get(0))?;
        let page_size: i64 = conn.query_row("PRAGMA page_size", [], |row| row.get(0))?;
        Ok(page_count * page_size)
    }
}

impl DurableMedium for SlotDatabase {
    fn load(&self, key: &str) -> Result<Option<String>, VaultError> {
        Ok(self.load_value(key)?)
    }

    fn save(&self, key: &str, value: &str) -> Result<(), VaultError> {
        Ok(self.save_value(key, value)?)
    }

    fn size_bytes(&self) -> Option<i64> {
        self.database_size().ok()
    }
}
