//! SQLite database handle
//!
//! One connection guarded by a mutex. Every mutation runs inside a single
//! `BEGIN IMMEDIATE` transaction: the write lock is taken up front, so a
//! check-then-act sequence cannot interleave with another writer, whether
//! that writer is another thread or another process on the same file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::{Connection, Transaction, TransactionBehavior};

use super::config::DatabaseConfig;
use super::schema;
use crate::domain::EngineResult;

/// Handle to the tracker database
pub struct Database {
    /// Path to the SQLite file (`None` for in-memory databases)
    path: Option<PathBuf>,

    conn: Mutex<Connection>,
}

impl Database {
    /// Opens (creating if needed) the database at `path`
    pub fn open(path: &Path, config: &DatabaseConfig) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory: {}", parent.display())
            })?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        // WAL lets readers proceed while a writer holds the lock
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        Self::init(conn, Some(path.to_path_buf()), config)
    }

    /// Opens a private in-memory database (tests, dry runs)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::init(conn, None, &DatabaseConfig::default())
    }

    fn init(mut conn: Connection, path: Option<PathBuf>, config: &DatabaseConfig) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;

        schema::ensure_schema(&mut conn).context("Failed to prepare database schema")?;

        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    /// Runs `f` inside one immediate write transaction.
    ///
    /// Commits when `f` returns `Ok`; any error rolls every write back.
    pub fn write<T>(&self, f: impl FnOnce(&Transaction<'_>) -> EngineResult<T>) -> EngineResult<T> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let value = f(&tx)?;
        tx.commit()?;

        Ok(value)
    }

    /// Runs a read-only closure against a consistent snapshot
    pub fn read<T>(&self, f: impl FnOnce(&Connection) -> EngineResult<T>) -> EngineResult<T> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;

        let value = f(&tx)?;
        tx.finish()?;

        Ok(value)
    }

    /// Returns the path to the database file
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns the schema version stored in the file
    pub fn schema_version(&self) -> Result<i32> {
        schema::schema_version(&self.conn.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EngineError;
    use rusqlite::params;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".rma").join("rma.db");

        let db = Database::open(&path, &DatabaseConfig::default()).unwrap();

        assert!(path.exists());
        assert_eq!(db.path(), Some(path.as_path()));
        assert_eq!(db.schema_version().unwrap(), schema::SCHEMA_VERSION);
    }

    #[test]
    fn test_failed_write_rolls_back() {
        let db = Database::open_in_memory().unwrap();

        let result: EngineResult<()> = db.write(|tx| {
            tx.execute("INSERT INTO categories (name) VALUES (?1)", params!["PSU"])?;
            Err(EngineError::CategoryNotFound("boom".into()))
        });
        assert!(result.is_err());

        let count: i64 = db
            .read(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM categories", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(count, 0);
    }
}
