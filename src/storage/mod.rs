//! SQLite storage layer -- pool, schema, and the event store.

pub mod events;
pub mod schema;

pub use self::events::SqliteEventStore;

use anyhow::{Context, Result};
use r2d2::Pool as R2D2Pool;
use r2d2_sqlite::SqliteConnectionManager;
use thiserror::Error;

/// Connection Pool type
pub type Pool = R2D2Pool<SqliteConnectionManager>;

/// Failures surfaced by the storage medium. Never recovered locally.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("corrupt value in column '{column}': {value}")]
    Corrupt { column: &'static str, value: String },

    #[error("invalid event: {0}")]
    Invalid(String),
}

const PRAGMAS: &str = "PRAGMA journal_mode = WAL;
     PRAGMA synchronous = NORMAL;
     PRAGMA temp_store = MEMORY;
     PRAGMA busy_timeout = 5000;";

/// Open (or create) the SQLite database and return a connection pool.
pub fn open_pool(path: &str, max_size: u32) -> Result<Pool> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create database directory {}", parent.display()))?;
        }
    }

    let manager = SqliteConnectionManager::file(path).with_init(|c| c.execute_batch(PRAGMAS));
    let pool = R2D2Pool::builder()
        .max_size(max_size.max(1))
        .build(manager)
        .with_context(|| format!("failed to open database at {}", path))?;

    // Run migrations on a single connection
    let conn = pool.get()?;
    schema::migrate(&conn)?;

    Ok(pool)
}

/// Open a private in-memory database.
///
/// Every SQLite in-memory connection is its own database, so the pool is
/// capped at a single connection.
pub fn open_memory_pool() -> Result<Pool> {
    let manager = SqliteConnectionManager::memory();
    let pool = R2D2Pool::builder()
        .max_size(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .build(manager)?;

    let conn = pool.get()?;
    schema::migrate(&conn)?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_pool_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/events.db");
        let pool = open_pool(path.to_str().unwrap(), 2).unwrap();

        assert!(path.exists());
        let conn = pool.get().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_memory_pool_is_migrated() {
        let pool = open_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
