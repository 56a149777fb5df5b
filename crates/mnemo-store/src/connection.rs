//! Pooled `SQLite` connections.
//!
//! Pragmas are applied on every acquire, so a repository call sees the same
//! settings whichever pooled connection it gets.

use std::path::PathBuf;
use std::time::Duration;

use r2d2::{CustomizeConnection, Pool};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::errors::Result;

/// Alias for the connection pool type.
pub type ConnectionPool = Pool<SqliteConnectionManager>;

/// Alias for a pooled connection.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

const BUSY_TIMEOUT_MS: u32 = 5_000;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the database lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Database {
    /// Private in-memory database. Each connection would get its own copy,
    /// so the pool is capped at one connection.
    Memory,
    /// File on disk, opened in WAL mode.
    File(PathBuf),
}

#[derive(Debug)]
struct Pragmas {
    wal: bool,
}

impl CustomizeConnection<Connection, rusqlite::Error> for Pragmas {
    fn on_acquire(&self, conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.busy_timeout(Duration::from_millis(u64::from(BUSY_TIMEOUT_MS)))?;
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA synchronous = NORMAL;")?;
        if self.wal {
            let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        }
        Ok(())
    }
}

/// Build a pool for `db`. `max_size` is ignored for [`Database::Memory`].
pub fn open_pool(db: &Database, max_size: u32) -> Result<ConnectionPool> {
    let (manager, max_size, wal) = match db {
        Database::Memory => (SqliteConnectionManager::memory(), 1, false),
        Database::File(path) => (SqliteConnectionManager::file(path), max_size.max(1), true),
    };
    let pool = Pool::builder()
        .max_size(max_size)
        .connection_timeout(ACQUIRE_TIMEOUT)
        .connection_customizer(Box::new(Pragmas { wal }))
        .build(manager)?;
    Ok(pool)
}
