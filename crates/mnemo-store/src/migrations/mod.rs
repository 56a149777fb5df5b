//! Embedded schema migrations.
//!
//! The applied version is kept in `PRAGMA user_version`. Each pending step
//! runs in its own transaction together with the version bump, so a failed
//! step leaves the previous version in place.

use rusqlite::Connection;
use tracing::info;

use crate::errors::{Result, StoreError};

/// `(version, description, sql)`, ascending by version.
const STEPS: &[(u32, &str, &str)] = &[(
    1,
    "records, sessions, summaries, threads",
    include_str!("v001_schema.sql"),
)];

/// Apply all pending migrations. Returns how many ran.
pub fn run_migrations(conn: &Connection) -> Result<u32> {
    let from = schema_version(conn)?;
    let mut ran = 0;
    for &(version, description, sql) in STEPS.iter().filter(|(v, ..)| *v > from) {
        info!(version, description, "applying migration");
        let fail = |e: rusqlite::Error| StoreError::Migration {
            message: format!("v{version} ({description}): {e}"),
        };
        let tx = conn.unchecked_transaction().map_err(fail)?;
        tx.execute_batch(sql).map_err(fail)?;
        tx.pragma_update(None, "user_version", version).map_err(fail)?;
        tx.commit().map_err(fail)?;
        ran += 1;
    }
    Ok(ran)
}

/// Version recorded in the database, 0 when fresh.
pub fn schema_version(conn: &Connection) -> Result<u32> {
    Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
}

/// Newest version this build knows about.
pub fn latest_version() -> u32 {
    STEPS.last().map_or(0, |&(v, ..)| v)
}
