//! Record repository over the append-only `memory_records` table.

use std::collections::BTreeSet;

use mnemo_core::{MemoryRecord, RecordId, RecordKind, RecordStatus, SessionId};
use rusqlite::{Connection, OptionalExtension, params};

use super::{parse_enum, parse_json, parse_ts, to_json, ts};
use crate::errors::Result;

const COLUMNS: &str = "id, kind, content, reasoning, files, tags, timestamp, author, session_id, status";

/// Record repository. Records are inserted once; afterwards only their
/// status can change. The schema enforces this with triggers.
pub struct RecordRepo;

impl RecordRepo {
    /// Append a record. Appending an existing ID is a no-op.
    pub fn insert(conn: &Connection, record: &MemoryRecord) -> Result<bool> {
        let changed = conn.execute(
            "INSERT OR IGNORE INTO memory_records
               (id, kind, content, reasoning, files, tags, timestamp, author, session_id,
                status, appended_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                record.id.as_str(),
                record.kind.as_str(),
                record.content,
                record.reasoning,
                to_json(&record.files)?,
                to_json(&record.tags)?,
                ts(&record.timestamp),
                record.author,
                record.session_id.as_ref().map(SessionId::as_str),
                record.status.as_str(),
                ts(&chrono::Utc::now()),
            ],
        )?;
        Ok(changed > 0)
    }

    /// Change a record's status. Returns whether the record exists.
    pub fn set_status(conn: &Connection, id: &RecordId, status: RecordStatus) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE memory_records SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id.as_str()],
        )?;
        Ok(changed > 0)
    }

    /// Fetch one record.
    pub fn get(conn: &Connection, id: &RecordId) -> Result<Option<MemoryRecord>> {
        let row = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM memory_records WHERE id = ?1"),
                params![id.as_str()],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Newest non-obsolete records.
    pub fn live_recent(conn: &Connection, limit: usize) -> Result<Vec<MemoryRecord>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM memory_records
             WHERE status != 'obsolete'
             ORDER BY timestamp DESC, id DESC
             LIMIT ?1"
        ))?;
        let rows = stmt
            .query_map(params![i64::try_from(limit).unwrap_or(i64::MAX)], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Newest non-obsolete records that share a file or a tag with the
    /// given sets, regardless of age.
    pub fn live_touching(
        conn: &Connection,
        files: &BTreeSet<String>,
        tags: &BTreeSet<String>,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>> {
        if files.is_empty() && tags.is_empty() {
            return Ok(Vec::new());
        }
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM memory_records
             WHERE status != 'obsolete'
               AND (EXISTS (SELECT 1 FROM json_each(memory_records.files) AS f
                            WHERE f.value IN (SELECT value FROM json_each(?1)))
                 OR EXISTS (SELECT 1 FROM json_each(memory_records.tags) AS t
                            WHERE t.value IN (SELECT value FROM json_each(?2))))
             ORDER BY timestamp DESC, id DESC
             LIMIT ?3"
        ))?;
        let rows = stmt
            .query_map(
                params![
                    to_json(files)?,
                    to_json(tags)?,
                    i64::try_from(limit).unwrap_or(i64::MAX)
                ],
                Self::map_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Every record of one session, oldest first.
    pub fn for_session(conn: &Connection, session_id: &SessionId) -> Result<Vec<MemoryRecord>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM memory_records
             WHERE session_id = ?1
             ORDER BY timestamp ASC, id ASC"
        ))?;
        let rows = stmt
            .query_map(params![session_id.as_str()], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Total number of records, obsolete included.
    pub fn count(conn: &Connection) -> Result<u64> {
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM memory_records", [], |r| r.get(0))?;
        Ok(u64::try_from(n).unwrap_or_default())
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MemoryRecord> {
        let kind: String = row.get(1)?;
        let files: String = row.get(4)?;
        let tags: String = row.get(5)?;
        let timestamp: String = row.get(6)?;
        let session_id: Option<String> = row.get(8)?;
        let status: String = row.get(9)?;
        Ok(MemoryRecord {
            id: RecordId::from_string(row.get(0)?),
            kind: parse_enum(1, &kind, RecordKind::parse)?,
            content: row.get(2)?,
            reasoning: row.get(3)?,
            files: parse_json(4, &files)?,
            tags: parse_json(5, &tags)?,
            timestamp: parse_ts(6, &timestamp)?,
            author: row.get(7)?,
            session_id: session_id.map(SessionId::from_string),
            status: parse_enum(9, &status, RecordStatus::parse)?,
        })
    }
}
