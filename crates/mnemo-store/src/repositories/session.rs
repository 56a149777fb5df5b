//! Session repository over the keyed `sessions` table.

use mnemo_core::{SessionId, SessionRecord, SummaryTier, SummaryTiers, ThreadId};
use rusqlite::{Connection, OptionalExtension, params};

use super::{parse_json, parse_opt_ts, parse_ts, to_json, ts};
use crate::errors::Result;

const COLUMNS: &str = "id, start_time, end_time, last_activity_at, branch, working_directory,
    active_files, file_access_counts, continuity_score, summary_immediate, summary_recent,
    summary_historical, thread_id";

/// Session repository.
pub struct SessionRepo;

impl SessionRepo {
    /// Insert or replace a session snapshot.
    ///
    /// Summary text columns are only overwritten by non-null values, so a
    /// tracker snapshot never erases summaries written by the worker.
    pub fn upsert(conn: &Connection, session: &SessionRecord) -> Result<()> {
        let _ = conn.execute(
            "INSERT INTO sessions
               (id, start_time, end_time, last_activity_at, branch, working_directory,
                active_files, file_access_counts, continuity_score, summary_immediate,
                summary_recent, summary_historical, thread_id, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
             ON CONFLICT(id) DO UPDATE SET
               end_time = excluded.end_time,
               last_activity_at = excluded.last_activity_at,
               branch = excluded.branch,
               working_directory = excluded.working_directory,
               active_files = excluded.active_files,
               file_access_counts = excluded.file_access_counts,
               continuity_score = excluded.continuity_score,
               summary_immediate = COALESCE(excluded.summary_immediate, sessions.summary_immediate),
               summary_recent = COALESCE(excluded.summary_recent, sessions.summary_recent),
               summary_historical = COALESCE(excluded.summary_historical, sessions.summary_historical),
               thread_id = COALESCE(excluded.thread_id, sessions.thread_id),
               updated_at = excluded.updated_at",
            params![
                session.id.as_str(),
                ts(&session.start_time),
                session.end_time.as_ref().map(ts),
                ts(&session.last_activity_at),
                session.branch,
                session.working_directory,
                to_json(&session.active_files)?,
                to_json(&session.file_access_counts)?,
                session.continuity_score,
                session.summaries.immediate,
                session.summaries.recent,
                session.summaries.historical,
                session.thread_id.as_ref().map(ThreadId::as_str),
                ts(&chrono::Utc::now()),
            ],
        )?;
        Ok(())
    }

    /// Fetch one session.
    pub fn get(conn: &Connection, id: &SessionId) -> Result<Option<SessionRecord>> {
        let row = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM sessions WHERE id = ?1"),
                params![id.as_str()],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Most recently started session in a working directory.
    pub fn latest_for_dir(conn: &Connection, dir: &str) -> Result<Option<SessionRecord>> {
        let row = conn
            .query_row(
                &format!(
                    "SELECT {COLUMNS} FROM sessions WHERE working_directory = ?1
                     ORDER BY start_time DESC LIMIT 1"
                ),
                params![dir],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Most recently started sessions, newest first.
    pub fn recent(conn: &Connection, limit: usize) -> Result<Vec<SessionRecord>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM sessions ORDER BY start_time DESC LIMIT ?1"
        ))?;
        let rows = stmt
            .query_map(params![i64::try_from(limit).unwrap_or(i64::MAX)], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Store rendered summary text on the session row, if the row exists.
    pub fn set_summary_text(
        conn: &Connection,
        id: &SessionId,
        tier: SummaryTier,
        text: &str,
    ) -> Result<bool> {
        let sql = match tier {
            SummaryTier::Immediate => "UPDATE sessions SET summary_immediate = ?1 WHERE id = ?2",
            SummaryTier::Recent => "UPDATE sessions SET summary_recent = ?1 WHERE id = ?2",
            SummaryTier::Historical => "UPDATE sessions SET summary_historical = ?1 WHERE id = ?2",
        };
        let changed = conn.execute(sql, params![text, id.as_str()])?;
        Ok(changed > 0)
    }

    /// Point a session at a thread, if the row exists.
    pub fn set_thread(conn: &Connection, id: &SessionId, thread_id: &ThreadId) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE sessions SET thread_id = ?1 WHERE id = ?2",
            params![thread_id.as_str(), id.as_str()],
        )?;
        Ok(changed > 0)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRecord> {
        let start: String = row.get(1)?;
        let end: Option<String> = row.get(2)?;
        let last: String = row.get(3)?;
        let files: String = row.get(6)?;
        let counts: String = row.get(7)?;
        let thread_id: Option<String> = row.get(12)?;
        Ok(SessionRecord {
            id: SessionId::from_string(row.get(0)?),
            start_time: parse_ts(1, &start)?,
            end_time: parse_opt_ts(2, end.as_deref())?,
            last_activity_at: parse_ts(3, &last)?,
            branch: row.get(4)?,
            working_directory: row.get(5)?,
            active_files: parse_json(6, &files)?,
            file_access_counts: parse_json(7, &counts)?,
            continuity_score: row.get(8)?,
            summaries: SummaryTiers {
                immediate: row.get(9)?,
                recent: row.get(10)?,
                historical: row.get(11)?,
            },
            thread_id: thread_id.map(ThreadId::from_string),
        })
    }
}
