//! Summary repository, keyed by `(session_id, tier)`.

use mnemo_core::{SessionId, SessionSummary, SummaryTier, ThreadId};
use rusqlite::{Connection, OptionalExtension, params};

use super::{SessionRepo, parse_enum, parse_json, parse_ts, to_json, ts};
use crate::errors::Result;

const COLUMNS: &str = "session_id, tier, thread_id, heading, text, token_count,
    original_token_count, entries, conflicts, created_at";

/// Summary repository.
pub struct SummaryRepo;

impl SummaryRepo {
    /// Insert or replace the summary for `(session, tier)` and mirror its
    /// text onto the session row.
    pub fn upsert(conn: &Connection, summary: &SessionSummary) -> Result<()> {
        let tx = conn.unchecked_transaction()?;
        let _ = tx.execute(
            "INSERT INTO session_summaries
               (session_id, tier, thread_id, heading, text, token_count, original_token_count,
                entries, conflicts, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(session_id, tier) DO UPDATE SET
               thread_id = excluded.thread_id,
               heading = excluded.heading,
               text = excluded.text,
               token_count = excluded.token_count,
               original_token_count = excluded.original_token_count,
               entries = excluded.entries,
               conflicts = excluded.conflicts,
               created_at = excluded.created_at",
            params![
                summary.session_id.as_str(),
                summary.tier.as_str(),
                summary.thread_id.as_ref().map(ThreadId::as_str),
                summary.heading,
                summary.text,
                i64::try_from(summary.token_count).unwrap_or(i64::MAX),
                i64::try_from(summary.original_token_count).unwrap_or(i64::MAX),
                to_json(&summary.entries)?,
                to_json(&summary.conflicts)?,
                ts(&summary.created_at),
            ],
        )?;
        let _ = SessionRepo::set_summary_text(&tx, &summary.session_id, summary.tier, &summary.text)?;
        tx.commit()?;
        Ok(())
    }

    /// One tier of one session.
    pub fn get(
        conn: &Connection,
        session_id: &SessionId,
        tier: SummaryTier,
    ) -> Result<Option<SessionSummary>> {
        let row = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM session_summaries WHERE session_id = ?1 AND tier = ?2"),
                params![session_id.as_str(), tier.as_str()],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// All tiers of one session, immediate first.
    pub fn for_session(conn: &Connection, session_id: &SessionId) -> Result<Vec<SessionSummary>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM session_summaries WHERE session_id = ?1
             ORDER BY CASE tier WHEN 'immediate' THEN 0 WHEN 'recent' THEN 1 ELSE 2 END"
        ))?;
        let rows = stmt
            .query_map(params![session_id.as_str()], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionSummary> {
        let tier: String = row.get(1)?;
        let thread_id: Option<String> = row.get(2)?;
        let token_count: i64 = row.get(5)?;
        let original: i64 = row.get(6)?;
        let entries: String = row.get(7)?;
        let conflicts: String = row.get(8)?;
        let created_at: String = row.get(9)?;
        Ok(SessionSummary {
            session_id: SessionId::from_string(row.get(0)?),
            thread_id: thread_id.map(ThreadId::from_string),
            tier: parse_enum(1, &tier, SummaryTier::parse)?,
            heading: row.get(3)?,
            text: row.get(4)?,
            token_count: usize::try_from(token_count).unwrap_or_default(),
            original_token_count: usize::try_from(original).unwrap_or_default(),
            entries: parse_json(7, &entries)?,
            conflicts: parse_json(8, &conflicts)?,
            created_at: parse_ts(9, &created_at)?,
        })
    }
}
