//! Context thread repository over `context_threads` and `thread_sessions`.

use mnemo_core::{ContextThread, SessionId, ThreadId, ThreadStatus};
use rusqlite::{Connection, OptionalExtension, params};

use super::{SessionRepo, parse_enum, parse_json, parse_ts, to_json, ts};
use crate::errors::{Result, StoreError};

const COLUMNS: &str = "id, theme, key_decisions, status, created_at, updated_at";

/// Context thread repository.
pub struct ThreadRepo;

impl ThreadRepo {
    /// Insert or replace a thread together with its session membership.
    ///
    /// A session listed here is moved out of any other thread.
    pub fn upsert(conn: &Connection, thread: &ContextThread) -> Result<()> {
        let tx = conn.unchecked_transaction()?;
        let _ = tx.execute(
            "INSERT INTO context_threads (id, theme, key_decisions, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
               theme = excluded.theme,
               key_decisions = excluded.key_decisions,
               status = excluded.status,
               updated_at = excluded.updated_at",
            params![
                thread.id.as_str(),
                thread.theme,
                to_json(&thread.key_decisions)?,
                thread.status.as_str(),
                ts(&thread.created_at),
                ts(&thread.updated_at),
            ],
        )?;
        let _ = tx.execute(
            "DELETE FROM thread_sessions WHERE thread_id = ?1",
            params![thread.id.as_str()],
        )?;
        for (position, session_id) in thread.session_ids.iter().enumerate() {
            Self::insert_member(&tx, &thread.id, session_id, i64::try_from(position).unwrap_or(i64::MAX))?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Append a session to an existing thread.
    pub fn link_session(conn: &Connection, thread_id: &ThreadId, session_id: &SessionId) -> Result<()> {
        let tx = conn.unchecked_transaction()?;
        let exists: Option<String> = tx
            .query_row(
                "SELECT id FROM context_threads WHERE id = ?1",
                params![thread_id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(StoreError::NotFound(format!("thread {thread_id}")));
        }

        let next: i64 = tx.query_row(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM thread_sessions WHERE thread_id = ?1",
            params![thread_id.as_str()],
            |row| row.get(0),
        )?;
        Self::insert_member(&tx, thread_id, session_id, next)?;
        let _ = tx.execute(
            "UPDATE context_threads SET updated_at = ?1 WHERE id = ?2",
            params![ts(&chrono::Utc::now()), thread_id.as_str()],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Fetch one thread with its sessions.
    pub fn get(conn: &Connection, id: &ThreadId) -> Result<Option<ContextThread>> {
        let thread = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM context_threads WHERE id = ?1"),
                params![id.as_str()],
                Self::map_row,
            )
            .optional()?;
        match thread {
            Some(mut thread) => {
                thread.session_ids = Self::members(conn, &thread.id)?;
                Ok(Some(thread))
            }
            None => Ok(None),
        }
    }

    /// The thread a session belongs to.
    pub fn for_session(conn: &Connection, session_id: &SessionId) -> Result<Option<ContextThread>> {
        let thread_id: Option<String> = conn
            .query_row(
                "SELECT thread_id FROM thread_sessions WHERE session_id = ?1",
                params![session_id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        match thread_id {
            Some(id) => Self::get(conn, &ThreadId::from_string(id)),
            None => Ok(None),
        }
    }

    /// Threads that are neither completed nor dormant, most recently
    /// updated first.
    pub fn active(conn: &Connection, limit: usize) -> Result<Vec<ContextThread>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM context_threads
             WHERE status IN ('active', 'in_progress', 'blocked')
             ORDER BY updated_at DESC LIMIT ?1"
        ))?;
        let mut threads = stmt
            .query_map(params![i64::try_from(limit).unwrap_or(i64::MAX)], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        for thread in &mut threads {
            thread.session_ids = Self::members(conn, &thread.id)?;
        }
        Ok(threads)
    }

    fn insert_member(
        conn: &Connection,
        thread_id: &ThreadId,
        session_id: &SessionId,
        position: i64,
    ) -> Result<()> {
        let _ = conn.execute(
            "INSERT INTO thread_sessions (thread_id, session_id, position)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(session_id) DO UPDATE SET
               thread_id = excluded.thread_id,
               position = excluded.position",
            params![thread_id.as_str(), session_id.as_str(), position],
        )?;
        let _ = SessionRepo::set_thread(conn, session_id, thread_id)?;
        Ok(())
    }

    fn members(conn: &Connection, thread_id: &ThreadId) -> Result<Vec<SessionId>> {
        let mut stmt = conn.prepare(
            "SELECT session_id FROM thread_sessions WHERE thread_id = ?1 ORDER BY position ASC",
        )?;
        let ids = stmt
            .query_map(params![thread_id.as_str()], |row| {
                row.get::<_, String>(0).map(SessionId::from_string)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ContextThread> {
        let decisions: String = row.get(2)?;
        let status: String = row.get(3)?;
        let created_at: String = row.get(4)?;
        let updated_at: String = row.get(5)?;
        Ok(ContextThread {
            id: ThreadId::from_string(row.get(0)?),
            theme: row.get(1)?,
            session_ids: Vec::new(),
            key_decisions: parse_json(2, &decisions)?,
            status: parse_enum(3, &status, ThreadStatus::parse)?,
            created_at: parse_ts(4, &created_at)?,
            updated_at: parse_ts(5, &updated_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Utc;

    use super::*;
    use crate::migrations::run_migrations;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        let _ = run_migrations(&conn).unwrap();
        conn
    }

    fn thread(theme: &str, sessions: &[&str], status: ThreadStatus) -> ContextThread {
        ContextThread {
            id: ThreadId::new(),
            theme: theme.to_string(),
            session_ids: sessions.iter().map(|s| SessionId::from(*s)).collect(),
            key_decisions: vec!["use sqlite".to_string()],
            status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn upsert_and_lookup_by_session() {
        let conn = conn();
        let t = thread("auth", &["s1", "s2"], ThreadStatus::Active);
        ThreadRepo::upsert(&conn, &t).unwrap();

        let found = ThreadRepo::for_session(&conn, &SessionId::from("s2")).unwrap().unwrap();
        assert_eq!(found.id, t.id);
        assert_eq!(found.session_ids, t.session_ids);
        assert_eq!(found.key_decisions, vec!["use sqlite"]);
        assert!(ThreadRepo::for_session(&conn, &SessionId::from("s9")).unwrap().is_none());
    }

    #[test]
    fn session_moves_between_threads() {
        let conn = conn();
        let a = thread("a", &["s1"], ThreadStatus::Active);
        let b = thread("b", &["s1"], ThreadStatus::Active);
        ThreadRepo::upsert(&conn, &a).unwrap();
        ThreadRepo::upsert(&conn, &b).unwrap();

        let owner = ThreadRepo::for_session(&conn, &SessionId::from("s1")).unwrap().unwrap();
        assert_eq!(owner.id, b.id);
        assert!(ThreadRepo::get(&conn, &a.id).unwrap().unwrap().session_ids.is_empty());
    }

    #[test]
    fn link_appends_in_order() {
        let conn = conn();
        let t = thread("auth", &["s1"], ThreadStatus::Active);
        ThreadRepo::upsert(&conn, &t).unwrap();
        ThreadRepo::link_session(&conn, &t.id, &SessionId::from("s2")).unwrap();

        let loaded = ThreadRepo::get(&conn, &t.id).unwrap().unwrap();
        let ids: Vec<_> = loaded.session_ids.iter().map(SessionId::as_str).collect();
        assert_eq!(ids, vec!["s1", "s2"]);
    }

    #[test]
    fn link_to_missing_thread_fails() {
        let conn = conn();
        let result = ThreadRepo::link_session(&conn, &ThreadId::from("nope"), &SessionId::from("s1"));
        assert_matches!(result, Err(StoreError::NotFound(_)));
    }

    #[test]
    fn active_excludes_finished_threads() {
        let conn = conn();
        ThreadRepo::upsert(&conn, &thread("live", &["s1"], ThreadStatus::Blocked)).unwrap();
        ThreadRepo::upsert(&conn, &thread("done", &["s2"], ThreadStatus::Completed)).unwrap();
        ThreadRepo::upsert(&conn, &thread("old", &["s3"], ThreadStatus::Dormant)).unwrap();

        let active = ThreadRepo::active(&conn, 10).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].theme, "live");
    }
}
