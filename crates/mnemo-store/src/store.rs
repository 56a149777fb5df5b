//! [`ContinuityStore`]: pooled facade over the repositories.
//!
//! Besides its own typed API the store implements the engine's collaborator
//! traits, so one instance can serve as record source, thread graph,
//! summary sink, and session log. The trait methods run their queries on
//! tokio's blocking pool.

use std::collections::{BTreeSet, HashSet};

use async_trait::async_trait;
use mnemo_core::collaborators::CandidateQuery;
use mnemo_core::{
    ContextThread, ContinuityError, MemoryRecord, RecordId, RecordSource, RecordStatus, SessionId,
    SessionLog, SessionRecord, SessionSummary, SummarySink, SummaryTier, ThreadGraph, ThreadId,
};
use mnemo_settings::StorageSettings;
use rusqlite::Connection;
use tracing::{debug, info};

use crate::connection::{ConnectionPool, Database, PooledConnection, open_pool};
use crate::errors::Result;
use crate::migrations::run_migrations;
use crate::repositories::{RecordRepo, SessionRepo, SummaryRepo, ThreadRepo};

/// Durable store for records, sessions, summaries, and threads.
#[derive(Clone)]
pub struct ContinuityStore {
    pool: ConnectionPool,
    candidate_limit: usize,
}

impl ContinuityStore {
    /// Wrap an existing pool whose schema is already migrated.
    pub fn new(pool: ConnectionPool, candidate_limit: usize) -> Self {
        Self {
            pool,
            candidate_limit,
        }
    }

    /// Open (creating if needed) the database described by `settings` and
    /// apply pending migrations.
    pub fn open(settings: &StorageSettings) -> Result<Self> {
        let path = settings.resolved_db_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let pool = open_pool(&Database::File(path.clone()), settings.pool_size)?;
        let applied = run_migrations(&*pool.get()?)?;
        info!(path = %path.display(), applied, "continuity store opened");
        Ok(Self::new(pool, settings.candidate_limit))
    }

    /// Fresh in-memory store, migrated.
    pub fn in_memory() -> Result<Self> {
        let pool = open_pool(&Database::Memory, 1)?;
        let _ = run_migrations(&*pool.get()?)?;
        Ok(Self::new(pool, StorageSettings::default().candidate_limit))
    }

    fn with_conn<T>(&self, op: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn: PooledConnection = self.pool.get()?;
        op(&conn)
    }

    /// Run `op` on the blocking pool so a busy database never stalls the
    /// async caller; the caller's timeouts keep working.
    async fn off_runtime<T, F>(&self, what: &'static str, op: F) -> mnemo_core::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&ContinuityStore) -> Result<T> + Send + 'static,
    {
        let store = self.clone();
        match tokio::task::spawn_blocking(move || op(&store)).await {
            Ok(result) => Ok(result?),
            Err(e) => Err(ContinuityError::Store(format!("{what} task failed: {e}"))),
        }
    }

    // ── Records ─────────────────────────────────────────────────────

    /// Append a record to the log. Returns `false` if the ID was already
    /// present.
    pub fn append_record(&self, record: &MemoryRecord) -> Result<bool> {
        let inserted = self.with_conn(|conn| RecordRepo::insert(conn, record))?;
        debug!(record_id = %record.id, kind = record.kind.as_str(), inserted, "record appended");
        Ok(inserted)
    }

    /// Change a record's status; the only mutation the log allows.
    pub fn mark_status(&self, id: &RecordId, status: RecordStatus) -> Result<bool> {
        self.with_conn(|conn| RecordRepo::set_status(conn, id, status))
    }

    /// Fetch one record.
    pub fn record(&self, id: &RecordId) -> Result<Option<MemoryRecord>> {
        self.with_conn(|conn| RecordRepo::get(conn, id))
    }

    /// Newest non-obsolete records.
    pub fn live_records(&self, limit: usize) -> Result<Vec<MemoryRecord>> {
        self.with_conn(|conn| RecordRepo::live_recent(conn, limit))
    }

    /// Candidate set for a turn: the newest `limit` live records plus up
    /// to `limit` older live records sharing a file or tag with the turn.
    pub fn candidate_records(
        &self,
        files: &BTreeSet<String>,
        tags: &BTreeSet<String>,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>> {
        self.with_conn(|conn| {
            let mut records = RecordRepo::live_recent(conn, limit)?;
            let mut seen: HashSet<RecordId> = records.iter().map(|r| r.id.clone()).collect();
            for record in RecordRepo::live_touching(conn, files, tags, limit)? {
                if seen.insert(record.id.clone()) {
                    records.push(record);
                }
            }
            Ok(records)
        })
    }

    /// Records captured in one session, oldest first.
    pub fn session_records(&self, session_id: &SessionId) -> Result<Vec<MemoryRecord>> {
        self.with_conn(|conn| RecordRepo::for_session(conn, session_id))
    }

    // ── Sessions ────────────────────────────────────────────────────

    /// Insert or update a session snapshot.
    pub fn upsert_session(&self, session: &SessionRecord) -> Result<()> {
        self.with_conn(|conn| SessionRepo::upsert(conn, session))
    }

    /// Fetch one session.
    pub fn session(&self, id: &SessionId) -> Result<Option<SessionRecord>> {
        self.with_conn(|conn| SessionRepo::get(conn, id))
    }

    /// Latest session started in `dir`; seeds the tracker after a restart.
    pub fn last_session_for_dir(&self, dir: &str) -> Result<Option<SessionRecord>> {
        self.with_conn(|conn| SessionRepo::latest_for_dir(conn, dir))
    }

    /// Most recently started sessions.
    pub fn recent_sessions(&self, limit: usize) -> Result<Vec<SessionRecord>> {
        self.with_conn(|conn| SessionRepo::recent(conn, limit))
    }

    // ── Summaries ───────────────────────────────────────────────────

    /// Insert or replace a summary.
    pub fn put_summary(&self, summary: &SessionSummary) -> Result<()> {
        self.with_conn(|conn| SummaryRepo::upsert(conn, summary))
    }

    /// One tier of one session.
    pub fn summary(&self, session_id: &SessionId, tier: SummaryTier) -> Result<Option<SessionSummary>> {
        self.with_conn(|conn| SummaryRepo::get(conn, session_id, tier))
    }

    /// All stored tiers of one session.
    pub fn summaries_for_session(&self, session_id: &SessionId) -> Result<Vec<SessionSummary>> {
        self.with_conn(|conn| SummaryRepo::for_session(conn, session_id))
    }

    // ── Threads ─────────────────────────────────────────────────────

    /// Insert or replace a thread and its membership.
    pub fn upsert_thread(&self, thread: &ContextThread) -> Result<()> {
        self.with_conn(|conn| ThreadRepo::upsert(conn, thread))
    }

    /// Append a session to a thread.
    pub fn link_session(&self, thread_id: &ThreadId, session_id: &SessionId) -> Result<()> {
        self.with_conn(|conn| ThreadRepo::link_session(conn, thread_id, session_id))
    }

    /// Fetch one thread.
    pub fn thread(&self, id: &ThreadId) -> Result<Option<ContextThread>> {
        self.with_conn(|conn| ThreadRepo::get(conn, id))
    }

    /// Threads still in play.
    pub fn active_threads(&self, limit: usize) -> Result<Vec<ContextThread>> {
        self.with_conn(|conn| ThreadRepo::active(conn, limit))
    }
}

#[async_trait]
impl RecordSource for ContinuityStore {
    async fn candidates(&self, query: &CandidateQuery) -> mnemo_core::Result<Vec<MemoryRecord>> {
        let limit = if query.limit == 0 {
            self.candidate_limit
        } else {
            query.limit.min(self.candidate_limit)
        };
        let files = query.files.clone();
        let tags = query.tags.clone();
        self.off_runtime("candidates", move |store| {
            store.candidate_records(&files, &tags, limit)
        })
        .await
    }

    async fn records_for_session(
        &self,
        session_id: &SessionId,
    ) -> mnemo_core::Result<Vec<MemoryRecord>> {
        let session_id = session_id.clone();
        self.off_runtime("records_for_session", move |store| {
            store.session_records(&session_id)
        })
        .await
    }
}

#[async_trait]
impl ThreadGraph for ContinuityStore {
    async fn thread_for_session(
        &self,
        session_id: &SessionId,
    ) -> mnemo_core::Result<Option<ContextThread>> {
        let session_id = session_id.clone();
        self.off_runtime("thread_for_session", move |store| {
            store.with_conn(|conn| ThreadRepo::for_session(conn, &session_id))
        })
        .await
    }
}

#[async_trait]
impl SummarySink for ContinuityStore {
    async fn store_summary(&self, summary: &SessionSummary) -> mnemo_core::Result<()> {
        let summary = summary.clone();
        self.off_runtime("store_summary", move |store| store.put_summary(&summary))
            .await
    }
}

#[async_trait]
impl SessionLog for ContinuityStore {
    async fn record_session(&self, session: &SessionRecord) -> mnemo_core::Result<()> {
        let session = session.clone();
        self.off_runtime("record_session", move |store| store.upsert_session(&session))
            .await
    }
}
