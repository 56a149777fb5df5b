//! Narrow interfaces to external collaborators.
//!
//! The engine consumes records, similarity scores and thread structure from
//! services it does not own, and hands summaries and session snapshots back.
//! Every trait is object-safe so the engine can hold `Arc<dyn _>`.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::errors::Result;
use crate::ids::SessionId;
use crate::records::MemoryRecord;
use crate::session::{ContextThread, SessionRecord, SessionSummary};

/// What a turn is working on, as seen by the record store.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CandidateQuery {
    /// Files open in the current turn.
    pub files: BTreeSet<String>,
    /// Tags of the current turn.
    pub tags: BTreeSet<String>,
    /// Working directory, when known.
    pub working_directory: Option<String>,
    /// Maximum number of records to return.
    pub limit: usize,
}

/// Supplies stored records.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Candidate records for injection. Obsolete records may be included;
    /// the engine filters them.
    async fn candidates(&self, query: &CandidateQuery) -> Result<Vec<MemoryRecord>>;

    /// All records captured in one session, oldest first.
    async fn records_for_session(&self, session_id: &SessionId) -> Result<Vec<MemoryRecord>>;
}

/// Embedding-backed similarity search.
#[async_trait]
pub trait SimilarityRanker: Send + Sync {
    /// One similarity score per candidate, in candidate order.
    async fn rank(&self, query: &str, candidates: &[MemoryRecord]) -> Result<Vec<f64>>;
}

/// Relationship traversal over sessions and threads.
#[async_trait]
pub trait ThreadGraph: Send + Sync {
    /// The context thread a session belongs to, if any.
    async fn thread_for_session(&self, session_id: &SessionId) -> Result<Option<ContextThread>>;
}

/// Receives finished summaries.
#[async_trait]
pub trait SummarySink: Send + Sync {
    /// Persist a summary. Storing the same `(session, tier)` twice replaces
    /// the earlier one.
    async fn store_summary(&self, summary: &SessionSummary) -> Result<()>;
}

/// Receives session snapshots as sessions open, change and close.
#[async_trait]
pub trait SessionLog: Send + Sync {
    /// Upsert a snapshot keyed by session ID.
    async fn record_session(&self, session: &SessionRecord) -> Result<()>;
}
