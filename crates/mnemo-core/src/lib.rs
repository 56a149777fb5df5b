//! # mnemo-core
//!
//! Shared vocabulary for the continuity engine.
//!
//! - **IDs**: branded newtypes ([`RecordId`], [`SessionId`], [`ThreadId`])
//! - **Records**: the append-only [`MemoryRecord`] and its kind/status enums
//! - **Sessions**: [`SessionRecord`], [`ContextThread`], and [`SessionSummary`]
//! - **Tokens**: the deterministic [`estimate_tokens`] cost function
//! - **Similarity**: Jaccard helpers over file, tag, and word sets
//! - **Collaborators**: async traits for the record store, similarity search,
//!   thread graph, and summary sink
//! - **Errors**: [`ContinuityError`] shared by every crate above this one

#![deny(unsafe_code)]

pub mod collaborators;
pub mod errors;
pub mod ids;
pub mod records;
pub mod session;
pub mod similarity;
pub mod tags;
pub mod tokens;

pub use collaborators::{
    CandidateQuery, RecordSource, SessionLog, SimilarityRanker, SummarySink, ThreadGraph,
};
pub use errors::{ContinuityError, Result};
pub use ids::{RecordId, SessionId, ThreadId};
pub use records::{KindFamily, MemoryRecord, RecordKind, RecordStatus, TopicKey};
pub use session::{
    ContextThread, SessionRecord, SessionSummary, SummaryEntry, SummaryTier, SummaryTiers,
    Supersession, ThreadStatus,
};
pub use similarity::{jaccard, lowercase_set, text_similarity, word_set};
pub use tags::infer_tags;
pub use tokens::{CHARS_PER_TOKEN, estimate_tokens};
