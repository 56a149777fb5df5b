//! # mnemo-context
//!
//! Decides, turn by turn, whether context from earlier work sessions should
//! be injected into an interactive response, and keeps that history
//! summarized in the background.
//!
//! - **Tracker**: [`SessionTracker`] detects session boundaries from
//!   activity signals with an ordered rule table
//! - **Scorer**: [`RelevanceScorer`] ranks candidate records on five
//!   weighted components
//! - **Summarizer**: [`ContextSummarizer`] compresses sessions into
//!   immediate, recent and historical tiers
//! - **Compressor**: [`ContextCompressor`] fits ranked records into a token
//!   budget, first fit by rank
//! - **Engine**: [`InjectionDecisionEngine`] ties the request path together
//!   under a latency budget
//! - **Worker**: [`spawn_summarizer`] summarizes closed sessions off the
//!   request path

#![deny(unsafe_code)]

pub mod compressor;
pub mod engine;
pub mod scorer;
pub mod signals;
pub mod summarizer;
pub mod threshold;
pub mod tracker;
pub mod worker;

mod text;

pub use compressor::{ContextCompressor, RenderForm, SelectedItem, Selection, SelectionOutcome};
pub use engine::{
    ConfidenceIndicators, Decision, DecisionReason, DecisionTrace, EngineDeps, InjectionDecisionEngine,
    InjectionPayload, SessionContext,
};
pub use scorer::{QueryContext, RelevanceScorer, ScoreBreakdown, ScoredRecord, type_weight};
pub use signals::ActivitySignals;
pub use summarizer::{ContextHierarchy, ContextSummarizer, SessionBundle};
pub use threshold::{FixedThreshold, SessionLengthThreshold, ThresholdStrategy, strategy_from_settings};
pub use tracker::{BoundaryDecision, BoundaryReason, SessionTracker, SignalObservation};
pub use worker::{SummarizerDeps, SummaryQueue, SummaryTask, Undelivered, spawn_summarizer};
