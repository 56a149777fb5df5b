//! Per-turn injection decisions.
//!
//! [`InjectionDecisionEngine::decide`] runs the request path for one turn:
//!
//! 1. boundary detection on the open session
//! 2. candidate fetch and optional semantic similarity
//! 3. relevance ranking
//! 4. confidence from four indicators, gated by the threshold strategy
//! 5. budgeted compression of the qualifying candidates
//!
//! The whole pipeline runs under `latencyBudgetMs` and every collaborator
//! call under `collaboratorTimeoutMs`. A failing or slow collaborator only
//! removes its own contribution; `decide` itself never fails.

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use mnemo_core::{
    CandidateQuery, ContinuityError, MemoryRecord, RecordSource, SessionId, SessionLog,
    SessionRecord, SimilarityRanker,
};
use mnemo_settings::{ContinuitySettings, InjectionSettings};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::compressor::{ContextCompressor, SelectedItem, SelectionOutcome};
use crate::scorer::{QueryContext, RelevanceScorer, ScoredRecord};
use crate::signals::ActivitySignals;
use crate::threshold::{ThresholdStrategy, strategy_from_settings};
use crate::tracker::{BoundaryReason, SessionTracker, SignalObservation};
use crate::worker::SummaryQueue;

const FILE_CONTINUITY_POINTS: f64 = 0.4;
const GAP_POINTS: f64 = 0.3;
const RICHNESS_POINTS: f64 = 0.2;
const PROJECT_POINTS: f64 = 0.1;

/// Everything the engine knows about the current turn.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionContext {
    /// Activity signals of the turn.
    pub signals: ActivitySignals,
    /// Free text for semantic similarity, such as the user's prompt.
    pub query_text: Option<String>,
    /// Explicit tags, in addition to those inferred from file paths.
    pub tags: BTreeSet<String>,
}

impl SessionContext {
    /// Context from signals alone.
    #[must_use]
    pub fn new(signals: ActivitySignals) -> Self {
        Self {
            signals,
            query_text: None,
            tags: BTreeSet::new(),
        }
    }

    /// Attach query text.
    #[must_use]
    pub fn with_query(mut self, text: impl Into<String>) -> Self {
        self.query_text = Some(text.into());
        self
    }

    /// Attach tags.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }
}

/// Collaborators used on the request path.
#[derive(Clone)]
pub struct EngineDeps {
    /// Candidate records.
    pub records: Arc<dyn RecordSource>,
    /// Semantic similarity. Optional.
    pub similarity: Option<Arc<dyn SimilarityRanker>>,
    /// Receives session snapshots. Optional.
    pub sessions: Option<Arc<dyn SessionLog>>,
}

impl EngineDeps {
    /// Dependencies with only a record source.
    #[must_use]
    pub fn new(records: Arc<dyn RecordSource>) -> Self {
        Self {
            records,
            similarity: None,
            sessions: None,
        }
    }

    /// Add a similarity collaborator.
    #[must_use]
    pub fn with_similarity(mut self, similarity: Arc<dyn SimilarityRanker>) -> Self {
        self.similarity = Some(similarity);
        self
    }

    /// Add a session log.
    #[must_use]
    pub fn with_session_log(mut self, sessions: Arc<dyn SessionLog>) -> Self {
        self.sessions = Some(sessions);
        self
    }
}

/// Why a decision came out the way it did.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionReason {
    /// Context was injected.
    Injected,
    /// Confidence stayed below the threshold.
    BelowThreshold,
    /// No candidate reached the minimum score.
    NoCandidates,
    /// Candidates existed but none fit the token budget.
    BudgetTooSmall,
    /// The latency budget ran out.
    Timeout,
}

impl DecisionReason {
    /// Stable string form used in logs and traces.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Injected => "INJECTED",
            Self::BelowThreshold => "BELOW_THRESHOLD",
            Self::NoCandidates => "NO_CANDIDATES",
            Self::BudgetTooSmall => "BUDGET_TOO_SMALL",
            Self::Timeout => "TIMEOUT",
        }
    }
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which confidence indicators fired.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceIndicators {
    /// File overlap with the reference session above the threshold (+0.4).
    pub file_continuity: bool,
    /// Idle gap within the configured window (+0.3).
    pub gap_appropriate: bool,
    /// Enough qualifying candidates with a high enough top score (+0.2).
    pub richness: bool,
    /// Branch and directory both known and unchanged (+0.1).
    pub project_continuity: bool,
}

impl ConfidenceIndicators {
    /// Evaluate the indicators.
    pub fn evaluate(
        observation: &SignalObservation,
        qualifying: &[ScoredRecord],
        settings: &InjectionSettings,
    ) -> Self {
        let min_gap = i64::try_from(settings.min_gap_seconds).unwrap_or(i64::MAX);
        let max_gap = i64::try_from(settings.max_gap_seconds).unwrap_or(i64::MAX);
        let top = qualifying.first().map(|c| c.score);
        Self {
            file_continuity: observation
                .file_overlap
                .is_some_and(|overlap| overlap > settings.file_overlap_threshold),
            gap_appropriate: observation
                .gap_secs
                .is_some_and(|gap| (min_gap..=max_gap).contains(&gap)),
            richness: !qualifying.is_empty()
                && qualifying.len() >= settings.richness_min_candidates
                && top.is_some_and(|score| score >= settings.richness_top_score),
            project_continuity: observation.branch_changed == Some(false)
                && observation.dir_changed == Some(false),
        }
    }

    /// Weighted sum of the fired indicators, in `[0, 1]`.
    pub fn confidence(&self) -> f64 {
        let points = [
            (self.file_continuity, FILE_CONTINUITY_POINTS),
            (self.gap_appropriate, GAP_POINTS),
            (self.richness, RICHNESS_POINTS),
            (self.project_continuity, PROJECT_POINTS),
        ];
        points
            .iter()
            .filter(|(fired, _)| *fired)
            .map(|(_, p)| p)
            .sum::<f64>()
            .clamp(0.0, 1.0)
    }
}

/// Signals, scores and thresholds behind a decision.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionTrace {
    /// Boundary outcome of this turn.
    pub boundary: Option<BoundaryReason>,
    /// Session open after this turn.
    pub session_id: Option<SessionId>,
    /// Signal comparison behind the boundary and the indicators.
    pub observation: SignalObservation,
    /// Indicators that fired.
    pub indicators: ConfidenceIndicators,
    /// Candidates fetched, after dropping obsolete records.
    pub candidates: usize,
    /// Candidates at or above `minCandidateScore`.
    pub qualifying: usize,
    /// Best relevance score.
    pub top_score: Option<f64>,
    /// Whether semantic similarity contributed.
    pub semantic_available: bool,
    /// Threshold strategy in effect.
    pub threshold_strategy: &'static str,
    /// Wall-clock time of the decision.
    pub elapsed_ms: u64,
}

/// Rendered context and its provenance.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InjectionPayload {
    /// Text to inject.
    pub rendered: String,
    /// Estimated tokens of `rendered`, never above the budget.
    pub token_estimate: usize,
    /// Included records with their scores.
    pub items: Vec<SelectedItem>,
}

/// Result of [`InjectionDecisionEngine::decide`].
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    /// Whether to inject `payload`.
    pub inject: bool,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Threshold the confidence was compared with.
    pub threshold: f64,
    /// Why.
    pub reason: DecisionReason,
    /// Present only when `inject` is true.
    pub payload: Option<InjectionPayload>,
    /// Observability trace.
    pub trace: DecisionTrace,
}

/// Decides, turn by turn, whether prior context is worth injecting.
pub struct InjectionDecisionEngine {
    settings: InjectionSettings,
    candidate_limit: usize,
    tracker: SessionTracker,
    scorer: RelevanceScorer,
    compressor: ContextCompressor,
    threshold: Box<dyn ThresholdStrategy>,
    deps: EngineDeps,
}

impl InjectionDecisionEngine {
    /// Build an engine.
    ///
    /// # Errors
    ///
    /// Returns [`ContinuityError::Configuration`] when the settings do not
    /// validate.
    pub fn new(settings: &ContinuitySettings, deps: EngineDeps) -> mnemo_core::Result<Self> {
        settings
            .validate()
            .map_err(|e| ContinuityError::Configuration(e.to_string()))?;
        Ok(Self {
            settings: settings.injection.clone(),
            candidate_limit: settings.storage.candidate_limit,
            tracker: SessionTracker::new(&settings.session),
            scorer: RelevanceScorer::new(&settings.scoring)?,
            compressor: ContextCompressor::from_settings(&settings.injection),
            threshold: strategy_from_settings(&settings.injection),
            deps,
        })
    }

    /// Hand closed sessions to the summarization queue.
    #[must_use]
    pub fn with_summary_queue(mut self, queue: SummaryQueue) -> Self {
        self.tracker.set_summary_queue(queue);
        self
    }

    /// Replace the threshold strategy.
    #[must_use]
    pub fn with_threshold_strategy(mut self, strategy: Box<dyn ThresholdStrategy>) -> Self {
        self.threshold = strategy;
        self
    }

    /// The session tracker.
    pub fn tracker(&self) -> &SessionTracker {
        &self.tracker
    }

    /// Seed the tracker with a persisted session after a restart.
    pub fn resume(&mut self, session: SessionRecord) {
        self.tracker.resume(session);
    }

    /// Snapshots of the open session.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<SessionRecord>>> {
        self.tracker.subscribe()
    }

    /// Current threshold.
    pub fn threshold(&self) -> f64 {
        self.threshold.threshold()
    }

    /// Decide for one turn. Never fails: timeouts and collaborator errors
    /// turn into a non-injecting decision.
    pub async fn decide(&mut self, ctx: &SessionContext) -> Decision {
        let started = Instant::now();
        let budget = Duration::from_millis(self.settings.latency_budget_ms);
        let strategy = self.threshold.name();
        let threshold = self.threshold.threshold();

        let decision = match tokio::time::timeout(budget, self.run(ctx, started)).await {
            Ok(decision) => decision,
            Err(_) => {
                warn!(budget_ms = self.settings.latency_budget_ms, "decision abandoned after latency budget");
                Decision {
                    inject: false,
                    confidence: 0.0,
                    threshold,
                    reason: DecisionReason::Timeout,
                    payload: None,
                    trace: DecisionTrace {
                        session_id: self.tracker.open_session().map(|s| s.id.clone()),
                        threshold_strategy: strategy,
                        elapsed_ms: elapsed_ms(started),
                        ..DecisionTrace::default()
                    },
                }
            }
        };

        debug!(
            reason = %decision.reason,
            confidence = decision.confidence,
            threshold = decision.threshold,
            trace = %serde_json::to_string(&decision.trace).unwrap_or_default(),
            "injection decision"
        );
        if let Some(payload) = &decision.payload {
            info!(
                session_id = decision.trace.session_id.as_ref().map(SessionId::as_str).unwrap_or_default(),
                confidence = decision.confidence,
                threshold = decision.threshold,
                items = payload.items.len(),
                tokens = payload.token_estimate,
                "context injected"
            );
        }
        decision
    }

    async fn run(&mut self, ctx: &SessionContext, started: Instant) -> Decision {
        let boundary = self.tracker.detect_boundary(&ctx.signals);
        if let Some(closed) = &boundary.closed {
            self.threshold.observe_session(closed.duration_secs());
            self.log_session(closed).await;
        }
        if let Some(open) = self.tracker.open_session().cloned() {
            self.log_session(&open).await;
        }

        let query = QueryContext::from_files(&ctx.signals.files).with_tags(&ctx.tags);
        let query = match ctx.query_text.as_deref() {
            Some(text) => query.with_text(text),
            None => {
                let files: Vec<&str> = ctx.signals.files.iter().map(String::as_str).collect();
                query.with_text(files.join(" "))
            }
        };

        let candidates = self.fetch_candidates(ctx, &query).await;
        let semantic = self.similarity(&query, &candidates).await;
        let semantic_available = semantic.is_some();
        let ranked = self
            .scorer
            .rank(candidates, semantic.as_deref(), &query, ctx.signals.at);
        let candidate_count = ranked.len();
        let qualifying: Vec<ScoredRecord> = ranked
            .into_iter()
            .filter(|c| c.score >= self.settings.min_candidate_score)
            .collect();

        let indicators =
            ConfidenceIndicators::evaluate(&boundary.observation, &qualifying, &self.settings);
        let confidence = indicators.confidence();
        let threshold = self.threshold.threshold();

        let mut decision = Decision {
            inject: false,
            confidence,
            threshold,
            reason: DecisionReason::NoCandidates,
            payload: None,
            trace: DecisionTrace {
                boundary: Some(boundary.reason),
                session_id: Some(boundary.session_id.clone()),
                observation: boundary.observation.clone(),
                indicators,
                candidates: candidate_count,
                qualifying: qualifying.len(),
                top_score: qualifying.first().map(|c| c.score),
                semantic_available,
                threshold_strategy: self.threshold.name(),
                elapsed_ms: 0,
            },
        };

        if qualifying.is_empty() {
            decision.reason = DecisionReason::NoCandidates;
        } else if confidence < threshold {
            decision.reason = DecisionReason::BelowThreshold;
        } else {
            let selection = self
                .compressor
                .select(&qualifying, self.settings.effective_max_tokens());
            match selection.outcome {
                SelectionOutcome::Fitted => {
                    decision.inject = true;
                    decision.reason = DecisionReason::Injected;
                    decision.payload = Some(InjectionPayload {
                        rendered: selection.rendered,
                        token_estimate: selection.token_estimate,
                        items: selection.selected,
                    });
                }
                SelectionOutcome::BudgetTooSmall => decision.reason = DecisionReason::BudgetTooSmall,
                SelectionOutcome::NoCandidates => decision.reason = DecisionReason::NoCandidates,
            }
        }
        decision.trace.elapsed_ms = elapsed_ms(started);
        decision
    }

    async fn fetch_candidates(&self, ctx: &SessionContext, query: &QueryContext) -> Vec<MemoryRecord> {
        let request = CandidateQuery {
            files: ctx.signals.files.clone(),
            tags: query.tags.clone(),
            working_directory: ctx.signals.working_directory.clone(),
            limit: self.candidate_limit,
        };
        let fetched = guarded(
            self.collaborator_timeout(),
            "records",
            self.deps.records.candidates(&request),
        )
        .await
        .unwrap_or_default();
        fetched.into_iter().filter(|r| !r.is_obsolete()).collect()
    }

    async fn similarity(&self, query: &QueryContext, candidates: &[MemoryRecord]) -> Option<Vec<f64>> {
        let ranker = self.deps.similarity.as_ref()?;
        if candidates.is_empty() || query.text.trim().is_empty() {
            return None;
        }
        let scores = guarded(
            self.collaborator_timeout(),
            "similarity",
            ranker.rank(&query.text, candidates),
        )
        .await?;
        if scores.len() != candidates.len() {
            warn!(
                collaborator = "similarity",
                expected = candidates.len(),
                got = scores.len(),
                "similarity scores do not match candidates, ignoring"
            );
            return None;
        }
        Some(scores)
    }

    async fn log_session(&self, session: &SessionRecord) {
        if let Some(log) = &self.deps.sessions {
            let _ = guarded(self.collaborator_timeout(), "session log", log.record_session(session)).await;
        }
    }

    fn collaborator_timeout(&self) -> Duration {
        Duration::from_millis(self.settings.collaborator_timeout_ms)
    }

    /// Close the open session and hand it, with any closed sessions the
    /// queue could not take yet, to summarization.
    pub async fn shutdown(&mut self) {
        if let Some(closed) = self.tracker.close_open(chrono::Utc::now()) {
            self.threshold.observe_session(closed.duration_secs());
            self.log_session(&closed).await;
            info!(session_id = %closed.id, duration_secs = closed.duration_secs(), "session closed on shutdown");
        }
        let lost = self.tracker.drain_undelivered().await;
        if lost > 0 {
            warn!(lost, "closed sessions left unsummarized at shutdown");
        }
    }
}

/// Await a collaborator call under `limit`; errors and timeouts become
/// `None` with a warning.
async fn guarded<T, F>(limit: Duration, collaborator: &'static str, call: F) -> Option<T>
where
    F: Future<Output = mnemo_core::Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            warn!(collaborator, error = %e, "collaborator failed, degrading");
            None
        }
        Err(_) => {
            warn!(
                collaborator,
                timeout_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                "collaborator timed out, degrading"
            );
            None
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
