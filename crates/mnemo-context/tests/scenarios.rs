#![allow(missing_docs, unused_results)]

//! End-to-end behavior of the request path on concrete turns.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use mnemo_context::compressor::{PlanItem, RenderForm, plan_first_fit};
use mnemo_context::{
    ActivitySignals, BoundaryReason, ContextCompressor, DecisionReason, EngineDeps,
    InjectionDecisionEngine, QueryContext, RelevanceScorer, ScoredRecord, SelectionOutcome,
    SessionContext, SessionTracker,
};
use mnemo_core::{
    CandidateQuery, ContinuityError, MemoryRecord, RecordKind, RecordSource, SessionId,
    SessionRecord, SimilarityRanker,
};
use mnemo_settings::{ContinuitySettings, ScoringSettings, SessionSettings};

struct Records(Vec<MemoryRecord>);

#[async_trait]
impl RecordSource for Records {
    async fn candidates(&self, _query: &CandidateQuery) -> mnemo_core::Result<Vec<MemoryRecord>> {
        Ok(self.0.clone())
    }

    async fn records_for_session(&self, _id: &SessionId) -> mnemo_core::Result<Vec<MemoryRecord>> {
        Ok(Vec::new())
    }
}

struct ConstantRanker(f64);

#[async_trait]
impl SimilarityRanker for ConstantRanker {
    async fn rank(&self, _query: &str, candidates: &[MemoryRecord]) -> mnemo_core::Result<Vec<f64>> {
        Ok(vec![self.0; candidates.len()])
    }
}

struct DownRanker;

#[async_trait]
impl SimilarityRanker for DownRanker {
    async fn rank(&self, _query: &str, _candidates: &[MemoryRecord]) -> mnemo_core::Result<Vec<f64>> {
        Err(ContinuityError::unavailable("similarity", "connection refused"))
    }
}

fn set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|n| (*n).to_string()).collect()
}

fn signals(at: DateTime<Utc>, files: &[&str]) -> ActivitySignals {
    ActivitySignals::at(at)
        .with_branch("feat/auth")
        .with_dir("/work/api")
        .with_files(files.iter().copied())
}

fn prior_session(now: DateTime<Utc>, ended_ago: Duration, files: &[&str]) -> SessionRecord {
    let mut s = SessionRecord::open(
        now - ended_ago - Duration::minutes(50),
        Some("feat/auth".into()),
        Some("/work/api".into()),
        &set(files),
    );
    s.last_activity_at = now - ended_ago;
    s
}

fn auth_records(at: DateTime<Utc>) -> Vec<MemoryRecord> {
    vec![
        MemoryRecord::new(RecordKind::Decision, "Use JWT access tokens with 15 minute expiry", at)
            .with_reasoning("stateless verification at the edge")
            .with_files(["src/auth.rs", "src/token.rs"]),
        MemoryRecord::new(RecordKind::Todo, "Rotate signing keys weekly", at).with_files(["src/token.rs"]),
        MemoryRecord::new(RecordKind::BugFix, "Refresh loop when clock skew exceeds expiry", at)
            .with_files(["src/middleware.rs"]),
    ]
}

#[test]
fn scenario_a_first_fit_skips_what_no_longer_fits() {
    let items = [
        PlanItem {
            group: 0,
            verbatim: 40,
            truncated: None,
        },
        PlanItem {
            group: 3,
            verbatim: 30,
            truncated: None,
        },
    ];
    let placements = plan_first_fit(&items, &[0; 4], 50);
    assert_eq!(placements.len(), 1);
    assert_eq!(placements[0].index, 0);
    assert_eq!(placements[0].form, RenderForm::Verbatim);
    assert_eq!(placements[0].cost, 40);
}

#[test]
fn scenario_b_short_gap_with_similar_files_continues() {
    let now = Utc::now();
    let mut tracker = SessionTracker::new(&SessionSettings::default());
    let before: Vec<String> = (0..10).map(|i| format!("src/m{i}.rs")).collect();
    let after: Vec<String> = before[..9].to_vec();

    let first = tracker.detect_boundary(
        &ActivitySignals::at(now - Duration::seconds(1200))
            .with_branch("main")
            .with_dir("/repo")
            .with_files(before),
    );
    assert!(first.is_new_session);

    let second = tracker.detect_boundary(
        &ActivitySignals::at(now)
            .with_branch("main")
            .with_dir("/repo")
            .with_files(after),
    );
    assert_eq!(second.observation.gap_secs, Some(1200));
    assert!((second.observation.file_similarity.unwrap() - 0.9).abs() < 1e-9);
    assert!(!second.is_new_session);
    assert_eq!(second.reason, BoundaryReason::Continuation);
    assert_eq!(second.session_id, first.session_id);
}

#[test]
fn scenario_c_long_gap_is_a_time_gap_regardless_of_files() {
    let now = Utc::now();
    let mut tracker = SessionTracker::new(&SessionSettings::default());
    tracker.detect_boundary(&signals(now - Duration::seconds(2700), &["src/auth.rs"]));

    let decision = tracker.detect_boundary(&signals(now, &["src/auth.rs"]));
    assert!(decision.is_new_session);
    assert_eq!(decision.reason, BoundaryReason::TimeGap);
    assert_eq!(decision.observation.file_overlap, Some(1.0));
    assert!(decision.closed.is_some());
}

#[tokio::test]
async fn scenario_d_every_indicator_fires_and_context_is_injected() {
    let now = Utc::now();
    let deps = EngineDeps::new(Arc::new(Records(auth_records(now - Duration::hours(3)))))
        .with_similarity(Arc::new(ConstantRanker(0.9)));
    let mut engine = InjectionDecisionEngine::new(&ContinuitySettings::default(), deps).unwrap();
    engine.resume(prior_session(
        now,
        Duration::hours(2),
        &["src/auth.rs", "src/token.rs", "src/middleware.rs", "src/session.rs", "src/old.rs"],
    ));

    let ctx = SessionContext::new(signals(
        now,
        &["src/auth.rs", "src/token.rs", "src/middleware.rs", "src/session.rs", "src/new.rs"],
    ))
    .with_query("continue the token refresh work");
    let decision = engine.decide(&ctx).await;

    assert_eq!(decision.trace.observation.file_overlap, Some(0.8));
    assert_eq!(decision.trace.observation.gap_secs, Some(7200));
    let indicators = decision.trace.indicators;
    assert!(indicators.file_continuity);
    assert!(indicators.gap_appropriate);
    assert!(indicators.richness);
    assert!(indicators.project_continuity);
    assert!((decision.confidence - 1.0).abs() < 1e-9);
    assert!(decision.confidence >= decision.threshold);

    assert!(decision.inject);
    assert_eq!(decision.reason, DecisionReason::Injected);
    assert!(decision.trace.semantic_available);
    let payload = decision.payload.unwrap();
    assert!(payload.token_estimate <= 2000);
    assert_eq!(payload.items.len(), 3);
    assert!(payload.rendered.starts_with("Decisions:\n- Use JWT access tokens"));
    assert!(payload.rendered.contains("Todos:\n- [ ] Rotate signing keys weekly"));
}

#[tokio::test]
async fn scenario_e_similarity_outage_neutralizes_semantic_component() {
    let now = Utc::now();
    let records = auth_records(now - Duration::hours(3));

    let deps = EngineDeps::new(Arc::new(Records(records.clone()))).with_similarity(Arc::new(DownRanker));
    let mut engine = InjectionDecisionEngine::new(&ContinuitySettings::default(), deps).unwrap();
    engine.resume(prior_session(now, Duration::hours(1), &["src/auth.rs", "src/token.rs"]));
    let ctx = SessionContext::new(signals(now, &["src/auth.rs", "src/token.rs"])).with_query("tokens");
    let decision = engine.decide(&ctx).await;

    assert!(!decision.trace.semantic_available);
    assert_ne!(decision.reason, DecisionReason::Timeout);
    assert_eq!(decision.trace.candidates, 3);

    let scorer = RelevanceScorer::new(&ScoringSettings::default()).unwrap();
    let query = QueryContext::from_files(&set(&["src/auth.rs", "src/token.rs"]));
    let first = scorer.rank(records.clone(), None, &query, now);
    let second = scorer.rank(records, None, &query, now);
    assert!(first.iter().all(|c| c.breakdown.semantic.abs() < f64::EPSILON));
    let ids = |ranked: &[ScoredRecord]| ranked.iter().map(|c| c.record.id.clone()).collect::<Vec<_>>();
    assert_eq!(ids(&first), ids(&second));
}

#[tokio::test]
async fn tiny_budget_reports_budget_too_small() {
    let now = Utc::now();
    let mut settings = ContinuitySettings::default();
    settings.injection.max_injection_tokens = 3;
    let deps = EngineDeps::new(Arc::new(Records(auth_records(now - Duration::hours(3)))))
        .with_similarity(Arc::new(ConstantRanker(0.9)));
    let mut engine = InjectionDecisionEngine::new(&settings, deps).unwrap();
    engine.resume(prior_session(now, Duration::hours(2), &["src/auth.rs", "src/token.rs"]));

    let decision = engine
        .decide(&SessionContext::new(signals(now, &["src/auth.rs", "src/token.rs"])))
        .await;
    assert!(!decision.inject);
    assert_eq!(decision.reason, DecisionReason::BudgetTooSmall);
    assert!(decision.payload.is_none());
}

#[test]
fn compressor_rejects_empty_input() {
    let selection = ContextCompressor::default().select(&[], 100);
    assert_eq!(selection.outcome, SelectionOutcome::NoCandidates);
    assert!(selection.rendered.is_empty());
}
