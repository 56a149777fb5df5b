//! Relevance scoring of candidate records.
//!
//! A score is a weighted sum of five components, each clamped to `[0, 1]`:
//!
//! | component | default weight |
//! |---|---|
//! | semantic similarity (external) | 0.40 |
//! | file overlap | 0.30 |
//! | recency, `exp(-age / halfLife)` | 0.15 |
//! | type weight | 0.10 |
//! | tag overlap | 0.05 |
//!
//! Weights are normalized by their total, so the score stays in `[0, 1]`
//! whatever the configuration. Scoring is pure: identical inputs always
//! produce identical scores and rankings.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use mnemo_core::{
    ContinuityError, MemoryRecord, RecordKind, RecordStatus, Result, infer_tags, jaccard,
    lowercase_set,
};
use mnemo_settings::{ScoringSettings, ScoringWeights};
use serde::Serialize;

const SECS_PER_DAY: f64 = 86_400.0;

/// What the current turn is about.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryContext {
    /// Free text handed to the similarity collaborator.
    pub text: String,
    /// Files in play.
    pub files: BTreeSet<String>,
    /// Lower-cased tags.
    pub tags: BTreeSet<String>,
}

impl QueryContext {
    /// Query over `files`, with tags inferred from their paths.
    #[must_use]
    pub fn from_files(files: &BTreeSet<String>) -> Self {
        Self {
            text: String::new(),
            files: files.clone(),
            tags: infer_tags(files),
        }
    }

    /// Set the free text.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Add explicit tags.
    #[must_use]
    pub fn with_tags(mut self, tags: &BTreeSet<String>) -> Self {
        self.tags.extend(lowercase_set(tags));
        self
    }
}

/// Component values behind a score, each in `[0, 1]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    /// Semantic similarity; 0 when unavailable.
    pub semantic: f64,
    /// File Jaccard.
    pub file_overlap: f64,
    /// Recency decay.
    pub recency: f64,
    /// Kind/status weight.
    pub type_weight: f64,
    /// Tag Jaccard.
    pub tag_overlap: f64,
}

/// A candidate with its score.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredRecord {
    /// The candidate.
    pub record: MemoryRecord,
    /// Weighted score in `[0, 1]`.
    pub score: f64,
    /// Components.
    pub breakdown: ScoreBreakdown,
}

/// Fixed weight of a record by kind and status.
pub fn type_weight(record: &MemoryRecord) -> f64 {
    match (record.kind, record.status) {
        (_, RecordStatus::Obsolete) => 0.0,
        (RecordKind::Decision, _) => 1.0,
        (RecordKind::BugFix, _) => 0.9,
        (RecordKind::Todo, RecordStatus::Completed) => 0.2,
        (RecordKind::Todo, _) => 0.8,
        (RecordKind::Rejection, _) => 0.6,
    }
}

fn unit(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

/// Deterministic weighted relevance scorer.
#[derive(Clone, Debug)]
pub struct RelevanceScorer {
    weights: ScoringWeights,
    total_weight: f64,
    half_life_secs: f64,
}

impl RelevanceScorer {
    /// Build a scorer, rejecting negative or all-zero weights and a
    /// non-positive half-life.
    pub fn new(settings: &ScoringSettings) -> Result<Self> {
        for (name, weight) in settings.weights.named() {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ContinuityError::Configuration(format!(
                    "scoring weight {name} must be a non-negative number, got {weight}"
                )));
            }
        }
        let total_weight = settings.weights.total();
        if total_weight <= 0.0 {
            return Err(ContinuityError::Configuration(
                "scoring weights must not all be zero".into(),
            ));
        }
        if !(settings.recency_half_life_days.is_finite() && settings.recency_half_life_days > 0.0) {
            return Err(ContinuityError::Configuration(format!(
                "recencyHalfLifeDays must be positive, got {}",
                settings.recency_half_life_days
            )));
        }
        Ok(Self {
            weights: settings.weights.clone(),
            total_weight,
            half_life_secs: settings.recency_half_life_days * SECS_PER_DAY,
        })
    }

    /// Component values for one candidate.
    #[allow(clippy::cast_precision_loss)]
    pub fn breakdown(
        &self,
        candidate: &MemoryRecord,
        query: &QueryContext,
        semantic: Option<f64>,
        now: DateTime<Utc>,
    ) -> ScoreBreakdown {
        let age_secs = (now - candidate.timestamp).num_seconds().max(0) as f64;
        ScoreBreakdown {
            semantic: unit(semantic.unwrap_or(0.0)),
            file_overlap: unit(jaccard(&candidate.files, &query.files)),
            recency: unit((-age_secs / self.half_life_secs).exp()),
            type_weight: type_weight(candidate),
            tag_overlap: unit(jaccard(&lowercase_set(&candidate.tags), &query.tags)),
        }
    }

    /// Weighted, normalized sum of a breakdown.
    pub fn combine(&self, b: &ScoreBreakdown) -> f64 {
        let w = &self.weights;
        let sum = w.semantic * b.semantic
            + w.file_overlap * b.file_overlap
            + w.recency * b.recency
            + w.type_weight * b.type_weight
            + w.tag_overlap * b.tag_overlap;
        unit(sum / self.total_weight)
    }

    /// Score one candidate.
    pub fn score(
        &self,
        candidate: &MemoryRecord,
        query: &QueryContext,
        semantic: Option<f64>,
        now: DateTime<Utc>,
    ) -> f64 {
        self.combine(&self.breakdown(candidate, query, semantic, now))
    }

    /// Score and sort candidates, best first.
    ///
    /// `semantic` holds one similarity per candidate; a missing or
    /// mis-sized slice counts as 0 for every candidate. Ties break by newer
    /// timestamp, then by record ID.
    pub fn rank(
        &self,
        candidates: Vec<MemoryRecord>,
        semantic: Option<&[f64]>,
        query: &QueryContext,
        now: DateTime<Utc>,
    ) -> Vec<ScoredRecord> {
        let semantic = semantic.filter(|s| s.len() == candidates.len());
        let mut scored: Vec<ScoredRecord> = candidates
            .into_iter()
            .enumerate()
            .map(|(i, record)| {
                let sim = semantic.map(|s| s[i]);
                let breakdown = self.breakdown(&record, query, sim, now);
                ScoredRecord {
                    score: self.combine(&breakdown),
                    record,
                    breakdown,
                }
            })
            .collect();
        scored.sort_by(compare_ranked);
        scored
    }
}

fn compare_ranked(a: &ScoredRecord, b: &ScoredRecord) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.record.timestamp.cmp(&a.record.timestamp))
        .then_with(|| a.record.id.cmp(&b.record.id))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use proptest::prelude::*;

    use super::*;

    fn scorer() -> RelevanceScorer {
        RelevanceScorer::new(&ScoringSettings::default()).unwrap()
    }

    fn files(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn type_weights() {
        let now = Utc::now();
        let rec = |kind, status| MemoryRecord::new(kind, "x", now).with_status(status);
        assert!((type_weight(&rec(RecordKind::Decision, RecordStatus::Open)) - 1.0).abs() < 1e-9);
        assert!((type_weight(&rec(RecordKind::BugFix, RecordStatus::Open)) - 0.9).abs() < 1e-9);
        assert!((type_weight(&rec(RecordKind::Todo, RecordStatus::Open)) - 0.8).abs() < 1e-9);
        assert!((type_weight(&rec(RecordKind::Todo, RecordStatus::InProgress)) - 0.8).abs() < 1e-9);
        assert!((type_weight(&rec(RecordKind::Todo, RecordStatus::Completed)) - 0.2).abs() < 1e-9);
        assert!((type_weight(&rec(RecordKind::Rejection, RecordStatus::Open)) - 0.6).abs() < 1e-9);
        assert!(type_weight(&rec(RecordKind::Decision, RecordStatus::Obsolete)).abs() < 1e-9);
    }

    #[test]
    fn full_match_scores_one() {
        let now = Utc::now();
        let query = QueryContext::from_files(&files(&["src/api/auth.py"]));
        let rec = MemoryRecord::new(RecordKind::Decision, "use jwt", now)
            .with_files(["src/api/auth.py"])
            .with_tags(["Backend", "API"]);
        let score = scorer().score(&rec, &query, Some(1.0), now);
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn missing_semantic_counts_as_zero() {
        let now = Utc::now();
        let query = QueryContext::from_files(&files(&["a.rs"]));
        let rec = MemoryRecord::new(RecordKind::Decision, "x", now).with_files(["a.rs"]);
        let s = scorer();
        let without = s.score(&rec, &query, None, now);
        let zero = s.score(&rec, &query, Some(0.0), now);
        assert!((without - zero).abs() < f64::EPSILON);
        assert!((without - 0.55).abs() < 1e-9);
    }

    #[test]
    fn out_of_range_semantic_is_clamped() {
        let now = Utc::now();
        let rec = MemoryRecord::new(RecordKind::Decision, "x", now);
        let s = scorer();
        let q = QueryContext::default();
        let b = s.breakdown(&rec, &q, Some(7.0), now);
        assert!((b.semantic - 1.0).abs() < f64::EPSILON);
        let b = s.breakdown(&rec, &q, Some(f64::NAN), now);
        assert!(b.semantic.abs() < f64::EPSILON);
    }

    #[test]
    fn recency_decays_with_age() {
        let now = Utc::now();
        let s = scorer();
        let q = QueryContext::default();
        let week_old = MemoryRecord::new(RecordKind::Todo, "x", now - Duration::days(7));
        let b = s.breakdown(&week_old, &q, None, now);
        assert!((b.recency - (-1.0f64).exp()).abs() < 1e-9);
        // future timestamps are treated as fresh
        let future = MemoryRecord::new(RecordKind::Todo, "x", now + Duration::hours(1));
        assert!((s.breakdown(&future, &q, None, now).recency - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unnormalized_weights_are_normalized() {
        let settings = ScoringSettings {
            weights: ScoringWeights {
                semantic: 0.0,
                file_overlap: 2.0,
                recency: 0.0,
                type_weight: 2.0,
                tag_overlap: 0.0,
            },
            ..Default::default()
        };
        let s = RelevanceScorer::new(&settings).unwrap();
        let now = Utc::now();
        let rec = MemoryRecord::new(RecordKind::Decision, "x", now).with_files(["a.rs"]);
        let q = QueryContext::from_files(&files(&["a.rs"]));
        assert!((s.score(&rec, &q, None, now) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn invalid_weights_are_rejected() {
        let mut settings = ScoringSettings::default();
        settings.weights.recency = -0.1;
        assert!(RelevanceScorer::new(&settings).is_err());

        let zero = ScoringSettings {
            weights: ScoringWeights {
                semantic: 0.0,
                file_overlap: 0.0,
                recency: 0.0,
                type_weight: 0.0,
                tag_overlap: 0.0,
            },
            ..Default::default()
        };
        assert!(RelevanceScorer::new(&zero).is_err());
    }

    #[test]
    fn rank_breaks_ties_by_timestamp_then_id() {
        let now = Utc::now();
        let older = MemoryRecord::new(RecordKind::Decision, "x", now - Duration::seconds(1)).with_id("a");
        let b = MemoryRecord::new(RecordKind::Decision, "x", now).with_id("b");
        let c = MemoryRecord::new(RecordKind::Decision, "x", now).with_id("c");
        // equal scores: no recency weight
        let settings = ScoringSettings {
            weights: ScoringWeights {
                recency: 0.0,
                ..Default::default()
            },
            ..Default::default()
        };
        let s = RelevanceScorer::new(&settings).unwrap();
        let ranked = s.rank(vec![older, c, b], None, &QueryContext::default(), now);
        let ids: Vec<_> = ranked.iter().map(|r| r.record.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn mis_sized_semantic_slice_is_ignored() {
        let now = Utc::now();
        let recs = vec![
            MemoryRecord::new(RecordKind::Todo, "x", now),
            MemoryRecord::new(RecordKind::Todo, "y", now),
        ];
        let ranked = scorer().rank(recs, Some(&[1.0]), &QueryContext::default(), now);
        assert!(ranked.iter().all(|r| r.breakdown.semantic.abs() < f64::EPSILON));
    }

    #[test]
    fn query_tags_are_inferred_and_lowercased() {
        let q = QueryContext::from_files(&files(&["web/components/Button.tsx"]))
            .with_tags(&files(&["UI"]));
        assert!(q.tags.contains("frontend"));
        assert!(q.tags.contains("ui"));
    }

    proptest! {
        #[test]
        fn score_is_bounded_and_deterministic(
            semantic in proptest::option::of(-2.0f64..2.0),
            age_hours in -48i64..10_000,
            overlap in 0usize..4,
        ) {
            let now = Utc::now();
            let all = ["a.rs", "b.rs", "c.rs", "d.rs"];
            let rec = MemoryRecord::new(RecordKind::BugFix, "fix", now - Duration::hours(age_hours))
                .with_files(all.iter().take(overlap).copied());
            let q = QueryContext::from_files(&files(&all[..2]));
            let s = scorer();
            let first = s.score(&rec, &q, semantic, now);
            let second = s.score(&rec, &q, semantic, now);
            prop_assert!((0.0..=1.0).contains(&first));
            prop_assert_eq!(first.to_bits(), second.to_bits());
        }
    }
}
