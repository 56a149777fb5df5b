//! Injection gating and compression settings.

use serde::{Deserialize, Serialize};

/// Payload size mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InjectionMode {
    /// Use `maxInjectionTokens`.
    #[default]
    Standard,
    /// Cap the budget at `constrainedMaxInjectionTokens`.
    Constrained,
}

/// Settings for the injection decision engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InjectionSettings {
    /// Confidence needed to inject when thresholds are fixed; the starting
    /// point when they adapt.
    pub base_injection_confidence: f64,
    /// Token budget of an injected payload.
    pub max_injection_tokens: usize,
    /// Budget ceiling in constrained mode.
    pub constrained_max_injection_tokens: usize,
    /// Payload size mode.
    pub mode: InjectionMode,
    /// Let the threshold follow observed session lengths.
    pub adaptive_thresholds: bool,
    /// Lower bound of the threshold.
    pub min_threshold: f64,
    /// Upper bound of the threshold.
    pub max_threshold: f64,
    /// Session length the adaptive threshold treats as typical.
    pub reference_session_minutes: u64,
    /// Smoothing factor of the observed session length average.
    pub adaptation_rate: f64,
    /// File overlap above which the continuity indicator fires.
    pub file_overlap_threshold: f64,
    /// Shortest gap that counts as a good moment to inject.
    pub min_gap_seconds: u64,
    /// Longest gap that counts as a good moment to inject.
    pub max_gap_seconds: u64,
    /// Candidates scoring below this are ignored.
    pub min_candidate_score: f64,
    /// Number of qualifying candidates needed for the richness indicator.
    pub richness_min_candidates: usize,
    /// Top score needed for the richness indicator.
    pub richness_top_score: f64,
    /// Wall-clock budget of one decision.
    pub latency_budget_ms: u64,
    /// Budget of a single collaborator call.
    pub collaborator_timeout_ms: u64,
    /// Reasoning length kept by the truncated form of a record.
    pub min_viable_reasoning_chars: usize,
}

impl InjectionSettings {
    /// Budget after applying the mode.
    pub fn effective_max_tokens(&self) -> usize {
        match self.mode {
            InjectionMode::Standard => self.max_injection_tokens,
            InjectionMode::Constrained => self
                .max_injection_tokens
                .min(self.constrained_max_injection_tokens),
        }
    }
}

impl Default for InjectionSettings {
    fn default() -> Self {
        Self {
            base_injection_confidence: 0.3,
            max_injection_tokens: 2000,
            constrained_max_injection_tokens: 800,
            mode: InjectionMode::Standard,
            adaptive_thresholds: false,
            min_threshold: 0.1,
            max_threshold: 0.7,
            reference_session_minutes: 90,
            adaptation_rate: 0.1,
            file_overlap_threshold: 0.7,
            min_gap_seconds: 1800,
            max_gap_seconds: 14_400,
            min_candidate_score: 0.25,
            richness_min_candidates: 1,
            richness_top_score: 0.5,
            latency_budget_ms: 800,
            collaborator_timeout_ms: 250,
            min_viable_reasoning_chars: 40,
        }
    }
}
