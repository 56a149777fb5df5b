//! Relevance scoring settings.

use serde::{Deserialize, Serialize};

/// Weights of the relevance components.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoringWeights {
    /// Externally supplied semantic similarity.
    pub semantic: f64,
    /// Jaccard overlap of files.
    pub file_overlap: f64,
    /// Exponential recency decay.
    pub recency: f64,
    /// Record kind and status.
    pub type_weight: f64,
    /// Jaccard overlap of tags.
    pub tag_overlap: f64,
}

impl ScoringWeights {
    /// Sum of all weights.
    pub fn total(&self) -> f64 {
        self.semantic + self.file_overlap + self.recency + self.type_weight + self.tag_overlap
    }

    /// All weights with their JSON names.
    pub fn named(&self) -> [(&'static str, f64); 5] {
        [
            ("semantic", self.semantic),
            ("fileOverlap", self.file_overlap),
            ("recency", self.recency),
            ("typeWeight", self.type_weight),
            ("tagOverlap", self.tag_overlap),
        ]
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            semantic: 0.40,
            file_overlap: 0.30,
            recency: 0.15,
            type_weight: 0.10,
            tag_overlap: 0.05,
        }
    }
}

/// Relevance scoring settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoringSettings {
    /// Component weights.
    pub weights: ScoringWeights,
    /// Decay constant of `exp(-age / halfLife)`, in days.
    pub recency_half_life_days: f64,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            recency_half_life_days: 7.0,
        }
    }
}
