//! Hierarchical summarization settings.

use serde::{Deserialize, Serialize};

/// Tier windows, compression targets, and background worker limits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SummarySettings {
    /// Sessions younger than this are kept verbatim.
    pub immediate_window_seconds: u64,
    /// Sessions younger than this (and past the immediate window) get one
    /// paragraph each. Older sessions are merged per thread.
    pub recent_window_seconds: u64,
    /// Target size of a summary relative to its input.
    pub compression_ratio: f64,
    /// Word similarity at or above which two records are duplicates.
    pub duplicate_similarity_threshold: f64,
    /// Similarity of content words at or above which a later record of the
    /// same kind and topic overrides an earlier one.
    pub conflict_similarity_threshold: f64,
    /// Reasoning is trimmed to this many characters before being dropped.
    pub min_reasoning_chars: usize,
    /// Threads without activity for this many days are dormant.
    pub dormant_after_days: u64,
    /// Capacity of the summarization queue.
    pub queue_capacity: usize,
    /// Attempts per queued session before it is given up.
    pub max_attempts: u32,
}

impl Default for SummarySettings {
    fn default() -> Self {
        Self {
            immediate_window_seconds: 7200,
            recent_window_seconds: 86_400,
            compression_ratio: 0.3,
            duplicate_similarity_threshold: 0.85,
            conflict_similarity_threshold: 0.5,
            min_reasoning_chars: 60,
            dormant_after_days: 7,
            queue_capacity: 64,
            max_attempts: 3,
        }
    }
}
