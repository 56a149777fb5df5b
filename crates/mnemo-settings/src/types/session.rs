//! Session boundary detection settings.

use serde::{Deserialize, Serialize};

/// Thresholds for the session state machine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// Idle gap after which the next activity starts a new session.
    pub session_boundary_time_threshold_seconds: u64,
    /// File-set similarity below `1 - fileContinuityThreshold` counts as a
    /// shift in working pattern.
    pub file_continuity_threshold: f64,
    /// Minimum gap before a pattern shift may open a new session.
    pub pattern_shift_gap_seconds: u64,
    /// Gap over which the recency part of the continuity score decays to 0.
    pub continuity_recency_window_seconds: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            session_boundary_time_threshold_seconds: 1800,
            file_continuity_threshold: 0.7,
            pattern_shift_gap_seconds: 600,
            continuity_recency_window_seconds: 14_400,
        }
    }
}
