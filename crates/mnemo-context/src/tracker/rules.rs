//! Ordered boundary rules.
//!
//! Each rule is a named predicate over a [`SignalObservation`]. The tracker
//! evaluates [`BOUNDARY_RULES`] top to bottom and the first match wins, so
//! conflicting signals always resolve the same way.

use std::collections::BTreeSet;
use std::fmt;

use mnemo_core::{SessionRecord, jaccard};
use mnemo_settings::SessionSettings;
use serde::{Deserialize, Serialize};

use crate::signals::ActivitySignals;

/// Why a turn did or did not start a new session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BoundaryReason {
    /// Nothing was open yet.
    NoOpenSession,
    /// Idle longer than the session threshold.
    TimeGap,
    /// The branch changed.
    BranchChange,
    /// The working directory changed.
    DirChange,
    /// The file set shifted after a short idle period.
    PatternShift,
    /// Same session.
    Continuation,
}

impl BoundaryReason {
    /// Stable string form used in logs and traces.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoOpenSession => "NO_OPEN_SESSION",
            Self::TimeGap => "TIME_GAP",
            Self::BranchChange => "BRANCH_CHANGE",
            Self::DirChange => "DIR_CHANGE",
            Self::PatternShift => "PATTERN_SHIFT",
            Self::Continuation => "CONTINUATION",
        }
    }
}

impl fmt::Display for BoundaryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw comparisons between a signal bundle and the reference session.
///
/// `None` means the comparison could not be made because an input was
/// unknown or empty.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalObservation {
    /// Seconds since the reference session's last activity.
    pub gap_secs: Option<i64>,
    /// Jaccard similarity between this bundle's files and the previous
    /// bundle's.
    pub file_similarity: Option<f64>,
    /// Share of this bundle's files already active in the reference session.
    pub file_overlap: Option<f64>,
    /// Whether the branch differs.
    pub branch_changed: Option<bool>,
    /// Whether the working directory differs.
    pub dir_changed: Option<bool>,
}

impl SignalObservation {
    /// Compare `signals` against `reference`.
    ///
    /// `last_files` are the files of the previous bundle in the reference
    /// session; when empty, the session's accumulated files stand in.
    pub fn compare(
        signals: &ActivitySignals,
        reference: Option<&SessionRecord>,
        last_files: &BTreeSet<String>,
    ) -> Self {
        let Some(reference) = reference else {
            return Self::default();
        };

        let gap_secs = Some((signals.at - reference.effective_end()).num_seconds().max(0));

        let previous_files = if last_files.is_empty() {
            &reference.active_files
        } else {
            last_files
        };
        let file_similarity = (!signals.files.is_empty() && !previous_files.is_empty())
            .then(|| jaccard(&signals.files, previous_files));

        let file_overlap = (!signals.files.is_empty() && !reference.active_files.is_empty())
            .then(|| {
                let shared = signals.files.intersection(&reference.active_files).count();
                ratio(shared, signals.files.len())
            });

        Self {
            gap_secs,
            file_similarity,
            file_overlap,
            branch_changed: changed(signals.branch.as_deref(), reference.branch.as_deref()),
            dir_changed: changed(
                signals.working_directory.as_deref(),
                reference.working_directory.as_deref(),
            ),
        }
    }
}

fn changed(current: Option<&str>, previous: Option<&str>) -> Option<bool> {
    Some(current? != previous?)
}

#[allow(clippy::cast_precision_loss)]
fn ratio(part: usize, whole: usize) -> f64 {
    part as f64 / whole as f64
}

/// A named boundary predicate and the reason it reports.
#[derive(Clone, Copy)]
pub struct BoundaryRule {
    /// Human-readable rule name for logs.
    pub name: &'static str,
    /// Reason reported when the rule matches.
    pub reason: BoundaryReason,
    /// Predicate.
    pub matches: fn(&SignalObservation, &SessionSettings) -> bool,
}

impl fmt::Debug for BoundaryRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundaryRule")
            .field("name", &self.name)
            .field("reason", &self.reason)
            .finish_non_exhaustive()
    }
}

/// Boundary rules in priority order.
pub const BOUNDARY_RULES: [BoundaryRule; 4] = [
    BoundaryRule {
        name: "idle gap",
        reason: BoundaryReason::TimeGap,
        matches: idle_gap_exceeded,
    },
    BoundaryRule {
        name: "branch switch",
        reason: BoundaryReason::BranchChange,
        matches: branch_switched,
    },
    BoundaryRule {
        name: "directory switch",
        reason: BoundaryReason::DirChange,
        matches: directory_switched,
    },
    BoundaryRule {
        name: "file pattern shift",
        reason: BoundaryReason::PatternShift,
        matches: file_pattern_shifted,
    },
];

/// First matching rule, or `None` for a continuation.
pub fn first_match(
    observation: &SignalObservation,
    settings: &SessionSettings,
) -> Option<&'static BoundaryRule> {
    BOUNDARY_RULES
        .iter()
        .find(|rule| (rule.matches)(observation, settings))
}

fn gap_exceeds(observation: &SignalObservation, threshold_secs: u64) -> bool {
    let threshold = i64::try_from(threshold_secs).unwrap_or(i64::MAX);
    observation.gap_secs.is_some_and(|gap| gap > threshold)
}

fn idle_gap_exceeded(observation: &SignalObservation, settings: &SessionSettings) -> bool {
    gap_exceeds(observation, settings.session_boundary_time_threshold_seconds)
}

fn branch_switched(observation: &SignalObservation, _: &SessionSettings) -> bool {
    observation.branch_changed == Some(true)
}

fn directory_switched(observation: &SignalObservation, _: &SessionSettings) -> bool {
    observation.dir_changed == Some(true)
}

fn file_pattern_shifted(observation: &SignalObservation, settings: &SessionSettings) -> bool {
    let floor = 1.0 - settings.file_continuity_threshold;
    observation
        .file_similarity
        .is_some_and(|similarity| similarity < floor)
        && gap_exceeds(observation, settings.pattern_shift_gap_seconds)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
