//! Sessions, context threads, and session summaries.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{RecordId, SessionId, ThreadId};
use crate::records::{MemoryRecord, RecordKind, RecordStatus};

/// A bounded window of continuous work.
///
/// Owned exclusively by the session tracker while open. Everyone else sees
/// immutable snapshots.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// Session ID.
    pub id: SessionId,
    /// When the session opened.
    pub start_time: DateTime<Utc>,
    /// When the session closed; `None` while open.
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// Time of the latest observed activity.
    pub last_activity_at: DateTime<Utc>,
    /// Version-control branch, when known.
    #[serde(default)]
    pub branch: Option<String>,
    /// Working directory, when known.
    #[serde(default)]
    pub working_directory: Option<String>,
    /// Files touched during the session.
    #[serde(default)]
    pub active_files: BTreeSet<String>,
    /// How many activity bundles mentioned each file.
    #[serde(default)]
    pub file_access_counts: BTreeMap<String, u32>,
    /// Continuity with the previous session, in `[0, 1]`.
    pub continuity_score: f64,
    /// Rendered summaries by tier.
    #[serde(default)]
    pub summaries: SummaryTiers,
    /// Context thread this session belongs to.
    #[serde(default)]
    pub thread_id: Option<ThreadId>,
}

impl SessionRecord {
    /// Open a new session at `now`.
    pub fn open(
        now: DateTime<Utc>,
        branch: Option<String>,
        working_directory: Option<String>,
        files: &BTreeSet<String>,
    ) -> Self {
        let mut session = Self {
            id: SessionId::new(),
            start_time: now,
            end_time: None,
            last_activity_at: now,
            branch,
            working_directory,
            active_files: BTreeSet::new(),
            file_access_counts: BTreeMap::new(),
            continuity_score: 0.5,
            summaries: SummaryTiers::default(),
            thread_id: None,
        };
        session.touch_files(files);
        session
    }

    /// Whether the session is still open.
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// Close the session at its last observed activity.
    pub fn close(&mut self) {
        if self.end_time.is_none() {
            self.end_time = Some(self.last_activity_at);
        }
    }

    /// Record files seen in an activity bundle.
    pub fn touch_files(&mut self, files: &BTreeSet<String>) {
        for file in files {
            let _ = self.active_files.insert(file.clone());
            *self.file_access_counts.entry(file.clone()).or_insert(0) += 1;
        }
    }

    /// End time when closed, otherwise the latest activity.
    pub fn effective_end(&self) -> DateTime<Utc> {
        self.end_time.unwrap_or(self.last_activity_at)
    }

    /// Session length in seconds.
    pub fn duration_secs(&self) -> i64 {
        (self.effective_end() - self.start_time).num_seconds().max(0)
    }
}

/// Rendered summary text per tier.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryTiers {
    /// Verbatim tier.
    #[serde(default)]
    pub immediate: Option<String>,
    /// One-paragraph tier.
    #[serde(default)]
    pub recent: Option<String>,
    /// Thread-level tier.
    #[serde(default)]
    pub historical: Option<String>,
}

impl SummaryTiers {
    /// Store text for a tier.
    pub fn set(&mut self, tier: SummaryTier, text: String) {
        match tier {
            SummaryTier::Immediate => self.immediate = Some(text),
            SummaryTier::Recent => self.recent = Some(text),
            SummaryTier::Historical => self.historical = Some(text),
        }
    }

    /// Text for a tier.
    pub fn get(&self, tier: SummaryTier) -> Option<&str> {
        match tier {
            SummaryTier::Immediate => self.immediate.as_deref(),
            SummaryTier::Recent => self.recent.as_deref(),
            SummaryTier::Historical => self.historical.as_deref(),
        }
    }
}

/// Summary granularity by session age.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryTier {
    /// Newest sessions, kept verbatim.
    Immediate,
    /// One paragraph per session.
    Recent,
    /// Merged per context thread.
    Historical,
}

impl SummaryTier {
    /// Stable string form used in storage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::Recent => "recent",
            Self::Historical => "historical",
        }
    }

    /// Parse the storage form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "immediate" => Some(Self::Immediate),
            "recent" => Some(Self::Recent),
            "historical" => Some(Self::Historical),
            _ => None,
        }
    }
}

/// Derived status of a context thread.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadStatus {
    /// Ongoing, nothing notable.
    #[default]
    Active,
    /// The newest session is still open.
    InProgress,
    /// Decisions report the work as done.
    Completed,
    /// Decisions report the work as stuck.
    Blocked,
    /// No activity for a week.
    Dormant,
}

impl ThreadStatus {
    /// Stable string form used in storage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Blocked => "blocked",
            Self::Dormant => "dormant",
        }
    }

    /// Parse the storage form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "blocked" => Some(Self::Blocked),
            "dormant" => Some(Self::Dormant),
            _ => None,
        }
    }
}

/// Cross-session grouping of related work, used by historical summaries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextThread {
    /// Thread ID.
    pub id: ThreadId,
    /// Short theme, e.g. a branch or feature name.
    pub theme: String,
    /// Member sessions, oldest first.
    pub session_ids: Vec<SessionId>,
    /// Merged key decisions across member sessions.
    pub key_decisions: Vec<String>,
    /// Derived status.
    pub status: ThreadStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

/// A record as retained inside a summary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryEntry {
    /// Record this entry came from (the most recent one after merging).
    pub source_id: RecordId,
    /// Record kind.
    pub kind: RecordKind,
    /// Core content.
    pub content: String,
    /// Possibly trimmed reasoning.
    #[serde(default)]
    pub reasoning: Option<String>,
    /// Files.
    #[serde(default)]
    pub files: BTreeSet<String>,
    /// Tags.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Latest known status.
    pub status: RecordStatus,
    /// Capture time of the source record.
    pub timestamp: DateTime<Utc>,
    /// How many records were merged into this entry.
    pub merge_count: u32,
}

impl SummaryEntry {
    /// Lift a record into a summary entry.
    pub fn from_record(record: &MemoryRecord) -> Self {
        Self {
            source_id: record.id.clone(),
            kind: record.kind,
            content: record.content.clone(),
            reasoning: record.reasoning.clone(),
            files: record.files.clone(),
            tags: record.tags.clone(),
            status: record.status,
            timestamp: record.timestamp,
            merge_count: 1,
        }
    }
}

/// An earlier record overridden by a later one on the same topic.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Supersession {
    /// The dropped, older record.
    pub superseded: RecordId,
    /// The retained, newer record.
    pub superseding: RecordId,
}

/// Compressed view of one session (or, for the historical tier, one thread).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    /// Session the summary belongs to. Thread summaries use the newest
    /// member session.
    pub session_id: SessionId,
    /// Thread, for historical summaries.
    #[serde(default)]
    pub thread_id: Option<ThreadId>,
    /// Tier.
    pub tier: SummaryTier,
    /// Lead-in of `text`, such as `Session 2026-03-02 on main`.
    #[serde(default)]
    pub heading: String,
    /// Rendered text.
    pub text: String,
    /// Estimated tokens of `text`.
    pub token_count: usize,
    /// Estimated tokens of the uncompressed input.
    pub original_token_count: usize,
    /// Retained entries.
    pub entries: Vec<SummaryEntry>,
    /// Conflicts resolved in favour of the newer record.
    #[serde(default)]
    pub conflicts: Vec<Supersession>,
    /// When the summary was produced.
    pub created_at: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn files(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn open_session_tracks_files() {
        let now = Utc::now();
        let mut s = SessionRecord::open(now, Some("main".into()), None, &files(&["a.rs"]));
        s.touch_files(&files(&["a.rs", "b.rs"]));
        assert!(s.is_open());
        assert_eq!(s.active_files.len(), 2);
        assert_eq!(s.file_access_counts["a.rs"], 2);
        assert_eq!(s.file_access_counts["b.rs"], 1);
    }

    #[test]
    fn close_uses_last_activity() {
        let start = Utc::now();
        let mut s = SessionRecord::open(start, None, None, &BTreeSet::new());
        s.last_activity_at = start + Duration::minutes(45);
        s.close();
        assert_eq!(s.end_time, Some(start + Duration::minutes(45)));
        assert_eq!(s.duration_secs(), 45 * 60);

        // closing twice keeps the first end time
        s.last_activity_at = start + Duration::hours(3);
        s.close();
        assert_eq!(s.end_time, Some(start + Duration::minutes(45)));
    }

    #[test]
    fn tiers_store_text() {
        let mut tiers = SummaryTiers::default();
        tiers.set(SummaryTier::Recent, "paragraph".into());
        assert_eq!(tiers.get(SummaryTier::Recent), Some("paragraph"));
        assert_eq!(tiers.get(SummaryTier::Historical), None);
    }

    #[test]
    fn tier_and_thread_status_parse() {
        assert_eq!(SummaryTier::parse("historical"), Some(SummaryTier::Historical));
        assert_eq!(ThreadStatus::parse("blocked"), Some(ThreadStatus::Blocked));
        assert_eq!(ThreadStatus::parse("stuck"), None);
    }
}
