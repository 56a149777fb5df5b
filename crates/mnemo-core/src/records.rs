//! Memory records: the append-only unit of captured knowledge.
//!
//! A record is immutable once appended except for its [`RecordStatus`].
//! The core `content` of a [`RecordKind::Decision`] is never shortened by
//! any compression stage; only its `reasoning` may be trimmed.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{RecordId, SessionId};
use crate::similarity::lowercase_set;

/// What a record captures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// An architectural or implementation decision.
    Decision,
    /// A piece of pending or finished work.
    Todo,
    /// A bug and its fix.
    BugFix,
    /// An approach that was tried or considered and rejected.
    Rejection,
}

impl RecordKind {
    /// All kinds, in rendering order.
    pub const ALL: [Self; 4] = [Self::Decision, Self::Rejection, Self::BugFix, Self::Todo];

    /// Stable string form used in storage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Decision => "decision",
            Self::Todo => "todo",
            Self::BugFix => "bug_fix",
            Self::Rejection => "rejection",
        }
    }

    /// Parse the storage form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "decision" => Some(Self::Decision),
            "todo" => Some(Self::Todo),
            "bug_fix" => Some(Self::BugFix),
            "rejection" => Some(Self::Rejection),
            _ => None,
        }
    }

    /// Family used when deciding whether two records can contradict.
    pub fn family(self) -> KindFamily {
        match self {
            Self::Decision | Self::Rejection => KindFamily::Stance,
            Self::Todo => KindFamily::Work,
            Self::BugFix => KindFamily::Fix,
        }
    }
}

/// Groups of kinds whose records may override one another.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KindFamily {
    /// Decisions and rejections: a later stance replaces an earlier one.
    Stance,
    /// Todos.
    Work,
    /// Bug fixes.
    Fix,
}

/// Mutable lifecycle status of a record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Pending work, or simply live for non-todo kinds.
    #[default]
    Open,
    /// Work has started.
    InProgress,
    /// Work is finished.
    Completed,
    /// Superseded; never offered for injection again.
    Obsolete,
}

impl RecordStatus {
    /// Stable string form used in storage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Obsolete => "obsolete",
        }
    }

    /// Parse the storage form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(Self::Open),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "obsolete" => Some(Self::Obsolete),
            _ => None,
        }
    }
}

/// Files plus lower-cased tags; two records sharing a key talk about the
/// same topic.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TopicKey {
    /// Files the records touch.
    pub files: BTreeSet<String>,
    /// Lower-cased tags.
    pub tags: BTreeSet<String>,
}

impl TopicKey {
    /// Build a key; `None` when there are no files to anchor the topic.
    pub fn new(files: &BTreeSet<String>, tags: &BTreeSet<String>) -> Option<Self> {
        if files.is_empty() {
            return None;
        }
        Some(Self {
            files: files.clone(),
            tags: lowercase_set(tags),
        })
    }
}

/// A structured unit of captured knowledge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryRecord {
    /// Record ID.
    pub id: RecordId,
    /// Record kind.
    pub kind: RecordKind,
    /// Core content. Never truncated for decisions.
    pub content: String,
    /// Optional rationale; the first thing compression trims.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// Files the record refers to.
    #[serde(default)]
    pub files: BTreeSet<String>,
    /// Free-form tags.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// When the record was captured.
    pub timestamp: DateTime<Utc>,
    /// Who captured it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Session the record was captured in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    /// Lifecycle status.
    #[serde(default)]
    pub status: RecordStatus,
}

impl MemoryRecord {
    /// Create an open record with a fresh ID.
    pub fn new(kind: RecordKind, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: RecordId::new(),
            kind,
            content: content.into(),
            reasoning: None,
            files: BTreeSet::new(),
            tags: BTreeSet::new(),
            timestamp,
            author: None,
            session_id: None,
            status: RecordStatus::Open,
        }
    }

    /// Replace the ID.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<RecordId>) -> Self {
        self.id = id.into();
        self
    }

    /// Attach reasoning.
    #[must_use]
    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    /// Attach files.
    #[must_use]
    pub fn with_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.files = files.into_iter().map(Into::into).collect();
        self
    }

    /// Attach tags.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Attach the owning session.
    #[must_use]
    pub fn with_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Attach the author.
    #[must_use]
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Set the status.
    #[must_use]
    pub fn with_status(mut self, status: RecordStatus) -> Self {
        self.status = status;
        self
    }

    /// Whether the record was superseded.
    pub fn is_obsolete(&self) -> bool {
        self.status == RecordStatus::Obsolete
    }

    /// Topic key used for conflict detection.
    pub fn topic_key(&self) -> Option<TopicKey> {
        TopicKey::new(&self.files, &self.tags)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_storage_form() {
        for kind in RecordKind::ALL {
            assert_eq!(RecordKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(RecordKind::parse("note"), None);
    }

    #[test]
    fn status_round_trips_through_storage_form() {
        for status in [
            RecordStatus::Open,
            RecordStatus::InProgress,
            RecordStatus::Completed,
            RecordStatus::Obsolete,
        ] {
            assert_eq!(RecordStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn decisions_and_rejections_share_a_family() {
        assert_eq!(RecordKind::Decision.family(), RecordKind::Rejection.family());
        assert_ne!(RecordKind::Todo.family(), RecordKind::BugFix.family());
    }

    #[test]
    fn topic_key_requires_files() {
        let now = Utc::now();
        let bare = MemoryRecord::new(RecordKind::Decision, "use sqlite", now).with_tags(["db"]);
        assert!(bare.topic_key().is_none());

        let a = MemoryRecord::new(RecordKind::Decision, "use sqlite", now)
            .with_files(["src/db.rs"])
            .with_tags(["DB"]);
        let b = MemoryRecord::new(RecordKind::Rejection, "not postgres", now)
            .with_files(["src/db.rs"])
            .with_tags(["db"]);
        assert_eq!(a.topic_key(), b.topic_key());
    }

    #[test]
    fn serde_uses_camel_case_and_skips_empty_options() {
        let rec = MemoryRecord::new(RecordKind::BugFix, "fix race", Utc::now()).with_id("r1");
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["kind"], "bug_fix");
        assert_eq!(json["status"], "open");
        assert!(json.get("reasoning").is_none());
        assert!(json.get("sessionId").is_none());
    }

    #[test]
    fn builder_sets_fields() {
        let sid = SessionId::from("s1");
        let rec = MemoryRecord::new(RecordKind::Todo, "write docs", Utc::now())
            .with_reasoning("users asked")
            .with_author("dev")
            .with_session(sid.clone())
            .with_status(RecordStatus::InProgress);
        assert_eq!(rec.reasoning.as_deref(), Some("users asked"));
        assert_eq!(rec.author.as_deref(), Some("dev"));
        assert_eq!(rec.session_id, Some(sid));
        assert!(!rec.is_obsolete());
    }
}
