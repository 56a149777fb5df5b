//! Context thread construction and status derivation.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{DateTime, Duration, Utc};
use mnemo_core::{ContextThread, RecordKind, SessionId, ThreadId, ThreadStatus};
use regex::Regex;

use super::SessionBundle;

const MAX_KEY_DECISIONS: usize = 20;

/// Theme of sessions without a branch.
pub const UNTHREADED_THEME: &str = "unthreaded";

static COMPLETION_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(complete|completed|finished|done|shipped)\b").expect("valid regex")
});

static BLOCKING_WORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(blocked|waiting|pending)\b").expect("valid regex"));

/// Derive a thread's status.
///
/// Checked in order: newest session still open, inactive for longer than
/// `dormant_after`, decisions mentioning completion, decisions mentioning a
/// blocker. Anything else is active.
pub fn derive_status(
    latest_open: bool,
    last_activity: DateTime<Utc>,
    key_decisions: &[String],
    dormant_after: Duration,
    now: DateTime<Utc>,
) -> ThreadStatus {
    if latest_open {
        return ThreadStatus::InProgress;
    }
    if now - last_activity > dormant_after {
        return ThreadStatus::Dormant;
    }
    if key_decisions.iter().any(|d| COMPLETION_WORDS.is_match(d)) {
        return ThreadStatus::Completed;
    }
    if key_decisions.iter().any(|d| BLOCKING_WORDS.is_match(d)) {
        return ThreadStatus::Blocked;
    }
    ThreadStatus::Active
}

/// Build a thread from its member sessions.
///
/// Sessions are ordered by start time; key decisions are the distinct
/// decision contents, oldest first. Obsolete records are ignored.
pub fn build_thread(
    theme: &str,
    bundles: &[&SessionBundle],
    dormant_after: Duration,
    now: DateTime<Utc>,
) -> ContextThread {
    let mut ordered: Vec<&SessionBundle> = bundles.to_vec();
    ordered.sort_by(|a, b| {
        a.session
            .start_time
            .cmp(&b.session.start_time)
            .then_with(|| a.session.id.cmp(&b.session.id))
    });

    let mut key_decisions: Vec<String> = Vec::new();
    for bundle in &ordered {
        let mut decisions: Vec<_> = bundle
            .records
            .iter()
            .filter(|r| r.kind == RecordKind::Decision && !r.is_obsolete())
            .collect();
        decisions.sort_by_key(|r| r.timestamp);
        for record in decisions {
            let content = record.content.trim().to_string();
            if !key_decisions.contains(&content) {
                key_decisions.push(content);
            }
        }
    }
    if key_decisions.len() > MAX_KEY_DECISIONS {
        let _ = key_decisions.drain(..key_decisions.len() - MAX_KEY_DECISIONS);
    }

    let created_at = ordered.first().map_or(now, |b| b.session.start_time);
    let updated_at = ordered
        .iter()
        .map(|b| b.session.effective_end())
        .max()
        .unwrap_or(now);
    let latest_open = ordered.last().is_some_and(|b| b.session.is_open());
    let thread_id = ordered
        .iter()
        .rev()
        .find_map(|b| b.session.thread_id.clone())
        .unwrap_or_default();

    ContextThread {
        id: thread_id,
        theme: theme.to_string(),
        session_ids: ordered.iter().map(|b| b.session.id.clone()).collect(),
        status: derive_status(latest_open, updated_at, &key_decisions, dormant_after, now),
        key_decisions,
        created_at,
        updated_at,
    }
}

/// Sessions sharing a thread.
#[derive(Debug)]
pub struct ThreadGroup<'a> {
    /// Thread ID: the known thread's, or one derived from the branch.
    pub thread_id: ThreadId,
    /// Theme.
    pub theme: String,
    /// Member sessions present in the input.
    pub members: Vec<&'a SessionBundle>,
}

/// Group sessions into threads.
///
/// Sessions listed in `known` join that thread; the rest are grouped by
/// branch under an ID derived from the branch name.
pub fn group_by_thread<'a>(
    bundles: &'a [SessionBundle],
    known: &BTreeMap<SessionId, ContextThread>,
) -> Vec<ThreadGroup<'a>> {
    let mut groups: BTreeMap<ThreadId, ThreadGroup<'a>> = BTreeMap::new();
    for bundle in bundles {
        let (thread_id, theme) = match known.get(&bundle.session.id) {
            Some(thread) => (thread.id.clone(), thread.theme.clone()),
            None => {
                let theme = bundle
                    .session
                    .branch
                    .clone()
                    .unwrap_or_else(|| UNTHREADED_THEME.to_string());
                (branch_thread_id(&theme), theme)
            }
        };
        groups
            .entry(thread_id.clone())
            .or_insert_with(|| ThreadGroup {
                thread_id,
                theme,
                members: Vec::new(),
            })
            .members
            .push(bundle);
    }
    groups.into_values().collect()
}

/// Stable thread ID for a branch-derived thread.
pub fn branch_thread_id(theme: &str) -> ThreadId {
    ThreadId::from_string(format!("branch:{theme}"))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
