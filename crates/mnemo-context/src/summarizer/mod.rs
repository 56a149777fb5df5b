//! Hierarchical session summarization.
//!
//! Sessions are summarized at a granularity that depends on their age:
//!
//! - **immediate** (younger than `immediateWindowSeconds`): every record,
//!   verbatim
//! - **recent** (up to `recentWindowSeconds`): one compressed paragraph per
//!   session
//! - **historical** (older): all sessions of a context thread merged into a
//!   single theme-level summary
//!
//! Compression works on structured [`SummaryEntry`] values, never on
//! rendered prose, so a summary can be re-compressed without losing
//! decisions.

mod hierarchy;
mod pipeline;
mod render;
mod threads;

use chrono::{DateTime, Duration, Utc};
use mnemo_core::{
    ContextThread, MemoryRecord, SessionId, SessionRecord, SessionSummary, SummaryEntry,
    SummaryTier, ThreadId, estimate_tokens,
};
use mnemo_settings::SummarySettings;
use tracing::debug;

pub use hierarchy::ContextHierarchy;
pub use threads::{
    ThreadGroup, UNTHREADED_THEME, branch_thread_id, build_thread, derive_status, group_by_thread,
};

use pipeline::{PipelineConfig, compress_entries, reduce};
use render::{measure, render, session_heading, thread_heading};

const MAX_DORMANT_DAYS: u64 = 36_500;

/// A session together with the records captured in it.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionBundle {
    /// The session.
    pub session: SessionRecord,
    /// Its records.
    pub records: Vec<MemoryRecord>,
}

impl SessionBundle {
    /// Pair a session with its records.
    #[must_use]
    pub fn new(session: SessionRecord, records: Vec<MemoryRecord>) -> Self {
        Self { session, records }
    }
}

/// Produces tiered summaries of sessions and threads.
#[derive(Clone, Debug)]
pub struct ContextSummarizer {
    settings: SummarySettings,
}

impl Default for ContextSummarizer {
    fn default() -> Self {
        Self::new(&SummarySettings::default())
    }
}

impl ContextSummarizer {
    /// Summarizer with the given windows and thresholds.
    #[must_use]
    pub fn new(settings: &SummarySettings) -> Self {
        Self {
            settings: settings.clone(),
        }
    }

    fn config(&self) -> PipelineConfig {
        PipelineConfig {
            duplicate_threshold: self.settings.duplicate_similarity_threshold,
            conflict_threshold: self.settings.conflict_similarity_threshold,
            min_reasoning_chars: self.settings.min_reasoning_chars,
        }
    }

    fn dormant_after(&self) -> Duration {
        let days = self.settings.dormant_after_days.min(MAX_DORMANT_DAYS);
        Duration::days(i64::try_from(days).unwrap_or_default())
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    fn target(&self, original: usize) -> usize {
        (original as f64 * self.settings.compression_ratio).ceil() as usize
    }

    /// Tier of a session by the age of its end (its start while open).
    pub fn tier_for(&self, session: &SessionRecord, now: DateTime<Utc>) -> SummaryTier {
        let reference = session.end_time.unwrap_or(session.start_time);
        let age = (now - reference).num_seconds().max(0);
        let age = u64::try_from(age).unwrap_or_default();
        if age < self.settings.immediate_window_seconds {
            SummaryTier::Immediate
        } else if age < self.settings.recent_window_seconds {
            SummaryTier::Recent
        } else {
            SummaryTier::Historical
        }
    }

    /// Summarize one session at the tier matching its age.
    ///
    /// A historical session is summarized as part of `thread` when given,
    /// otherwise as a one-session thread named after its branch.
    pub fn summarize(
        &self,
        bundle: &SessionBundle,
        thread: Option<&ContextThread>,
        now: DateTime<Utc>,
    ) -> SessionSummary {
        match self.tier_for(&bundle.session, now) {
            SummaryTier::Historical => {
                let thread = thread.cloned().unwrap_or_else(|| {
                    let theme = bundle.session.branch.as_deref().unwrap_or(UNTHREADED_THEME);
                    let mut thread = build_thread(theme, &[bundle], self.dormant_after(), now);
                    thread.id = bundle
                        .session
                        .thread_id
                        .clone()
                        .unwrap_or_else(|| branch_thread_id(theme));
                    thread
                });
                self.summarize_thread(&thread, &bundle.session.id, &bundle.records, now)
            }
            tier => self.summarize_at(
                tier,
                bundle.session.id.clone(),
                bundle.session.thread_id.clone(),
                session_heading(&bundle.session),
                bundle.records.iter(),
                now,
            ),
        }
    }

    /// Compress several sessions into one summary.
    ///
    /// The tier follows the newest session. The summary is keyed by the
    /// newest session; `None` when `bundles` is empty.
    pub fn compress(&self, bundles: &[SessionBundle], now: DateTime<Utc>) -> Option<SessionSummary> {
        let newest = bundles.iter().max_by(|a, b| {
            a.session
                .start_time
                .cmp(&b.session.start_time)
                .then_with(|| a.session.id.cmp(&b.session.id))
        })?;
        let records = bundles.iter().flat_map(|b| b.records.iter());
        let tier = self.tier_for(&newest.session, now);
        let summary = match tier {
            SummaryTier::Historical => {
                let theme = newest.session.branch.as_deref().unwrap_or(UNTHREADED_THEME);
                let members: Vec<&SessionBundle> = bundles.iter().collect();
                let mut thread = build_thread(theme, &members, self.dormant_after(), now);
                if newest.session.thread_id.is_none() {
                    thread.id = branch_thread_id(theme);
                }
                let records: Vec<MemoryRecord> = records.cloned().collect();
                self.summarize_thread(&thread, &newest.session.id, &records, now)
            }
            tier => self.summarize_at(
                tier,
                newest.session.id.clone(),
                newest.session.thread_id.clone(),
                session_heading(&newest.session),
                records,
                now,
            ),
        };
        Some(summary)
    }

    /// Theme-level summary of a thread, keyed by `session_id` (normally the
    /// thread's newest session).
    pub fn summarize_thread(
        &self,
        thread: &ContextThread,
        session_id: &SessionId,
        records: &[MemoryRecord],
        now: DateTime<Utc>,
    ) -> SessionSummary {
        let sessions = thread.session_ids.len().max(1);
        self.summarize_at(
            SummaryTier::Historical,
            session_id.clone(),
            Some(thread.id.clone()),
            thread_heading(&thread.theme, sessions, thread.status),
            records.iter(),
            now,
        )
    }

    fn summarize_at<'a>(
        &self,
        tier: SummaryTier,
        session_id: SessionId,
        thread_id: Option<ThreadId>,
        heading: String,
        records: impl Iterator<Item = &'a MemoryRecord>,
        now: DateTime<Utc>,
    ) -> SessionSummary {
        let mut entries: Vec<SummaryEntry> = records
            .filter(|r| !r.is_obsolete())
            .map(SummaryEntry::from_record)
            .collect();
        entries.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.source_id.cmp(&b.source_id))
        });
        let original_token_count = measure(&entries);

        let (entries, conflicts) = if tier == SummaryTier::Immediate {
            (entries, Vec::new())
        } else {
            let compressed =
                compress_entries(entries, self.target(original_token_count), self.config());
            (compressed.entries, compressed.conflicts)
        };

        let text = render(tier, &heading, &entries);
        let token_count = estimate_tokens(&text);
        debug!(
            session_id = %session_id,
            tier = tier.as_str(),
            entries = entries.len(),
            conflicts = conflicts.len(),
            tokens = token_count,
            original_tokens = original_token_count,
            "session summarized"
        );

        SessionSummary {
            session_id,
            thread_id,
            tier,
            heading,
            text,
            token_count,
            original_token_count,
            entries,
            conflicts,
            created_at: now,
        }
    }

    /// Compress an existing summary further.
    ///
    /// Only reasoning trimming and bug-fix or rejection removal are
    /// repeated; decisions and their content always survive, and a summary
    /// already within its target comes back unchanged apart from
    /// `created_at`.
    pub fn resummarize(&self, summary: &SessionSummary, now: DateTime<Utc>) -> SessionSummary {
        if summary.tier == SummaryTier::Immediate {
            return SessionSummary {
                created_at: now,
                ..summary.clone()
            };
        }
        let mut entries = summary.entries.clone();
        reduce(
            &mut entries,
            self.target(summary.original_token_count),
            self.settings.min_reasoning_chars,
        );
        let text = render(summary.tier, &summary.heading, &entries);
        SessionSummary {
            token_count: estimate_tokens(&text),
            text,
            entries,
            created_at: now,
            ..summary.clone()
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
