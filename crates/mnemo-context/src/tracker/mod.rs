//! Session boundary detection.
//!
//! The [`SessionTracker`] is the single writer of the open [`SessionRecord`].
//! Each turn it compares the incoming [`ActivitySignals`] with the open
//! session, walks the ordered [`BOUNDARY_RULES`], and either extends the
//! session or closes it and opens a new one. Closed sessions are handed to
//! the summarization queue; those the queue cannot take yet are held and
//! offered again on the next turn. Readers see immutable snapshots through
//! [`SessionTracker::subscribe`].

mod continuity;
mod rules;

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use mnemo_core::{SessionId, SessionRecord, ThreadId};
use mnemo_settings::SessionSettings;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

pub use continuity::{NEUTRAL_CONTINUITY, continuity_score};
pub use rules::{BOUNDARY_RULES, BoundaryReason, BoundaryRule, SignalObservation, first_match};

use crate::signals::ActivitySignals;
use crate::worker::{SummaryQueue, Undelivered};

/// Outcome of [`SessionTracker::detect_boundary`].
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundaryDecision {
    /// Whether this turn opened a new session.
    pub is_new_session: bool,
    /// Matching rule, or `CONTINUATION`.
    pub reason: BoundaryReason,
    /// Signals compared against the reference session.
    pub observation: SignalObservation,
    /// The session that is open after this turn.
    pub session_id: SessionId,
    /// The session this turn closed, if any.
    #[serde(skip)]
    pub closed: Option<SessionRecord>,
}

/// Owns the open session and decides where sessions begin and end.
pub struct SessionTracker {
    settings: SessionSettings,
    open: Option<SessionRecord>,
    previous: Option<SessionRecord>,
    last_files: BTreeSet<String>,
    queue: Option<SummaryQueue>,
    undelivered: VecDeque<SessionRecord>,
    snapshots: watch::Sender<Option<Arc<SessionRecord>>>,
}

impl SessionTracker {
    /// Tracker with no session history.
    #[must_use]
    pub fn new(settings: &SessionSettings) -> Self {
        let (snapshots, _) = watch::channel(None);
        Self {
            settings: settings.clone(),
            open: None,
            previous: None,
            last_files: BTreeSet::new(),
            queue: None,
            undelivered: VecDeque::new(),
            snapshots,
        }
    }

    /// Hand closed sessions to `queue`.
    #[must_use]
    pub fn with_summary_queue(mut self, queue: SummaryQueue) -> Self {
        self.queue = Some(queue);
        self
    }

    pub(crate) fn set_summary_queue(&mut self, queue: SummaryQueue) {
        self.queue = Some(queue);
    }

    /// Seed from persisted state after a restart.
    ///
    /// An open session becomes the open session again; a closed one becomes
    /// the prior session that continuity is measured against.
    pub fn resume(&mut self, session: SessionRecord) {
        debug!(session_id = %session.id, open = session.is_open(), "resuming session");
        if session.is_open() {
            self.open = Some(session);
            self.last_files.clear();
        } else {
            self.previous = Some(session);
        }
        self.publish();
    }

    /// The open session.
    pub fn open_session(&self) -> Option<&SessionRecord> {
        self.open.as_ref()
    }

    /// The most recently closed session.
    pub fn previous_session(&self) -> Option<&SessionRecord> {
        self.previous.as_ref()
    }

    /// Watch handle yielding a snapshot of the open session after every
    /// change.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<SessionRecord>>> {
        self.snapshots.subscribe()
    }

    /// Closed sessions still waiting for room in the summarization queue.
    pub fn undelivered(&self) -> usize {
        self.undelivered.len()
    }

    /// Offer held sessions to the queue again, oldest first, without
    /// blocking. Returns how many are still held.
    pub fn retry_undelivered(&mut self) -> usize {
        let Some(queue) = &self.queue else {
            return self.undelivered.len();
        };
        while let Some(session) = self.undelivered.pop_front() {
            match queue.try_enqueue(session) {
                Ok(()) => {}
                Err(Undelivered::Full(session)) => {
                    self.undelivered.push_front(session);
                    warn!(held = self.undelivered.len(), "summarization queue full, holding closed sessions");
                    break;
                }
                Err(Undelivered::Closed(session)) => {
                    self.undelivered.push_front(session);
                    error!(held = self.undelivered.len(), "summarization worker stopped, closed sessions held");
                    break;
                }
            }
        }
        self.undelivered.len()
    }

    /// Deliver every held session, waiting for queue capacity.
    ///
    /// Returns how many could not be delivered because the worker stopped.
    pub async fn drain_undelivered(&mut self) -> usize {
        let Some(queue) = self.queue.clone() else {
            return self.undelivered.len();
        };
        while let Some(session) = self.undelivered.pop_front() {
            if let Err(session) = queue.enqueue(session).await {
                self.undelivered.push_front(session);
                error!(held = self.undelivered.len(), "summarization worker stopped, closed sessions lost");
                break;
            }
        }
        self.undelivered.len()
    }

    /// Evaluate one bundle of signals.
    pub fn detect_boundary(&mut self, signals: &ActivitySignals) -> BoundaryDecision {
        if !self.undelivered.is_empty() {
            let _held = self.retry_undelivered();
        }
        let reference = self.open.as_ref().or(self.previous.as_ref());
        let observation = SignalObservation::compare(signals, reference, &self.last_files);

        if self.open.is_none() {
            let session_id = self.start_session(signals);
            return BoundaryDecision {
                is_new_session: true,
                reason: BoundaryReason::NoOpenSession,
                observation,
                session_id,
                closed: None,
            };
        }

        match first_match(&observation, &self.settings) {
            Some(rule) => {
                let closed = self.close_current();
                let session_id = self.start_session(signals);
                info!(
                    closed_session = closed.as_ref().map(|s| s.id.as_str()).unwrap_or_default(),
                    session_id = %session_id,
                    reason = %rule.reason,
                    rule = rule.name,
                    gap_secs = observation.gap_secs,
                    "session boundary"
                );
                BoundaryDecision {
                    is_new_session: true,
                    reason: rule.reason,
                    observation,
                    session_id,
                    closed,
                }
            }
            None => {
                let session_id = self.extend_session(signals);
                BoundaryDecision {
                    is_new_session: false,
                    reason: BoundaryReason::Continuation,
                    observation,
                    session_id,
                    closed: None,
                }
            }
        }
    }

    /// Attach the open session to a context thread.
    pub fn set_thread(&mut self, thread_id: ThreadId) {
        let window = self.settings.continuity_recency_window_seconds;
        if let Some(open) = self.open.as_mut() {
            open.thread_id = Some(thread_id);
            open.continuity_score = continuity_score(open, self.previous.as_ref(), window);
        }
        self.publish();
    }

    /// Close the open session on shutdown.
    ///
    /// The end time is the session's last activity, capped at `now`.
    pub fn close_open(&mut self, now: DateTime<Utc>) -> Option<SessionRecord> {
        if let Some(open) = self.open.as_mut() {
            open.last_activity_at = open.last_activity_at.min(now).max(open.start_time);
        }
        let closed = self.close_current();
        self.publish();
        closed
    }

    fn close_current(&mut self) -> Option<SessionRecord> {
        let mut closed = self.open.take()?;
        closed.close();
        self.previous = Some(closed.clone());
        self.last_files.clear();
        if self.queue.is_some() {
            self.undelivered.push_back(closed.clone());
            let _held = self.retry_undelivered();
        }
        Some(closed)
    }

    fn start_session(&mut self, signals: &ActivitySignals) -> SessionId {
        let mut session = SessionRecord::open(
            signals.at,
            signals.branch.clone(),
            signals.working_directory.clone(),
            &signals.files,
        );
        if let Some(prior) = &self.previous {
            if prior.branch.is_some() && prior.branch == session.branch {
                session.thread_id.clone_from(&prior.thread_id);
            }
        }
        session.continuity_score = continuity_score(
            &session,
            self.previous.as_ref(),
            self.settings.continuity_recency_window_seconds,
        );
        self.last_files.clone_from(&signals.files);

        debug!(
            session_id = %session.id,
            continuity = session.continuity_score,
            "session opened"
        );
        let id = session.id.clone();
        self.open = Some(session);
        self.publish();
        id
    }

    fn extend_session(&mut self, signals: &ActivitySignals) -> SessionId {
        let window = self.settings.continuity_recency_window_seconds;
        let Some(open) = self.open.as_mut() else {
            return self.start_session(signals);
        };
        open.last_activity_at = open.last_activity_at.max(signals.at);
        open.touch_files(&signals.files);
        if open.branch.is_none() {
            open.branch.clone_from(&signals.branch);
        }
        if open.working_directory.is_none() {
            open.working_directory.clone_from(&signals.working_directory);
        }
        open.continuity_score = continuity_score(open, self.previous.as_ref(), window);
        let id = open.id.clone();
        if !signals.files.is_empty() {
            self.last_files.clone_from(&signals.files);
        }
        self.publish();
        id
    }

    fn publish(&self) {
        let _ = self.snapshots.send_replace(self.open.clone().map(Arc::new));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn tracker() -> SessionTracker {
        SessionTracker::new(&SessionSettings::default())
    }

    fn base(at: DateTime<Utc>) -> ActivitySignals {
        ActivitySignals::at(at)
            .with_branch("main")
            .with_dir("/repo")
            .with_files(["src/a.rs", "src/b.rs"])
    }

    #[test]
    fn first_turn_opens_a_session() {
        let mut t = tracker();
        let d = t.detect_boundary(&base(Utc::now()));
        assert!(d.is_new_session);
        assert_eq!(d.reason, BoundaryReason::NoOpenSession);
        assert_eq!(t.open_session().unwrap().id, d.session_id);
    }

    #[test]
    fn continuation_updates_open_session() {
        let start = Utc::now();
        let mut t = tracker();
        let first = t.detect_boundary(&base(start));
        let next = base(start + Duration::minutes(10)).with_files(["src/a.rs", "src/c.rs"]);
        let d = t.detect_boundary(&next);

        assert!(!d.is_new_session);
        assert_eq!(d.reason, BoundaryReason::Continuation);
        assert_eq!(d.session_id, first.session_id);
        let open = t.open_session().unwrap();
        assert_eq!(open.last_activity_at, start + Duration::minutes(10));
        assert_eq!(open.active_files.len(), 3);
        assert_eq!(open.file_access_counts["src/a.rs"], 2);
    }

    #[test]
    fn idle_gap_closes_and_reopens() {
        let start = Utc::now();
        let mut t = tracker();
        let first = t.detect_boundary(&base(start));
        let d = t.detect_boundary(&base(start + Duration::minutes(45)));

        assert!(d.is_new_session);
        assert_eq!(d.reason, BoundaryReason::TimeGap);
        let closed = d.closed.unwrap();
        assert_eq!(closed.id, first.session_id);
        assert_eq!(closed.end_time, Some(start));
        assert_eq!(t.previous_session().unwrap().id, first.session_id);
        assert_ne!(t.open_session().unwrap().id, first.session_id);
    }

    #[test]
    fn missing_branch_never_splits() {
        let start = Utc::now();
        let mut t = tracker();
        let _ = t.detect_boundary(&ActivitySignals::at(start).with_files(["a.rs"]));
        let d = t.detect_boundary(
            &ActivitySignals::at(start + Duration::minutes(1))
                .with_branch("main")
                .with_files(["a.rs"]),
        );
        assert!(!d.is_new_session);
        // the branch is learnt on continuation
        assert_eq!(t.open_session().unwrap().branch.as_deref(), Some("main"));

        let d = t.detect_boundary(&ActivitySignals::at(start + Duration::minutes(2)));
        assert!(!d.is_new_session);
    }

    #[test]
    fn branch_switch_is_a_boundary() {
        let start = Utc::now();
        let mut t = tracker();
        let _ = t.detect_boundary(&base(start));
        let d = t.detect_boundary(&base(start + Duration::minutes(1)).with_branch("feat/x"));
        assert_eq!(d.reason, BoundaryReason::BranchChange);
        assert_eq!(t.open_session().unwrap().branch.as_deref(), Some("feat/x"));
    }

    #[test]
    fn pattern_shift_after_short_idle() {
        let start = Utc::now();
        let mut t = tracker();
        let _ = t.detect_boundary(&base(start));
        let shifted = base(start + Duration::minutes(15)).with_files(["docs/x.md", "docs/y.md"]);
        let d = t.detect_boundary(&shifted);
        assert_eq!(d.reason, BoundaryReason::PatternShift);
        assert_eq!(d.observation.file_similarity, Some(0.0));
    }

    #[test]
    fn new_session_on_same_branch_inherits_thread() {
        let start = Utc::now();
        let mut t = tracker();
        let _ = t.detect_boundary(&base(start));
        let thread = ThreadId::new();
        t.set_thread(thread.clone());
        let _ = t.detect_boundary(&base(start + Duration::hours(1)));

        let open = t.open_session().unwrap();
        assert_eq!(open.thread_id, Some(thread));
        // same files, 1h gap, same thread
        let expected = 0.5 + 0.3 * 0.75 + 0.2;
        assert!((open.continuity_score - expected).abs() < 1e-9);
    }

    #[test]
    fn close_open_caps_end_at_now() {
        let start = Utc::now();
        let mut t = tracker();
        let _ = t.detect_boundary(&base(start));
        let _ = t.detect_boundary(&base(start + Duration::minutes(20)));

        let closed = t.close_open(start + Duration::minutes(5)).unwrap();
        assert_eq!(closed.end_time, Some(start + Duration::minutes(5)));
        assert!(t.open_session().is_none());
        assert!(t.close_open(start).is_none());
    }

    #[test]
    fn resume_restores_open_and_previous() {
        let start = Utc::now();
        let mut closed = SessionRecord::open(start, Some("main".into()), None, &BTreeSet::new());
        closed.close();
        let open = SessionRecord::open(start, Some("main".into()), None, &BTreeSet::new());

        let mut t = tracker();
        t.resume(closed.clone());
        t.resume(open.clone());
        assert_eq!(t.previous_session().unwrap().id, closed.id);
        assert_eq!(t.open_session().unwrap().id, open.id);
    }

    #[test]
    fn subscribers_see_snapshots() {
        let start = Utc::now();
        let mut t = tracker();
        let rx = t.subscribe();
        assert!(rx.borrow().is_none());

        let d = t.detect_boundary(&base(start));
        let snapshot = rx.borrow().clone().unwrap();
        assert_eq!(snapshot.id, d.session_id);

        let _ = t.detect_boundary(&base(start + Duration::minutes(3)));
        assert_eq!(rx.borrow().as_ref().unwrap().last_activity_at, start + Duration::minutes(3));
        // the earlier snapshot is untouched
        assert_eq!(snapshot.last_activity_at, start);
    }

    #[tokio::test]
    async fn full_queue_holds_sessions_until_there_is_room() {
        let (queue, mut rx) = SummaryQueue::channel(1);
        let start = Utc::now();
        let mut t = tracker().with_summary_queue(queue);
        let first = t.detect_boundary(&base(start));
        let second = t.detect_boundary(&base(start + Duration::hours(1)));
        let third = t.detect_boundary(&base(start + Duration::hours(2)));
        assert!(third.is_new_session);
        assert_eq!(t.undelivered(), 1);

        assert_eq!(rx.recv().await.unwrap().session.id, first.session_id);
        let _ = t.detect_boundary(&base(start + Duration::hours(2) + Duration::minutes(5)));
        assert_eq!(t.undelivered(), 0);
        assert_eq!(rx.recv().await.unwrap().session.id, second.session_id);

        let closed = t.close_open(start + Duration::hours(3)).unwrap();
        assert_eq!(t.undelivered(), 0);
        assert_eq!(rx.recv().await.unwrap().session.id, closed.id);
        assert_eq!(closed.id, third.session_id);
    }

    #[tokio::test]
    async fn draining_waits_for_the_worker() {
        let (queue, mut rx) = SummaryQueue::channel(1);
        let start = Utc::now();
        let mut t = tracker().with_summary_queue(queue);
        for hours in 0..4 {
            let _ = t.detect_boundary(&base(start + Duration::hours(hours)));
        }
        assert_eq!(t.undelivered(), 2);

        let consumer = tokio::spawn(async move {
            let mut seen = 0;
            while rx.recv().await.is_some() {
                seen += 1;
                if seen == 3 {
                    break;
                }
            }
            seen
        });
        assert_eq!(t.drain_undelivered().await, 0);
        assert_eq!(consumer.await.unwrap(), 3);
    }

    #[tokio::test]
    async fn closed_sessions_are_enqueued() {
        let (queue, mut rx) = SummaryQueue::channel(4);
        let start = Utc::now();
        let mut t = tracker().with_summary_queue(queue);
        let first = t.detect_boundary(&base(start));
        let _ = t.detect_boundary(&base(start + Duration::hours(2)));

        let task = rx.recv().await.unwrap();
        assert_eq!(task.session.id, first.session_id);
        assert_eq!(task.attempt, 1);
    }
}
