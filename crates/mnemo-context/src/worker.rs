//! Background summarization of closed sessions.
//!
//! Closed sessions travel through a bounded MPSC queue to a single worker
//! task, so the request path never waits on summarization. The request path
//! enqueues with [`SummaryQueue::try_enqueue`], which hands the session back
//! when the queue is full; the tracker holds it and tries again later.
//! Storing the same `(session, tier)` twice replaces the earlier summary, so
//! redelivery is safe.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use mnemo_core::{
    ContextThread, RecordSource, SessionLog, SessionRecord, SessionSummary, SummarySink,
    ThreadGraph,
};
use mnemo_settings::SummarySettings;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::summarizer::{ContextSummarizer, SessionBundle};

const RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// A closed session waiting to be summarized.
#[derive(Clone, Debug, PartialEq)]
pub struct SummaryTask {
    /// The closed session.
    pub session: SessionRecord,
    /// 1-based attempt number.
    pub attempt: u32,
}

/// Why [`SummaryQueue::try_enqueue`] handed a session back.
#[derive(Clone, Debug, PartialEq)]
pub enum Undelivered {
    /// The queue is at capacity; retry later.
    Full(SessionRecord),
    /// The worker has stopped; the session can no longer be delivered.
    Closed(SessionRecord),
}

impl Undelivered {
    /// The session that was not queued.
    pub fn into_session(self) -> SessionRecord {
        match self {
            Self::Full(session) | Self::Closed(session) => session,
        }
    }
}

/// Sending half of the summarization queue.
#[derive(Clone, Debug)]
pub struct SummaryQueue {
    tx: mpsc::Sender<SummaryTask>,
}

impl SummaryQueue {
    /// Bounded queue with its receiving half.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<SummaryTask>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Queue a closed session without blocking, handing it back when the
    /// queue cannot take it.
    pub fn try_enqueue(&self, session: SessionRecord) -> Result<(), Undelivered> {
        let session_id = session.id.clone();
        self.tx
            .try_send(SummaryTask { session, attempt: 1 })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(task) => Undelivered::Full(task.session),
                mpsc::error::TrySendError::Closed(task) => Undelivered::Closed(task.session),
            })?;
        debug!(session_id = %session_id, "session queued for summarization");
        Ok(())
    }

    /// Queue a closed session, waiting for capacity.
    ///
    /// Hands the session back when the worker has stopped.
    pub async fn enqueue(&self, session: SessionRecord) -> Result<(), SessionRecord> {
        let session_id = session.id.clone();
        self.tx
            .send(SummaryTask { session, attempt: 1 })
            .await
            .map_err(|e| e.0.session)?;
        debug!(session_id = %session_id, "session queued for summarization");
        Ok(())
    }
}

/// Collaborators of the summarization worker.
#[derive(Clone)]
pub struct SummarizerDeps {
    /// Loads the records of a closed session.
    pub records: Arc<dyn RecordSource>,
    /// Finds the context thread of a session. Optional.
    pub graph: Option<Arc<dyn ThreadGraph>>,
    /// Persists finished summaries.
    pub sink: Arc<dyn SummarySink>,
    /// Receives the session snapshot with its summary text attached. Optional.
    pub sessions: Option<Arc<dyn SessionLog>>,
}

/// Spawn the summarization worker.
///
/// The worker exits once every [`SummaryQueue`] clone is dropped and the
/// queue has drained.
pub fn spawn_summarizer(
    deps: SummarizerDeps,
    summarizer: ContextSummarizer,
    settings: &SummarySettings,
) -> (SummaryQueue, JoinHandle<()>) {
    let (queue, rx) = SummaryQueue::channel(settings.queue_capacity);
    let max_attempts = settings.max_attempts.max(1);
    let handle = tokio::spawn(summary_worker(rx, deps, summarizer, max_attempts));
    (queue, handle)
}

async fn summary_worker(
    mut rx: mpsc::Receiver<SummaryTask>,
    deps: SummarizerDeps,
    summarizer: ContextSummarizer,
    max_attempts: u32,
) {
    while let Some(mut task) = rx.recv().await {
        loop {
            match process(&deps, &summarizer, &task.session).await {
                Ok(summary) => {
                    debug!(
                        session_id = %task.session.id,
                        tier = summary.tier.as_str(),
                        tokens = summary.token_count,
                        attempt = task.attempt,
                        "summary stored"
                    );
                    break;
                }
                Err(e) if task.attempt < max_attempts => {
                    warn!(
                        session_id = %task.session.id,
                        attempt = task.attempt,
                        error = %e,
                        "summarization failed, retrying"
                    );
                    tokio::time::sleep(RETRY_BACKOFF * task.attempt).await;
                    task.attempt += 1;
                }
                Err(e) => {
                    error!(
                        session_id = %task.session.id,
                        attempts = task.attempt,
                        error = %e,
                        "summarization gave up"
                    );
                    break;
                }
            }
        }
    }
    debug!("summarization worker stopped");
}

async fn thread_for(deps: &SummarizerDeps, session: &SessionRecord) -> Option<ContextThread> {
    let graph = deps.graph.as_ref()?;
    match graph.thread_for_session(&session.id).await {
        Ok(thread) => thread,
        Err(e) => {
            warn!(session_id = %session.id, error = %e, "thread graph unavailable, grouping by branch");
            None
        }
    }
}

async fn process(
    deps: &SummarizerDeps,
    summarizer: &ContextSummarizer,
    session: &SessionRecord,
) -> mnemo_core::Result<SessionSummary> {
    let records = deps.records.records_for_session(&session.id).await?;
    let thread = thread_for(deps, session).await;
    let bundle = SessionBundle::new(session.clone(), records);
    let summary = summarizer.summarize(&bundle, thread.as_ref(), Utc::now());
    deps.sink.store_summary(&summary).await?;

    if let Some(log) = &deps.sessions {
        let mut snapshot = session.clone();
        snapshot.summaries.set(summary.tier, summary.text.clone());
        if let Err(e) = log.record_session(&snapshot).await {
            warn!(session_id = %session.id, error = %e, "session summary text not recorded");
        }
    }
    Ok(summary)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
