//! Continuity between a session and the one before it.

use mnemo_core::{SessionRecord, jaccard};

const FILE_WEIGHT: f64 = 0.5;
const RECENCY_WEIGHT: f64 = 0.3;
const LINKAGE_WEIGHT: f64 = 0.2;

const SAME_THREAD: f64 = 1.0;
const SAME_BRANCH: f64 = 0.3;

/// Score with no prior session to compare against.
pub const NEUTRAL_CONTINUITY: f64 = 0.5;

/// Weighted blend of file overlap, recency and thread linkage with the
/// prior session, in `[0, 1]`.
///
/// Recency falls linearly from 1 to 0 as the gap between the prior
/// session's end and this session's start grows to `recency_window_secs`.
pub fn continuity_score(
    session: &SessionRecord,
    prior: Option<&SessionRecord>,
    recency_window_secs: u64,
) -> f64 {
    let Some(prior) = prior else {
        return NEUTRAL_CONTINUITY;
    };

    let files = jaccard(&session.active_files, &prior.active_files);
    let recency = recency(session, prior, recency_window_secs);
    let linkage = linkage(session, prior);

    (FILE_WEIGHT * files + RECENCY_WEIGHT * recency + LINKAGE_WEIGHT * linkage).clamp(0.0, 1.0)
}

#[allow(clippy::cast_precision_loss)]
fn recency(session: &SessionRecord, prior: &SessionRecord, window_secs: u64) -> f64 {
    if window_secs == 0 {
        return 0.0;
    }
    let gap = (session.start_time - prior.effective_end()).num_seconds().max(0);
    (1.0 - gap as f64 / window_secs as f64).max(0.0)
}

fn linkage(session: &SessionRecord, prior: &SessionRecord) -> f64 {
    match (&session.thread_id, &prior.thread_id) {
        (Some(a), Some(b)) if a == b => return SAME_THREAD,
        _ => {}
    }
    match (&session.branch, &prior.branch) {
        (Some(a), Some(b)) if a == b => SAME_BRANCH,
        _ => 0.0,
    }
}
