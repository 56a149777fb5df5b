//! Tiered view over many sessions.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use mnemo_core::{ContextThread, MemoryRecord, SessionId, SessionSummary, SummaryTier};
use serde::Serialize;

use super::threads::{build_thread, group_by_thread};
use super::{ContextSummarizer, SessionBundle};

/// Summaries partitioned by tier, newest first within each tier.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextHierarchy {
    /// One verbatim summary per session.
    pub immediate: Vec<SessionSummary>,
    /// One paragraph per session.
    pub recent: Vec<SessionSummary>,
    /// One summary per thread.
    pub historical: Vec<SessionSummary>,
}

impl ContextHierarchy {
    /// Total number of summaries.
    pub fn len(&self) -> usize {
        self.immediate.len() + self.recent.len() + self.historical.len()
    }

    /// Whether there are no summaries at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every summary, immediate first.
    pub fn iter(&self) -> impl Iterator<Item = &SessionSummary> {
        self.immediate
            .iter()
            .chain(self.recent.iter())
            .chain(self.historical.iter())
    }
}

fn touches(bundle: &SessionBundle, files: &BTreeSet<String>) -> bool {
    !bundle.session.active_files.is_disjoint(files)
        || bundle.records.iter().any(|r| !r.files.is_disjoint(files))
}

impl ContextSummarizer {
    /// Summarize `bundles` into tiers.
    ///
    /// With a non-empty `current_files`, only sessions that share at least
    /// one file with it are kept. Historical sessions are merged per thread:
    /// sessions listed in `threads` join that thread, the rest are grouped
    /// by branch.
    pub fn build_hierarchy(
        &self,
        bundles: &[SessionBundle],
        threads: &BTreeMap<SessionId, ContextThread>,
        current_files: Option<&BTreeSet<String>>,
        now: DateTime<Utc>,
    ) -> ContextHierarchy {
        let relevant: Vec<&SessionBundle> = bundles
            .iter()
            .filter(|b| current_files.is_none_or(|files| files.is_empty() || touches(b, files)))
            .collect();

        let mut hierarchy = ContextHierarchy::default();
        let mut historical: Vec<SessionBundle> = Vec::new();
        for bundle in relevant {
            match self.tier_for(&bundle.session, now) {
                SummaryTier::Immediate => hierarchy.immediate.push(self.summarize(bundle, None, now)),
                SummaryTier::Recent => hierarchy.recent.push(self.summarize(bundle, None, now)),
                SummaryTier::Historical => historical.push(bundle.clone()),
            }
        }

        for group in group_by_thread(&historical, threads) {
            let mut thread = build_thread(&group.theme, &group.members, self.dormant_after(), now);
            thread.id = group.thread_id.clone();
            if let Some(known) = group.members.first().and_then(|b| threads.get(&b.session.id)) {
                thread.session_ids.clone_from(&known.session_ids);
            }
            let Some(newest) = group.members.iter().max_by_key(|b| b.session.start_time) else {
                continue;
            };
            let records: Vec<MemoryRecord> = group
                .members
                .iter()
                .flat_map(|b| b.records.iter().cloned())
                .collect();
            hierarchy
                .historical
                .push(self.summarize_thread(&thread, &newest.session.id, &records, now));
        }

        for tier in [
            &mut hierarchy.immediate,
            &mut hierarchy.recent,
            &mut hierarchy.historical,
        ] {
            tier.sort_by(|a, b| {
                newest_entry(b)
                    .cmp(&newest_entry(a))
                    .then_with(|| a.session_id.cmp(&b.session_id))
            });
        }
        hierarchy
    }
}

fn newest_entry(summary: &SessionSummary) -> Option<DateTime<Utc>> {
    summary.entries.iter().map(|e| e.timestamp).max()
}
