//! Staged compression of summary entries.
//!
//! Cleanup stages always run:
//! 1. merge near-duplicates of the same kind, newest content wins;
//! 2. collapse todos with the same normalized text to their latest status;
//! 3. resolve conflicts: an entry overridden by a later one of the same kind
//!    family (todos excepted), topic key and subject is dropped and the
//!    pair is recorded.
//!
//! Reduction stages stop as soon as the size is within the target:
//! 4. clip reasoning, non-decisions first;
//! 5. drop reasoning, non-decisions first;
//! 6. drop whole bug fixes, then rejections, oldest first.
//!
//! Decisions and todos are never dropped and decision content is never
//! touched.

use std::collections::{BTreeMap, BTreeSet};

use mnemo_core::{
    KindFamily, RecordKind, SummaryEntry, Supersession, TopicKey, jaccard, text_similarity, word_set,
};

use super::render::measure;
use crate::text::clip_words;

/// Thresholds for the pipeline.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PipelineConfig {
    pub duplicate_threshold: f64,
    pub conflict_threshold: f64,
    pub min_reasoning_chars: usize,
}

/// Output of [`compress_entries`].
#[derive(Debug, Default)]
pub(crate) struct Compressed {
    pub entries: Vec<SummaryEntry>,
    pub conflicts: Vec<Supersession>,
}

/// Run every stage on `entries` towards `target` tokens.
pub(crate) fn compress_entries(
    mut entries: Vec<SummaryEntry>,
    target: usize,
    config: PipelineConfig,
) -> Compressed {
    entries.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.source_id.cmp(&b.source_id))
    });
    let entries = merge_duplicates(entries, config.duplicate_threshold);
    let entries = consolidate_todos(entries);
    let (mut entries, conflicts) = resolve_conflicts(entries, config.conflict_threshold);
    reduce(&mut entries, target, config.min_reasoning_chars);
    Compressed { entries, conflicts }
}

fn absorb(older: &mut SummaryEntry, newer: SummaryEntry) {
    let merged = older.merge_count + newer.merge_count;
    let mut files = std::mem::take(&mut older.files);
    let mut tags = std::mem::take(&mut older.tags);
    let reasoning = newer.reasoning.clone().or_else(|| older.reasoning.take());
    files.extend(newer.files.iter().cloned());
    tags.extend(newer.tags.iter().cloned());
    *older = SummaryEntry {
        files,
        tags,
        reasoning,
        merge_count: merged,
        ..newer
    };
}

/// Stage 1.
pub(crate) fn merge_duplicates(entries: Vec<SummaryEntry>, threshold: f64) -> Vec<SummaryEntry> {
    let mut kept: Vec<SummaryEntry> = Vec::with_capacity(entries.len());
    for entry in entries {
        let twin = kept.iter().position(|k| {
            k.kind == entry.kind && text_similarity(&k.content, &entry.content) >= threshold
        });
        match twin {
            Some(i) => absorb(&mut kept[i], entry),
            None => kept.push(entry),
        }
    }
    kept
}

fn normalized(content: &str) -> String {
    word_set(content).into_iter().collect::<Vec<_>>().join(" ")
}

/// Stage 2.
pub(crate) fn consolidate_todos(entries: Vec<SummaryEntry>) -> Vec<SummaryEntry> {
    let mut kept: Vec<SummaryEntry> = Vec::with_capacity(entries.len());
    let mut by_text: BTreeMap<String, usize> = BTreeMap::new();
    for entry in entries {
        if entry.kind != RecordKind::Todo {
            kept.push(entry);
            continue;
        }
        let key = normalized(&entry.content);
        match by_text.get(&key) {
            Some(&i) => absorb(&mut kept[i], entry),
            None => {
                let _ = by_text.insert(key, kept.len());
                kept.push(entry);
            }
        }
    }
    kept
}

const FILLER_WORDS: &[&str] = &[
    "and", "are", "but", "for", "from", "into", "its", "not", "now", "our", "than", "that", "the",
    "then", "this", "use", "using", "was", "were", "with",
];

/// Words that carry the subject of a statement.
fn content_words(text: &str) -> BTreeSet<String> {
    word_set(text)
        .into_iter()
        .filter(|w| w.chars().count() >= 3 && !FILLER_WORDS.contains(&w.as_str()))
        .collect()
}

/// Whether `later` overrides `earlier`: same family and topic, and about the
/// same thing. A stance flip (decision against rejection) needs one shared
/// content word; the same kind needs content similarity of `threshold`.
fn overrides(earlier: &SummaryEntry, later: &SummaryEntry, threshold: f64) -> bool {
    let family = earlier.kind.family();
    if family == KindFamily::Work || family != later.kind.family() {
        return false;
    }
    let (Some(a), Some(b)) = (
        TopicKey::new(&earlier.files, &earlier.tags),
        TopicKey::new(&later.files, &later.tags),
    ) else {
        return false;
    };
    if a != b {
        return false;
    }
    let (ours, theirs) = (content_words(&earlier.content), content_words(&later.content));
    if earlier.kind == later.kind {
        jaccard(&ours, &theirs) >= threshold
    } else {
        !ours.is_disjoint(&theirs)
    }
}

/// Stage 3. Entries must be in chronological order.
///
/// Each entry is superseded by the newest later entry that overrides it.
pub(crate) fn resolve_conflicts(
    entries: Vec<SummaryEntry>,
    threshold: f64,
) -> (Vec<SummaryEntry>, Vec<Supersession>) {
    let mut conflicts = Vec::new();
    let mut kept = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let winner = entries[i + 1..]
            .iter()
            .rev()
            .find(|later| overrides(entry, later, threshold));
        match winner {
            Some(w) => conflicts.push(Supersession {
                superseded: entry.source_id.clone(),
                superseding: w.source_id.clone(),
            }),
            None => kept.push(entry.clone()),
        }
    }
    (kept, conflicts)
}

/// Stages 4 to 6.
pub(crate) fn reduce(entries: &mut Vec<SummaryEntry>, target: usize, min_reasoning_chars: usize) {
    let within = |entries: &Vec<SummaryEntry>| measure(entries) <= target;
    if within(entries) {
        return;
    }

    for decisions in [false, true] {
        for entry in entries.iter_mut().filter(|e| (e.kind == RecordKind::Decision) == decisions) {
            if let Some(reasoning) = entry.reasoning.as_mut() {
                *reasoning = clip_words(reasoning, min_reasoning_chars);
            }
        }
        if within(entries) {
            return;
        }
    }

    for decisions in [false, true] {
        for entry in entries.iter_mut().filter(|e| (e.kind == RecordKind::Decision) == decisions) {
            entry.reasoning = None;
        }
        if within(entries) {
            return;
        }
    }

    for kind in [RecordKind::BugFix, RecordKind::Rejection] {
        while let Some(oldest) = oldest_of(entries, kind) {
            let _ = entries.remove(oldest);
            if within(entries) {
                return;
            }
        }
    }
}

fn oldest_of(entries: &[SummaryEntry], kind: RecordKind) -> Option<usize> {
    entries
        .iter()
        .enumerate()
        .filter(|(_, e)| e.kind == kind)
        .min_by(|(_, a), (_, b)| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.source_id.cmp(&b.source_id))
        })
        .map(|(i, _)| i)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
