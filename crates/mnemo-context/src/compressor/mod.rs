//! Budgeted selection and rendering of ranked records.
//!
//! [`ContextCompressor::select`] walks candidates in rank order and admits
//! each one whose rendered line still fits the remaining token budget,
//! first verbatim, then with its reasoning clipped. A candidate that fits
//! in neither form is skipped and the walk continues.
//!
//! The rendered payload is a concatenation of newline-terminated pieces and
//! [`estimate_tokens`] is subadditive over such pieces, so the sum of the
//! admitted costs bounds the estimate of the final text. The payload can
//! therefore never exceed the budget.

mod plan;
mod render;

use mnemo_core::{RecordId, RecordKind, estimate_tokens};
use mnemo_settings::InjectionSettings;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use plan::{PlanItem, Placement, RenderForm, plan_first_fit};

use crate::scorer::ScoredRecord;
use crate::text::clip_words;
use render::{Group, render_groups, render_line};

/// How a selection ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SelectionOutcome {
    /// At least one item was admitted.
    Fitted,
    /// There was nothing to select from.
    NoCandidates,
    /// Candidates existed but none fit.
    BudgetTooSmall,
}

/// Provenance of one admitted record.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedItem {
    /// Record ID.
    pub record_id: RecordId,
    /// Record kind.
    pub kind: RecordKind,
    /// Relevance score.
    pub score: f64,
    /// Rendered form.
    pub form: RenderForm,
    /// Tokens charged for the item.
    pub tokens: usize,
}

/// Result of [`ContextCompressor::select`].
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    /// How the selection ended.
    pub outcome: SelectionOutcome,
    /// Admitted items in rank order.
    pub selected: Vec<SelectedItem>,
    /// Rendered payload; empty unless `outcome` is `FITTED`.
    pub rendered: String,
    /// Estimated tokens of `rendered`.
    pub token_estimate: usize,
    /// Budget the selection was made against.
    pub budget: usize,
}

impl Selection {
    fn empty(outcome: SelectionOutcome, budget: usize) -> Self {
        Self {
            outcome,
            selected: Vec::new(),
            rendered: String::new(),
            token_estimate: 0,
            budget,
        }
    }

    /// Whether nothing was admitted.
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }
}

/// First-fit-by-rank selector.
#[derive(Clone, Copy, Debug)]
pub struct ContextCompressor {
    min_viable_reasoning_chars: usize,
}

impl Default for ContextCompressor {
    fn default() -> Self {
        Self::from_settings(&InjectionSettings::default())
    }
}

impl ContextCompressor {
    /// Compressor clipping reasoning to `min_viable_reasoning_chars` in the
    /// truncated form.
    #[must_use]
    pub fn new(min_viable_reasoning_chars: usize) -> Self {
        Self {
            min_viable_reasoning_chars,
        }
    }

    /// Compressor configured from injection settings.
    #[must_use]
    pub fn from_settings(settings: &InjectionSettings) -> Self {
        Self::new(settings.min_viable_reasoning_chars)
    }

    /// Select from `ranked` (best first) within `budget` tokens.
    pub fn select(&self, ranked: &[ScoredRecord], budget: usize) -> Selection {
        if ranked.is_empty() {
            return Selection::empty(SelectionOutcome::NoCandidates, budget);
        }

        let mut verbatim_lines = Vec::with_capacity(ranked.len());
        let mut truncated_lines = Vec::with_capacity(ranked.len());
        let mut items = Vec::with_capacity(ranked.len());
        for candidate in ranked {
            let record = &candidate.record;
            let verbatim = render_line(record, record.reasoning.as_deref());
            let verbatim_cost = estimate_tokens(&verbatim);

            let truncated = record.reasoning.as_deref().and_then(|reasoning| {
                let clipped = clip_words(reasoning, self.min_viable_reasoning_chars);
                (clipped != reasoning).then(|| render_line(record, Some(&clipped)))
            });
            let truncated_cost = truncated
                .as_deref()
                .map(estimate_tokens)
                .filter(|cost| *cost < verbatim_cost);

            items.push(PlanItem {
                group: Group::of(record.kind).index(),
                verbatim: verbatim_cost,
                truncated: truncated_cost,
            });
            verbatim_lines.push(verbatim);
            truncated_lines.push(truncated);
        }

        let header_costs: Vec<usize> = Group::ALL
            .iter()
            .map(|g| estimate_tokens(g.header()))
            .collect();

        let placements = plan_first_fit(&items, &header_costs, budget);
        if placements.is_empty() {
            debug!(candidates = ranked.len(), budget, "no candidate fits the budget");
            return Selection::empty(SelectionOutcome::BudgetTooSmall, budget);
        }

        let mut lines = Vec::with_capacity(placements.len());
        let mut selected = Vec::with_capacity(placements.len());
        for placement in &placements {
            let candidate = &ranked[placement.index];
            let line = match placement.form {
                RenderForm::Verbatim => verbatim_lines[placement.index].clone(),
                RenderForm::Truncated => truncated_lines[placement.index]
                    .clone()
                    .unwrap_or_else(|| verbatim_lines[placement.index].clone()),
            };
            lines.push((Group::of(candidate.record.kind), line));
            selected.push(SelectedItem {
                record_id: candidate.record.id.clone(),
                kind: candidate.record.kind,
                score: candidate.score,
                form: placement.form,
                tokens: placement.cost,
            });
        }

        let rendered = render_groups(&lines);
        let token_estimate = estimate_tokens(&rendered);
        debug_assert!(token_estimate <= budget);
        debug!(
            selected = selected.len(),
            candidates = ranked.len(),
            tokens = token_estimate,
            budget,
            "context selected"
        );

        Selection {
            outcome: SelectionOutcome::Fitted,
            selected,
            rendered,
            token_estimate,
            budget,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
