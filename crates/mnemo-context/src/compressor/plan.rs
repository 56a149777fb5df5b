//! First-fit-by-rank admission.

use serde::{Deserialize, Serialize};

/// How an admitted item is rendered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderForm {
    /// As captured.
    Verbatim,
    /// Reasoning clipped; content untouched.
    Truncated,
}

/// Costs of one candidate, in rank order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlanItem {
    /// Output group index.
    pub group: usize,
    /// Token cost of the verbatim line.
    pub verbatim: usize,
    /// Token cost of the truncated line, when one exists and is cheaper.
    pub truncated: Option<usize>,
}

/// An admitted item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    /// Index into the planned items.
    pub index: usize,
    /// Chosen form.
    pub form: RenderForm,
    /// Tokens charged, including the group header when this item opened
    /// its group.
    pub cost: usize,
}

/// Walk `items` in order and admit each one that still fits.
///
/// An item is tried verbatim first, then truncated. Items that fit in
/// neither form are skipped and the walk continues. The first item admitted
/// into a group also pays `header_costs[group]`. The sum of placement costs
/// never exceeds `budget`.
pub fn plan_first_fit(items: &[PlanItem], header_costs: &[usize], budget: usize) -> Vec<Placement> {
    let mut remaining = budget;
    let mut opened = vec![false; header_costs.len()];
    let mut placements = Vec::new();

    for (index, item) in items.iter().enumerate() {
        let header = if opened.get(item.group).copied().unwrap_or(true) {
            0
        } else {
            header_costs.get(item.group).copied().unwrap_or(0)
        };

        let verbatim = header + item.verbatim;
        let choice = if verbatim <= remaining {
            Some((RenderForm::Verbatim, verbatim))
        } else {
            item.truncated
                .filter(|t| *t < item.verbatim)
                .map(|t| header + t)
                .filter(|cost| *cost <= remaining)
                .map(|cost| (RenderForm::Truncated, cost))
        };

        if let Some((form, cost)) = choice {
            remaining -= cost;
            if let Some(flag) = opened.get_mut(item.group) {
                *flag = true;
            }
            placements.push(Placement { index, form, cost });
        }
    }
    placements
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn item(group: usize, verbatim: usize, truncated: Option<usize>) -> PlanItem {
        PlanItem {
            group,
            verbatim,
            truncated,
        }
    }

    #[test]
    fn admits_decision_and_skips_todo_that_no_longer_fits() {
        // decision 0.9 / 40 tokens, todo 0.5 / 30 tokens, budget 50
        let items = [item(0, 40, None), item(3, 30, None)];
        let placed = plan_first_fit(&items, &[0; 4], 50);
        assert_eq!(placed.len(), 1);
        assert_eq!(placed[0].index, 0);
        assert_eq!(placed[0].form, RenderForm::Verbatim);
    }

    #[test]
    fn skipped_item_does_not_stop_the_walk() {
        let items = [item(0, 40, None), item(1, 30, None), item(2, 8, None)];
        let placed = plan_first_fit(&items, &[0; 4], 50);
        let admitted: Vec<_> = placed.iter().map(|p| p.index).collect();
        assert_eq!(admitted, vec![0, 2]);
    }

    #[test]
    fn falls_back_to_truncated_form() {
        let items = [item(0, 30, None), item(0, 25, Some(15))];
        let placed = plan_first_fit(&items, &[0; 4], 45);
        assert_eq!(placed[1].form, RenderForm::Truncated);
        assert_eq!(placed[1].cost, 15);
    }

    #[test]
    fn truncated_form_must_be_cheaper() {
        let items = [item(0, 25, Some(25))];
        assert!(plan_first_fit(&items, &[0; 4], 20).is_empty());
    }

    #[test]
    fn header_charged_once_per_group() {
        let items = [item(0, 5, None), item(0, 5, None), item(1, 5, None)];
        let placed = plan_first_fit(&items, &[3, 3, 3, 3], 100);
        let costs: Vec<_> = placed.iter().map(|p| p.cost).collect();
        assert_eq!(costs, vec![8, 5, 8]);
    }

    #[test]
    fn header_can_push_item_out() {
        let items = [item(0, 10, None)];
        assert!(plan_first_fit(&items, &[3, 0, 0, 0], 12).is_empty());
    }

    proptest! {
        #[test]
        fn placements_never_exceed_budget(
            costs in proptest::collection::vec((0usize..4, 1usize..60, proptest::option::of(1usize..60)), 0..20),
            budget in 0usize..200,
        ) {
            let items: Vec<_> = costs.iter().map(|(g, v, t)| item(*g, *v, *t)).collect();
            let placed = plan_first_fit(&items, &[3, 3, 4, 2], budget);
            let total: usize = placed.iter().map(|p| p.cost).sum();
            prop_assert!(total <= budget);
        }
    }
}
