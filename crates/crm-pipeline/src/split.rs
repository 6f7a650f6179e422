// split.rs - Win-split confirmation workflow and the split contract.
//
// When a bundle is moved to WON the user picks which topics were actually
// sold. The workflow is a two-state machine:
//
//   Closed ──open──▶ Open(decision) ──toggle──▶ Open(decision)
//     ▲                   │
//     └──cancel/confirm───┘
//
// Every topic starts selected. Confirming with everything selected is a plain
// win; confirming a strict subset splits the bundle into a WON record and a
// LOST record. Confirming with nothing selected does nothing.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::opportunity::{Opportunity, OpportunityId, OpportunityStatus, TrainingDetail};

/// Ephemeral record held while a split confirmation is open.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitDecision {
    opportunity_id: OpportunityId,
    training_details: Vec<TrainingDetail>,
    selected: BTreeSet<usize>,
}

impl SplitDecision {
    /// Snapshot the opportunity's details with every topic selected.
    fn snapshot(opportunity: &Opportunity) -> Self {
        Self {
            opportunity_id: opportunity.id.clone(),
            training_details: opportunity.training_details.clone(),
            selected: (0..opportunity.topic_count()).collect(),
        }
    }

    pub fn opportunity_id(&self) -> &OpportunityId {
        &self.opportunity_id
    }

    /// Details as they were when the workflow opened.
    pub fn training_details(&self) -> &[TrainingDetail] {
        &self.training_details
    }

    pub fn selected(&self) -> &BTreeSet<usize> {
        &self.selected
    }

    pub fn is_selected(&self, index: usize) -> bool {
        self.selected.contains(&index)
    }

    /// Flip whether the topic at `index` counts as won.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not a valid topic position.
    pub fn toggle(&mut self, index: usize) {
        assert!(
            index < self.training_details.len(),
            "topic index {} out of range for {} topics",
            index,
            self.training_details.len()
        );
        if !self.selected.remove(&index) {
            self.selected.insert(index);
        }
    }

    /// Confirm is disabled until at least one topic is selected.
    pub fn can_confirm(&self) -> bool {
        !self.selected.is_empty()
    }

    fn all_selected(&self) -> bool {
        self.selected.len() == self.training_details.len()
    }

    /// Sum of prices of the selected topics.
    pub fn selected_total(&self) -> f64 {
        self.selected
            .iter()
            .filter_map(|&i| self.training_details.get(i))
            .map(|d| d.price)
            .sum()
    }
}

/// What the store must do once a split confirmation is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "resolution", rename_all = "snake_case")]
pub enum Resolution {
    /// Every topic was won: `update_status(opportunity_id, WON)`.
    MarkWon { opportunity_id: OpportunityId },

    /// Only some topics were won: `split_opportunity(opportunity_id, won_indices)`.
    Split {
        opportunity_id: OpportunityId,
        won_indices: BTreeSet<usize>,
    },
}

/// The split confirmation workflow.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SplitWorkflow {
    #[default]
    Closed,
    Open(SplitDecision),
}

impl SplitWorkflow {
    /// Open the workflow for `opportunity`, selecting every topic.
    ///
    /// Returns `WorkflowBusy` if a confirmation is already open.
    pub fn open(&mut self, opportunity: &Opportunity) -> Result<&mut SplitDecision, PipelineError> {
        if let SplitWorkflow::Open(current) = self {
            return Err(PipelineError::WorkflowBusy(current.opportunity_id.clone()));
        }
        *self = SplitWorkflow::Open(SplitDecision::snapshot(opportunity));
        tracing::debug!(opportunity_id = %opportunity.id, "split confirmation opened");
        match self {
            SplitWorkflow::Open(decision) => Ok(decision),
            SplitWorkflow::Closed => unreachable!("workflow was just opened"),
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, SplitWorkflow::Open(_))
    }

    pub fn decision(&self) -> Option<&SplitDecision> {
        match self {
            SplitWorkflow::Open(decision) => Some(decision),
            SplitWorkflow::Closed => None,
        }
    }

    pub fn decision_mut(&mut self) -> Option<&mut SplitDecision> {
        match self {
            SplitWorkflow::Open(decision) => Some(decision),
            SplitWorkflow::Closed => None,
        }
    }

    /// Discard the decision record. Never reaches the store.
    pub fn cancel(&mut self) {
        if let SplitWorkflow::Open(decision) = std::mem::take(self) {
            tracing::debug!(opportunity_id = %decision.opportunity_id, "split confirmation cancelled");
        }
    }

    /// Close the workflow and report what the store should do.
    ///
    /// Returns `None` without closing when nothing is selected (or when the
    /// workflow is already closed).
    pub fn confirm(&mut self) -> Option<Resolution> {
        match self {
            SplitWorkflow::Open(decision) if decision.can_confirm() => {}
            _ => return None,
        }
        let SplitWorkflow::Open(decision) = std::mem::take(self) else {
            return None;
        };
        let resolution = if decision.all_selected() {
            Resolution::MarkWon {
                opportunity_id: decision.opportunity_id,
            }
        } else {
            Resolution::Split {
                opportunity_id: decision.opportunity_id,
                won_indices: decision.selected,
            }
        };
        tracing::debug!(?resolution, "split confirmation resolved");
        Some(resolution)
    }
}

/// The two records a split produces.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitOutcome {
    pub won: Opportunity,
    pub lost: Opportunity,
}

/// Split `original` into a WON record holding the topics at `won_indices` and
/// a LOST record holding the rest.
///
/// `won_indices` must be a non-empty strict subset of the topic positions.
/// Prices, customer and commercial terms carry over to both halves; each
/// half's amount becomes the sum of its topic prices. Follow-up tasks stay
/// with the WON half only. The halves get ids `<id>-W` and `<id>-L` and
/// point back at the original via `split_from`.
pub fn split_opportunity(
    original: &Opportunity,
    won_indices: &BTreeSet<usize>,
) -> Result<SplitOutcome, PipelineError> {
    let n = original.topic_count();
    let invalid = |reason: String| PipelineError::InvalidSplit {
        opportunity_id: original.id.clone(),
        reason,
    };
    if won_indices.is_empty() {
        return Err(invalid("no topics selected as won".to_string()));
    }
    if let Some(&out_of_range) = won_indices.iter().find(|&&i| i >= n) {
        return Err(invalid(format!(
            "topic index {out_of_range} out of range for {n} topics"
        )));
    }
    if won_indices.len() == n {
        return Err(invalid(
            "every topic selected; mark the opportunity won instead".to_string(),
        ));
    }

    let (won_details, lost_details): (Vec<_>, Vec<_>) = original
        .training_details
        .iter()
        .cloned()
        .enumerate()
        .partition(|(i, _)| won_indices.contains(i));

    let half = |suffix: &str, status: OpportunityStatus, details: Vec<(usize, TrainingDetail)>| {
        let mut record = original.clone();
        record.id = original.id.split_child(suffix);
        record.status = status;
        record.training_details = details.into_iter().map(|(_, d)| d).collect();
        record.amount = Some(record.details_total());
        record.split_from = Some(original.id.clone());
        if status != OpportunityStatus::Won {
            record.tasks = Vec::new();
        }
        record.touch();
        record
    };

    Ok(SplitOutcome {
        won: half("W", OpportunityStatus::Won, won_details),
        lost: half("L", OpportunityStatus::Lost, lost_details),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opportunity::NewOpportunity;
    use crate::task::OpportunityTask;

    fn abc() -> Opportunity {
        Opportunity::new(NewOpportunity {
            customer_id: "CUS-42".to_string(),
            customer_name: "Bosphorus Tekstil".to_string(),
            training_details: vec![
                TrainingDetail::new("A", 1000.0),
                TrainingDetail::new("B", 2000.0),
                TrainingDetail::new("C", 3000.0),
            ],
            amount: Some(6000.0),
            ..Default::default()
        })
    }

    fn indices(items: &[usize]) -> BTreeSet<usize> {
        items.iter().copied().collect()
    }

    #[test]
    fn open_selects_every_topic() {
        let opp = abc();
        let mut workflow = SplitWorkflow::default();
        let decision = workflow.open(&opp).unwrap();
        assert_eq!(decision.selected(), &indices(&[0, 1, 2]));
        assert_eq!(decision.training_details(), opp.training_details.as_slice());
        assert!(workflow.is_open());
    }

    #[test]
    fn second_open_is_refused() {
        let first = abc();
        let second = abc();
        let mut workflow = SplitWorkflow::default();
        workflow.open(&first).unwrap();
        let err = workflow.open(&second).unwrap_err();
        assert!(matches!(err, PipelineError::WorkflowBusy(id) if id == first.id));
        assert_eq!(workflow.decision().unwrap().opportunity_id(), &first.id);
    }

    #[test]
    fn snapshot_is_independent_of_later_edits() {
        let mut opp = abc();
        let mut workflow = SplitWorkflow::default();
        workflow.open(&opp).unwrap();
        opp.training_details.push(TrainingDetail::new("D", 10.0));
        assert_eq!(workflow.decision().unwrap().training_details().len(), 3);
    }

    #[test]
    fn toggle_flips_membership() {
        let mut workflow = SplitWorkflow::default();
        workflow.open(&abc()).unwrap();
        let decision = workflow.decision_mut().unwrap();
        decision.toggle(1);
        assert!(!decision.is_selected(1));
        assert_eq!(decision.selected_total(), 4000.0);
        decision.toggle(1);
        assert!(decision.is_selected(1));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn toggle_out_of_range_panics() {
        let mut workflow = SplitWorkflow::default();
        workflow.open(&abc()).unwrap().toggle(3);
    }

    #[test]
    fn confirm_all_selected_marks_won() {
        let opp = abc();
        let mut workflow = SplitWorkflow::default();
        workflow.open(&opp).unwrap();
        assert_eq!(
            workflow.confirm(),
            Some(Resolution::MarkWon {
                opportunity_id: opp.id.clone()
            })
        );
        assert!(!workflow.is_open());
    }

    #[test]
    fn confirm_subset_splits() {
        let opp = abc();
        let mut workflow = SplitWorkflow::default();
        workflow.open(&opp).unwrap().toggle(1);
        assert_eq!(
            workflow.confirm(),
            Some(Resolution::Split {
                opportunity_id: opp.id.clone(),
                won_indices: indices(&[0, 2]),
            })
        );
        assert_eq!(workflow, SplitWorkflow::Closed);
    }

    #[test]
    fn confirm_with_nothing_selected_is_inert() {
        let mut workflow = SplitWorkflow::default();
        let decision = workflow.open(&abc()).unwrap();
        decision.toggle(0);
        decision.toggle(1);
        decision.toggle(2);
        assert!(!decision.can_confirm());

        assert_eq!(workflow.confirm(), None);
        assert!(workflow.is_open());
    }

    #[test]
    fn confirm_while_closed_is_none() {
        let mut workflow = SplitWorkflow::default();
        assert_eq!(workflow.confirm(), None);
    }

    #[test]
    fn cancel_closes() {
        let mut workflow = SplitWorkflow::default();
        workflow.open(&abc()).unwrap().toggle(2);
        workflow.cancel();
        assert_eq!(workflow, SplitWorkflow::Closed);
        assert!(workflow.decision().is_none());
    }

    #[test]
    fn split_partitions_topics_and_keeps_prices() {
        let opp = abc();
        let outcome = split_opportunity(&opp, &indices(&[0, 2])).unwrap();

        assert_eq!(outcome.won.status, OpportunityStatus::Won);
        assert_eq!(outcome.won.training_topics(), vec!["A", "C"]);
        assert_eq!(
            outcome.won.training_details,
            vec![TrainingDetail::new("A", 1000.0), TrainingDetail::new("C", 3000.0)]
        );
        assert_eq!(outcome.won.amount, Some(4000.0));

        assert_eq!(outcome.lost.status, OpportunityStatus::Lost);
        assert_eq!(outcome.lost.training_details, vec![TrainingDetail::new("B", 2000.0)]);
        assert_eq!(outcome.lost.amount, Some(2000.0));

        for half in [&outcome.won, &outcome.lost] {
            assert_eq!(half.customer_id, "CUS-42");
            assert_eq!(half.customer_name, "Bosphorus Tekstil");
            assert_eq!(half.split_from.as_ref(), Some(&opp.id));
            assert_eq!(half.created_at, opp.created_at);
        }
        assert_ne!(outcome.won.id, outcome.lost.id);
        assert_ne!(outcome.won.id, opp.id);
    }

    #[test]
    fn split_keeps_tasks_on_won_half_only() {
        let mut opp = abc();
        let due = chrono::NaiveDate::from_ymd_opt(2026, 11, 3).unwrap();
        opp.tasks.push(OpportunityTask::new("Send signed contract", due).unwrap());
        opp.tasks.push(OpportunityTask::new("Book the trainer", due).unwrap());

        let outcome = split_opportunity(&opp, &indices(&[1])).unwrap();

        assert_eq!(outcome.won.tasks, opp.tasks);
        assert!(outcome.lost.tasks.is_empty());
        assert!(!outcome
            .lost
            .tasks
            .iter()
            .any(|t| outcome.won.tasks.iter().any(|w| w.id == t.id)));
    }

    #[test]
    fn split_rejects_empty_full_and_out_of_range() {
        let opp = abc();
        for bad in [indices(&[]), indices(&[0, 1, 2]), indices(&[1, 5])] {
            assert!(matches!(
                split_opportunity(&opp, &bad),
                Err(PipelineError::InvalidSplit { .. })
            ));
        }
    }
}
