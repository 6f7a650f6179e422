// transition.rs - Decide what a proposed status move means.
//
// A card dropped on a column (or a stage clicked in the list view) proposes
// `(opportunity, target_status)`. Most moves are plain status updates. Moving
// a bundle to WON is routed to the split confirmation workflow instead.

use serde::{Deserialize, Serialize};

use crate::opportunity::{Opportunity, OpportunityId, OpportunityStatus};

/// Outcome of evaluating a proposed move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    /// Target equals the current status; nothing to do.
    NoOp,

    /// Call `update_status(opportunity_id, status)` right away.
    DirectTransition {
        opportunity_id: OpportunityId,
        status: OpportunityStatus,
    },

    /// Open the split confirmation workflow for this bundle.
    RequiresSplitConfirmation { opportunity_id: OpportunityId },
}

impl Decision {
    /// True when the move changes nothing.
    pub fn is_noop(&self) -> bool {
        matches!(self, Decision::NoOp)
    }
}

/// Evaluate a proposed move. Pure: never touches the store.
pub fn propose_transition(opportunity: &Opportunity, target: OpportunityStatus) -> Decision {
    if opportunity.status == target {
        return Decision::NoOp;
    }
    if target == OpportunityStatus::Won && opportunity.is_bundle() {
        return Decision::RequiresSplitConfirmation {
            opportunity_id: opportunity.id.clone(),
        };
    }
    Decision::DirectTransition {
        opportunity_id: opportunity.id.clone(),
        status: target,
    }
}

/// Confirm-before-change prompt shown when a stage is clicked in the list view.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StatusPrompt {
    #[default]
    Idle,
    Pending {
        opportunity_id: OpportunityId,
        status: OpportunityStatus,
    },
}

impl StatusPrompt {
    /// Ask for confirmation. Replaces any earlier unanswered request.
    pub fn request(&mut self, opportunity_id: OpportunityId, status: OpportunityStatus) {
        *self = StatusPrompt::Pending {
            opportunity_id,
            status,
        };
    }

    /// Take the pending request, returning the prompt to `Idle`.
    pub fn confirm(&mut self) -> Option<(OpportunityId, OpportunityStatus)> {
        match std::mem::take(self) {
            StatusPrompt::Pending {
                opportunity_id,
                status,
            } => Some((opportunity_id, status)),
            StatusPrompt::Idle => None,
        }
    }

    pub fn cancel(&mut self) {
        *self = StatusPrompt::Idle;
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, StatusPrompt::Pending { .. })
    }
}
