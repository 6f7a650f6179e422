// store.rs - The opportunity store: single source of truth for records.
//
// The pipeline only reads from the store and requests two mutations through
// it: `update_status` and `split_opportunity`. `InMemoryStore` is the
// reference implementation that honours the contract:
//
// - `update_status` is idempotent: repeating the current status records no
//   history entry and changes nothing.
// - `split_opportunity` replaces a bundle with a WON half (at the bundle's
//   position) and a LOST half (right after it).

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::opportunity::{Opportunity, OpportunityId, OpportunityStatus};
use crate::split::{self, SplitOutcome};
use crate::task::{OpportunityTask, TaskStatus};

/// Result of a status update request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusUpdate {
    /// The status was already the requested one.
    Unchanged,
    Changed {
        from: OpportunityStatus,
        to: OpportunityStatus,
    },
}

/// One entry in the store's status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub opportunity_id: OpportunityId,
    pub from: OpportunityStatus,
    pub to: OpportunityStatus,
    pub at: DateTime<Utc>,
}

/// Read access plus the two pipeline mutation entry points.
pub trait OpportunityStore {
    /// All opportunities in insertion order.
    fn opportunities(&self) -> &[Opportunity];

    fn get(&self, id: &OpportunityId) -> Option<&Opportunity> {
        self.opportunities().iter().find(|o| &o.id == id)
    }

    /// Move an opportunity to `status`. Idempotent.
    fn update_status(
        &mut self,
        id: &OpportunityId,
        status: OpportunityStatus,
    ) -> Result<StatusUpdate, PipelineError>;

    /// Split a bundle; `won_indices` must be a non-empty strict subset of its topic positions.
    fn split_opportunity(
        &mut self,
        id: &OpportunityId,
        won_indices: &BTreeSet<usize>,
    ) -> Result<SplitOutcome, PipelineError>;
}

/// Vec-backed store keeping insertion order and a status history.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    opportunities: Vec<Opportunity>,
    history: Vec<StatusChange>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from existing records. Later duplicates of an id are rejected.
    pub fn from_opportunities(
        opportunities: impl IntoIterator<Item = Opportunity>,
    ) -> Result<Self, PipelineError> {
        let mut store = Self::new();
        for opportunity in opportunities {
            store.insert(opportunity)?;
        }
        Ok(store)
    }

    /// Add a record at the end of the list.
    pub fn insert(&mut self, opportunity: Opportunity) -> Result<(), PipelineError> {
        if self.position(&opportunity.id).is_some() {
            return Err(PipelineError::DuplicateId(opportunity.id));
        }
        self.opportunities.push(opportunity);
        Ok(())
    }

    /// Status changes in the order they happened.
    pub fn history(&self) -> &[StatusChange] {
        &self.history
    }

    pub fn into_opportunities(self) -> Vec<Opportunity> {
        self.opportunities
    }

    /// Attach a task to an opportunity.
    pub fn add_task(
        &mut self,
        id: &OpportunityId,
        task: OpportunityTask,
    ) -> Result<&OpportunityTask, PipelineError> {
        let opportunity = self.get_mut(id)?;
        opportunity.tasks.push(task);
        opportunity.touch();
        let added = opportunity.tasks.len() - 1;
        Ok(&opportunity.tasks[added])
    }

    /// Set a task's status. Returns the previous status.
    pub fn update_task_status(
        &mut self,
        id: &OpportunityId,
        task_id: Uuid,
        status: TaskStatus,
    ) -> Result<TaskStatus, PipelineError> {
        let opportunity = self.get_mut(id)?;
        let task = opportunity
            .tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or_else(|| PipelineError::TaskNotFound {
                opportunity_id: id.clone(),
                task_id,
            })?;
        let previous = std::mem::replace(&mut task.status, status);
        if previous != status {
            opportunity.touch();
        }
        Ok(previous)
    }

    fn position(&self, id: &OpportunityId) -> Option<usize> {
        self.opportunities.iter().position(|o| &o.id == id)
    }

    fn get_mut(&mut self, id: &OpportunityId) -> Result<&mut Opportunity, PipelineError> {
        self.opportunities
            .iter_mut()
            .find(|o| &o.id == id)
            .ok_or_else(|| PipelineError::NotFound(id.clone()))
    }
}

impl OpportunityStore for InMemoryStore {
    fn opportunities(&self) -> &[Opportunity] {
        &self.opportunities
    }

    fn update_status(
        &mut self,
        id: &OpportunityId,
        status: OpportunityStatus,
    ) -> Result<StatusUpdate, PipelineError> {
        let opportunity = self.get_mut(id)?;
        let from = opportunity.status;
        if !opportunity.set_status(status) {
            return Ok(StatusUpdate::Unchanged);
        }
        let at = opportunity.updated_at;
        self.history.push(StatusChange {
            opportunity_id: id.clone(),
            from,
            to: status,
            at,
        });
        tracing::info!(opportunity_id = %id, from = %from, to = %status, "status updated");
        Ok(StatusUpdate::Changed { from, to: status })
    }

    fn split_opportunity(
        &mut self,
        id: &OpportunityId,
        won_indices: &BTreeSet<usize>,
    ) -> Result<SplitOutcome, PipelineError> {
        let index = self
            .position(id)
            .ok_or_else(|| PipelineError::NotFound(id.clone()))?;
        let outcome = split::split_opportunity(&self.opportunities[index], won_indices)?;
        for half in [&outcome.won.id, &outcome.lost.id] {
            if self.position(half).is_some() {
                return Err(PipelineError::DuplicateId(half.clone()));
            }
        }

        let from = self.opportunities[index].status;
        self.opportunities[index] = outcome.won.clone();
        self.opportunities.insert(index + 1, outcome.lost.clone());
        for half in [&outcome.won, &outcome.lost] {
            self.history.push(StatusChange {
                opportunity_id: half.id.clone(),
                from,
                to: half.status,
                at: half.updated_at,
            });
        }
        tracing::info!(
            opportunity_id = %id,
            won_id = %outcome.won.id,
            lost_id = %outcome.lost.id,
            "opportunity split"
        );
        Ok(outcome)
    }
}
