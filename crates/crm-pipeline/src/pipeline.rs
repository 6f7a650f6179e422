// pipeline.rs - Pipeline: wires user intents to the store.
//
// The rendering surface sends four kinds of intent: propose a move, toggle a
// topic in the split dialog, confirm, cancel. `Pipeline` evaluates each one
// with the pure decision logic, drives the split workflow, calls the store,
// and dispatches an event for every mutation that actually happened.
//
// Only one split confirmation can be open at a time; further moves are
// refused with `WorkflowBusy` until it is confirmed or cancelled.

use chrono::NaiveDate;

use crate::board::Board;
use crate::error::PipelineError;
use crate::events::{EventDispatcher, PipelineEvent};
use crate::opportunity::{NewOpportunity, Opportunity, OpportunityId, OpportunityStatus};
use crate::split::{Resolution, SplitDecision, SplitOutcome, SplitWorkflow};
use crate::store::{InMemoryStore, OpportunityStore, StatusUpdate};
use crate::task::{OpportunityTask, TaskStatus};
use crate::transition::{propose_transition, Decision, StatusPrompt};

/// Result of a move request.
#[derive(Debug, Clone, PartialEq)]
pub enum MoveOutcome {
    /// The card was dropped on its own column.
    NoOp,
    /// The store was asked to update the status.
    Updated(StatusUpdate),
    /// A split confirmation is now open for the bundle.
    AwaitingSplitConfirmation,
}

/// Result of confirming the split dialog.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmOutcome {
    /// Nothing selected (or nothing open); the dialog stays as it was.
    Inert,
    /// Every topic was won; the whole opportunity moved to WON.
    MarkedWon(StatusUpdate),
    /// The bundle was split into a won and a lost record.
    Split(SplitOutcome),
}

/// The opportunity pipeline over a store.
pub struct Pipeline<S> {
    store: S,
    workflow: SplitWorkflow,
    prompt: StatusPrompt,
    dispatcher: EventDispatcher,
}

impl<S: OpportunityStore> Pipeline<S> {
    pub fn new(store: S) -> Self {
        Self::with_dispatcher(store, EventDispatcher::new())
    }

    pub fn with_dispatcher(store: S, dispatcher: EventDispatcher) -> Self {
        Self {
            store,
            workflow: SplitWorkflow::Closed,
            prompt: StatusPrompt::Idle,
            dispatcher,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Current board layout. Recomputed on every call.
    pub fn board(&self) -> Board<'_> {
        Board::standard(self.store.opportunities())
    }

    pub fn workflow(&self) -> &SplitWorkflow {
        &self.workflow
    }

    pub fn split_decision_mut(&mut self) -> Option<&mut SplitDecision> {
        self.workflow.decision_mut()
    }

    /// Propose moving `id` to `target` (drag-and-drop or stage click).
    pub fn request_move(
        &mut self,
        id: &OpportunityId,
        target: OpportunityStatus,
    ) -> Result<MoveOutcome, PipelineError> {
        if let Some(open) = self.workflow.decision() {
            return Err(PipelineError::WorkflowBusy(open.opportunity_id().clone()));
        }
        let opportunity = self
            .store
            .get(id)
            .ok_or_else(|| PipelineError::NotFound(id.clone()))?;

        let decision = propose_transition(opportunity, target);
        tracing::debug!(opportunity_id = %id, target = %target, ?decision, "move proposed");

        match decision {
            Decision::NoOp => Ok(MoveOutcome::NoOp),
            Decision::DirectTransition {
                opportunity_id,
                status,
            } => {
                let update = self.update_status(&opportunity_id, status)?;
                Ok(MoveOutcome::Updated(update))
            }
            Decision::RequiresSplitConfirmation { .. } => {
                self.workflow.open(opportunity)?;
                Ok(MoveOutcome::AwaitingSplitConfirmation)
            }
        }
    }

    /// Flip a topic in the open split dialog. Returns the topic's new
    /// selection state, or `None` when no dialog is open.
    pub fn toggle_topic(&mut self, index: usize) -> Option<bool> {
        let decision = self.workflow.decision_mut()?;
        decision.toggle(index);
        Some(decision.is_selected(index))
    }

    /// Accept the split dialog.
    ///
    /// The dialog is closed before the store is called; a store error is
    /// returned to the caller but does not reopen it.
    pub fn confirm_split(&mut self) -> Result<ConfirmOutcome, PipelineError> {
        let Some(resolution) = self.workflow.confirm() else {
            return Ok(ConfirmOutcome::Inert);
        };
        match resolution {
            Resolution::MarkWon { opportunity_id } => {
                let update = self.update_status(&opportunity_id, OpportunityStatus::Won)?;
                Ok(ConfirmOutcome::MarkedWon(update))
            }
            Resolution::Split {
                opportunity_id,
                won_indices,
            } => {
                let outcome = self.store.split_opportunity(&opportunity_id, &won_indices)?;
                self.dispatcher.dispatch(&PipelineEvent::opportunity_split(
                    &opportunity_id,
                    &outcome.won.id,
                    &outcome.lost.id,
                    &won_indices,
                ));
                Ok(ConfirmOutcome::Split(outcome))
            }
        }
    }

    /// Dismiss the split dialog without touching the store.
    pub fn cancel_split(&mut self) {
        self.workflow.cancel();
    }

    pub fn prompt(&self) -> &StatusPrompt {
        &self.prompt
    }

    /// Ask for confirmation before changing status from the list view.
    pub fn request_status_change(&mut self, id: OpportunityId, status: OpportunityStatus) {
        self.prompt.request(id, status);
    }

    /// Apply the pending status change through the same rules as a board move.
    pub fn confirm_status_change(&mut self) -> Result<MoveOutcome, PipelineError> {
        match self.prompt.confirm() {
            Some((id, status)) => self.request_move(&id, status),
            None => Ok(MoveOutcome::NoOp),
        }
    }

    pub fn cancel_status_change(&mut self) {
        self.prompt.cancel();
    }

    fn update_status(
        &mut self,
        id: &OpportunityId,
        status: OpportunityStatus,
    ) -> Result<StatusUpdate, PipelineError> {
        let update = self.store.update_status(id, status)?;
        if let StatusUpdate::Changed { from, to } = update {
            self.dispatcher
                .dispatch(&PipelineEvent::status_changed(id, from, to));
        }
        Ok(update)
    }
}

impl Pipeline<InMemoryStore> {
    /// Create an opportunity at `ProposalSent` and add it to the board.
    pub fn create_opportunity(
        &mut self,
        input: NewOpportunity,
    ) -> Result<&Opportunity, PipelineError> {
        let opportunity = Opportunity::new(input);
        let id = opportunity.id.clone();
        let event = PipelineEvent::opportunity_created(&opportunity);
        self.store.insert(opportunity)?;
        self.dispatcher.dispatch(&event);
        tracing::info!(opportunity_id = %id, "opportunity created");
        self.store
            .get(&id)
            .ok_or(PipelineError::NotFound(id))
    }

    /// Add a follow-up task to an opportunity.
    pub fn add_task(
        &mut self,
        id: &OpportunityId,
        text: &str,
        due_date: NaiveDate,
    ) -> Result<&OpportunityTask, PipelineError> {
        let task = OpportunityTask::new(text, due_date)?;
        let event = PipelineEvent::task_added(id, task.id, &task.text);
        let added = self.store.add_task(id, task)?;
        self.dispatcher.dispatch(&event);
        Ok(added)
    }

    /// Advance a task one step (Todo → InProgress → Done → Todo).
    pub fn cycle_task(
        &mut self,
        id: &OpportunityId,
        task_id: uuid::Uuid,
    ) -> Result<TaskStatus, PipelineError> {
        let current = self
            .store
            .get(id)
            .ok_or_else(|| PipelineError::NotFound(id.clone()))?
            .tasks
            .iter()
            .find(|t| t.id == task_id)
            .map(|t| t.status)
            .ok_or_else(|| PipelineError::TaskNotFound {
                opportunity_id: id.clone(),
                task_id,
            })?;
        let next = current.cycle();
        self.store.update_task_status(id, task_id, next)?;
        self.dispatcher
            .dispatch(&PipelineEvent::task_status_changed(id, task_id, next));
        Ok(next)
    }
}
