//! # crm-pipeline
//!
//! Sales pipeline core for a training company: opportunities move through
//! proposal stages to WON or LOST, shown as a kanban board.
//!
//! Moving a multi-topic opportunity (a bundle) to WON does not happen
//! immediately. The user first confirms which topics were actually sold; a
//! partial win splits the bundle into a WON record and a LOST record.
//!
//! ## Key components
//!
//! - [`propose_transition`] - pure decision: no-op, direct update, or split confirmation
//! - [`SplitWorkflow`] - the `Closed | Open(decision)` confirmation dialog state
//! - [`split_opportunity`] - the split contract every store honours
//! - [`Board`] / [`project`] - status → ordered cards, every column present
//! - [`OpportunityStore`] - the store seam; [`InMemoryStore`] is the reference store
//! - [`Pipeline`] - wires intents, workflow, store and [`EventDispatcher`] together

pub mod board;
pub mod error;
pub mod events;
pub mod handoff;
pub mod opportunity;
pub mod pipeline;
pub mod split;
pub mod store;
pub mod task;
pub mod transition;

pub use board::{project, Board, BoardColumn, BOARD_COLUMNS};
pub use error::PipelineError;
pub use events::{
    BufferSink, EventDispatcher, LogSink, NotificationSink, PipelineEvent, TracingSink,
};
pub use handoff::{date_requests, owned_by, won_opportunities, OwnerPortfolio};
pub use opportunity::{
    Currency, NewOpportunity, Opportunity, OpportunityId, OpportunityStatus, PriceUnit,
    TrainingDetail, ALL_STATUSES, PIPELINE_STAGES,
};
pub use pipeline::{ConfirmOutcome, MoveOutcome, Pipeline};
pub use split::{split_opportunity, Resolution, SplitDecision, SplitOutcome, SplitWorkflow};
pub use store::{InMemoryStore, OpportunityStore, StatusChange, StatusUpdate};
pub use task::{OpportunityTask, TaskFilter, TaskStatus};
pub use transition::{propose_transition, Decision, StatusPrompt};
