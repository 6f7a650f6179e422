// error.rs - Error types for the opportunity pipeline.

use thiserror::Error;
use uuid::Uuid;

use crate::opportunity::OpportunityId;

/// Errors that can occur during pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: String,
        source: std::io::Error,
    },

    /// Failed to serialize/deserialize pipeline data.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The requested opportunity was not found.
    #[error("opportunity not found: {0}")]
    NotFound(OpportunityId),

    /// An opportunity with this id is already in the store.
    #[error("opportunity already exists: {0}")]
    DuplicateId(OpportunityId),

    /// Won indices were empty, covered every topic, or pointed past the end.
    #[error("invalid split of {opportunity_id}: {reason}")]
    InvalidSplit {
        opportunity_id: OpportunityId,
        reason: String,
    },

    /// A split confirmation is already open for another opportunity.
    #[error("split confirmation already open for {0}")]
    WorkflowBusy(OpportunityId),

    /// A status name that does not match any pipeline stage.
    #[error("unknown status: {0}")]
    UnknownStatus(String),

    /// The requested task does not exist on the opportunity.
    #[error("task {task_id} not found on opportunity {opportunity_id}")]
    TaskNotFound {
        opportunity_id: OpportunityId,
        task_id: Uuid,
    },

    /// A notification sink could not accept an event.
    #[error("notification error: {0}")]
    NotificationError(String),

    /// Task text was empty after trimming.
    #[error("task text must not be empty")]
    EmptyTaskText,
}
