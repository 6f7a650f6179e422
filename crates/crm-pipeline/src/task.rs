// task.rs - Follow-up tasks attached to an opportunity.
//
// Sales reps track small to-dos per deal ("send revised quote", "call HR").
// A task is advanced by clicking it: Todo → InProgress → Done → Todo.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PipelineError;

/// Progress of a single task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    /// The status a click advances to. Done wraps back to Todo.
    pub fn cycle(self) -> TaskStatus {
        match self {
            TaskStatus::Todo => TaskStatus::InProgress,
            TaskStatus::InProgress => TaskStatus::Done,
            TaskStatus::Done => TaskStatus::Todo,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Todo => write!(f, "todo"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Done => write!(f, "done"),
        }
    }
}

/// Which tasks a list view shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskFilter {
    #[default]
    All,
    Only(TaskStatus),
}

impl TaskFilter {
    pub fn matches(self, status: TaskStatus) -> bool {
        match self {
            TaskFilter::All => true,
            TaskFilter::Only(wanted) => wanted == status,
        }
    }
}

/// A to-do item on an opportunity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpportunityTask {
    pub id: Uuid,
    pub text: String,
    pub due_date: NaiveDate,
    pub status: TaskStatus,
}

impl OpportunityTask {
    /// Create a task in the `Todo` state. Text is trimmed and must not be empty.
    pub fn new(text: &str, due_date: NaiveDate) -> Result<Self, PipelineError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(PipelineError::EmptyTaskText);
        }
        Ok(Self {
            id: Uuid::new_v4(),
            text: text.to_string(),
            due_date,
            status: TaskStatus::Todo,
        })
    }
}
