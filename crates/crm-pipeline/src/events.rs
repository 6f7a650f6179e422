// events.rs - Pipeline events and notification dispatch.
//
// The pipeline emits an event after every successful store mutation. Sinks
// (a JSONL log, the tracing subscriber, a dashboard feed) subscribe to them.
// A failing sink is logged and skipped; it never rolls back the mutation.

use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::opportunity::{Opportunity, OpportunityId, OpportunityStatus};
use crate::task::TaskStatus;

/// Events emitted at pipeline mutation points.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A new opportunity entered the pipeline.
    OpportunityCreated {
        opportunity_id: OpportunityId,
        customer_name: String,
        topics: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// An opportunity moved to another stage.
    StatusChanged {
        opportunity_id: OpportunityId,
        from_status: OpportunityStatus,
        to_status: OpportunityStatus,
        timestamp: DateTime<Utc>,
    },

    /// A bundle was split into a won and a lost record.
    OpportunitySplit {
        original_id: OpportunityId,
        won_id: OpportunityId,
        lost_id: OpportunityId,
        won_indices: BTreeSet<usize>,
        timestamp: DateTime<Utc>,
    },

    /// A follow-up task was added.
    TaskAdded {
        opportunity_id: OpportunityId,
        task_id: Uuid,
        text: String,
        timestamp: DateTime<Utc>,
    },

    /// A task changed status.
    TaskStatusChanged {
        opportunity_id: OpportunityId,
        task_id: Uuid,
        to_status: TaskStatus,
        timestamp: DateTime<Utc>,
    },
}

impl PipelineEvent {
    /// Get the event type name as a string.
    pub fn event_type(&self) -> &str {
        match self {
            PipelineEvent::OpportunityCreated { .. } => "opportunity_created",
            PipelineEvent::StatusChanged { .. } => "status_changed",
            PipelineEvent::OpportunitySplit { .. } => "opportunity_split",
            PipelineEvent::TaskAdded { .. } => "task_added",
            PipelineEvent::TaskStatusChanged { .. } => "task_status_changed",
        }
    }

    pub fn opportunity_created(opportunity: &Opportunity) -> Self {
        PipelineEvent::OpportunityCreated {
            opportunity_id: opportunity.id.clone(),
            customer_name: opportunity.customer_name.clone(),
            topics: opportunity
                .training_topics()
                .into_iter()
                .map(str::to_string)
                .collect(),
            timestamp: Utc::now(),
        }
    }

    pub fn status_changed(
        opportunity_id: &OpportunityId,
        from: OpportunityStatus,
        to: OpportunityStatus,
    ) -> Self {
        PipelineEvent::StatusChanged {
            opportunity_id: opportunity_id.clone(),
            from_status: from,
            to_status: to,
            timestamp: Utc::now(),
        }
    }

    pub fn opportunity_split(
        original_id: &OpportunityId,
        won_id: &OpportunityId,
        lost_id: &OpportunityId,
        won_indices: &BTreeSet<usize>,
    ) -> Self {
        PipelineEvent::OpportunitySplit {
            original_id: original_id.clone(),
            won_id: won_id.clone(),
            lost_id: lost_id.clone(),
            won_indices: won_indices.clone(),
            timestamp: Utc::now(),
        }
    }

    pub fn task_added(opportunity_id: &OpportunityId, task_id: Uuid, text: &str) -> Self {
        PipelineEvent::TaskAdded {
            opportunity_id: opportunity_id.clone(),
            task_id,
            text: text.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn task_status_changed(
        opportunity_id: &OpportunityId,
        task_id: Uuid,
        to: TaskStatus,
    ) -> Self {
        PipelineEvent::TaskStatusChanged {
            opportunity_id: opportunity_id.clone(),
            task_id,
            to_status: to,
            timestamp: Utc::now(),
        }
    }
}

/// Receives pipeline events.
pub trait NotificationSink: Send {
    /// Handle an event. Errors are logged but don't stop the pipeline.
    fn send(&self, event: &PipelineEvent) -> Result<(), PipelineError>;
}

/// Appends events as JSONL to a file.
pub struct LogSink {
    path: PathBuf,
}

impl LogSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl NotificationSink for LogSink {
    fn send(&self, event: &PipelineEvent) -> Result<(), PipelineError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| PipelineError::IoError {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| PipelineError::IoError {
                path: self.path.display().to_string(),
                source,
            })?;

        let json = serde_json::to_string(event)?;
        writeln!(file, "{}", json).map_err(|source| PipelineError::IoError {
            path: self.path.display().to_string(),
            source,
        })?;

        Ok(())
    }
}

/// Emits each event as an `info` record on the `crm_pipeline::events` target.
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn send(&self, event: &PipelineEvent) -> Result<(), PipelineError> {
        let json = serde_json::to_string(event)?;
        tracing::info!(event_type = event.event_type(), "{}", json);
        Ok(())
    }
}

/// Holds events in memory until the caller takes them.
///
/// Clones share one buffer, so a clone can be handed to the dispatcher while
/// the caller keeps another to drain once the mutation is persisted.
#[derive(Clone, Default)]
pub struct BufferSink {
    events: Arc<Mutex<Vec<PipelineEvent>>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return every buffered event, oldest first.
    pub fn take(&self) -> Vec<PipelineEvent> {
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *events)
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NotificationSink for BufferSink {
    fn send(&self, event: &PipelineEvent) -> Result<(), PipelineError> {
        self.events
            .lock()
            .map_err(|e| PipelineError::NotificationError(format!("buffer lock poisoned: {}", e)))?
            .push(event.clone());
        Ok(())
    }
}

/// Dispatches events to multiple sinks.
///
/// Errors from individual sinks are logged (via tracing) but don't
/// prevent other sinks from receiving the event.
pub struct EventDispatcher {
    sinks: Vec<Box<dyn NotificationSink>>,
}

impl EventDispatcher {
    /// Create a new dispatcher with no sinks.
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    /// Add a notification sink.
    pub fn add_sink(&mut self, sink: Box<dyn NotificationSink>) {
        self.sinks.push(sink);
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Dispatch an event to all sinks.
    pub fn dispatch(&self, event: &PipelineEvent) {
        for sink in &self.sinks {
            if let Err(e) = sink.send(event) {
                tracing::warn!("notification sink error: {}", e);
            }
        }
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
