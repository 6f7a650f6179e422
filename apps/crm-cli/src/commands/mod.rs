// mod.rs - Subcommand modules and the helpers they share.
//
// Mutating commands run inside a `Session`. Events reach tracing as they
// happen, but the JSONL log only receives them once the snapshot is written.

pub mod board;
pub mod opportunity;
pub mod stage;
pub mod task;

use crm_pipeline::{
    BufferSink, Currency, EventDispatcher, InMemoryStore, LogSink, NotificationSink, OpportunityId,
    OpportunityStore, Pipeline, TracingSink,
};

use crate::config::CrmConfig;
use crate::snapshot;

/// Load the snapshot for a read-only command.
pub fn open_pipeline(config: &CrmConfig) -> anyhow::Result<Pipeline<InMemoryStore>> {
    let store = snapshot::load(&config.snapshot)?;
    let mut dispatcher = EventDispatcher::new();
    dispatcher.add_sink(Box::new(TracingSink));
    Ok(Pipeline::with_dispatcher(store, dispatcher))
}

/// A pipeline opened by a command that changes it.
pub struct Session {
    pub pipeline: Pipeline<InMemoryStore>,
    pending: BufferSink,
}

/// Load the snapshot and hold back logged events until [`Session::commit`].
pub fn open_session(config: &CrmConfig) -> anyhow::Result<Session> {
    let store = snapshot::load(&config.snapshot)?;
    let pending = BufferSink::new();
    let mut dispatcher = EventDispatcher::new();
    dispatcher.add_sink(Box::new(TracingSink));
    dispatcher.add_sink(Box::new(pending.clone()));
    Ok(Session {
        pipeline: Pipeline::with_dispatcher(store, dispatcher),
        pending,
    })
}

impl Session {
    /// Write the snapshot, then append the held events to the JSONL log.
    /// A failed save returns before anything is logged.
    pub fn commit(self, config: &CrmConfig) -> anyhow::Result<()> {
        snapshot::save(&config.snapshot, self.pipeline.store())?;
        let events = self.pending.take();
        if let Some(log) = &config.events_log {
            let sink = LogSink::new(log);
            for event in &events {
                if let Err(e) = sink.send(event) {
                    tracing::warn!("event log write failed: {}", e);
                }
            }
        }
        Ok(())
    }
}

/// Fail with a readable message when `id` is not in the store.
pub fn require_known(pipeline: &Pipeline<InMemoryStore>, id: &OpportunityId) -> anyhow::Result<()> {
    if pipeline.store().get(id).is_none() {
        anyhow::bail!("Opportunity not found: {}", id);
    }
    Ok(())
}

pub fn format_money(value: f64, currency: Currency, decimals: usize) -> String {
    format!("{:.*} {}", decimals, value, currency)
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        s.to_string()
    }
}
