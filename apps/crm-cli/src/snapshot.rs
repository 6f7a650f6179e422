// snapshot.rs - JSON snapshot of every opportunity, loaded per command.
//
// Each CLI invocation reads the snapshot into an `InMemoryStore`, runs one
// command against a `Pipeline`, and writes the store back if anything changed.

use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crm_pipeline::{InMemoryStore, Opportunity, OpportunityStore};

/// On-disk shape of the snapshot file.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PipelineSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub opportunities: Vec<Opportunity>,
}

/// Load the store from `path`. A missing file is an empty pipeline.
pub fn load(path: &Path) -> anyhow::Result<InMemoryStore> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no snapshot yet; starting empty");
        return Ok(InMemoryStore::new());
    }
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let snapshot: PipelineSnapshot =
        serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
    let store = InMemoryStore::from_opportunities(snapshot.opportunities)
        .with_context(|| format!("loading {}", path.display()))?;
    tracing::debug!(
        path = %path.display(),
        count = store.opportunities().len(),
        "snapshot loaded"
    );
    Ok(store)
}

/// Write every opportunity in `store` to `path`, creating parent directories.
pub fn save(path: &Path, store: &InMemoryStore) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let snapshot = PipelineSnapshot {
        saved_at: Some(Utc::now()),
        opportunities: store.opportunities().to_vec(),
    };
    let json = serde_json::to_string_pretty(&snapshot)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
