// config.rs - Where the CLI keeps its state, and how it displays it.
//
// `CrmConfig::for_project()` lays out defaults under `.crm/` in the project
// root. `CrmConfig::load()` overlays `.crm/config.toml` when present:
//
//   [data]
//   snapshot = "data/pipeline.json"   # relative to the project root
//
//   [events]
//   enabled = true
//   log = ".crm/events.jsonl"
//
//   [display]
//   currency_decimals = 2

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Resolved CLI configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CrmConfig {
    /// Root directory of the project.
    pub project_root: PathBuf,

    /// JSON snapshot holding every opportunity.
    pub snapshot: PathBuf,

    /// Append-only JSONL event log, when enabled.
    pub events_log: Option<PathBuf>,

    pub display: DisplayConfig,
}

/// Display / output configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Digits after the decimal point for prices and amounts.
    #[serde(default = "default_currency_decimals")]
    pub currency_decimals: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            currency_decimals: default_currency_decimals(),
        }
    }
}

/// On-disk shape of `.crm/config.toml`.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    data: DataSection,
    #[serde(default)]
    events: EventsSection,
    #[serde(default)]
    display: DisplayConfig,
}

#[derive(Debug, Default, Deserialize)]
struct DataSection {
    snapshot: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct EventsSection {
    #[serde(default = "default_events_enabled")]
    enabled: bool,
    log: Option<PathBuf>,
}

impl Default for EventsSection {
    fn default() -> Self {
        Self {
            enabled: default_events_enabled(),
            log: None,
        }
    }
}

// Serde default functions
fn default_currency_decimals() -> usize {
    2
}

fn default_events_enabled() -> bool {
    true
}

impl CrmConfig {
    /// Create a config with the standard `.crm/` layout for a project.
    pub fn for_project(project_root: impl AsRef<Path>) -> Self {
        let root = project_root.as_ref().to_path_buf();
        let crm_dir = root.join(".crm");
        Self {
            snapshot: crm_dir.join("pipeline.json"),
            events_log: Some(crm_dir.join("events.jsonl")),
            display: DisplayConfig::default(),
            project_root: root,
        }
    }

    /// Path of the optional TOML override file.
    pub fn config_file(project_root: impl AsRef<Path>) -> PathBuf {
        project_root.as_ref().join(".crm").join("config.toml")
    }

    /// Load the defaults and overlay `.crm/config.toml` if it exists.
    pub fn load(project_root: impl AsRef<Path>) -> anyhow::Result<Self> {
        let mut config = Self::for_project(&project_root);
        let path = Self::config_file(&project_root);
        if !path.exists() {
            return Ok(config);
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        let file: ConfigFile =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;

        if let Some(snapshot) = file.data.snapshot {
            config.snapshot = config.resolve(snapshot);
        }
        config.events_log = match (file.events.enabled, file.events.log) {
            (false, _) => None,
            (true, Some(log)) => Some(config.resolve(log)),
            (true, None) => config.events_log,
        };
        config.display = file.display;

        tracing::debug!(path = %path.display(), "loaded config overrides");
        Ok(config)
    }

    fn resolve(&self, path: PathBuf) -> PathBuf {
        if path.is_absolute() {
            path
        } else {
            self.project_root.join(path)
        }
    }
}
