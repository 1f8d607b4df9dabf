//! Runner configuration

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use sweeper_lib::{ActionKind, Provider, DEFAULT_OWNER_LABEL};

const ENV_PREFIX: &str = "SWEEPER";

/// Runner configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SweeperConfig {
    /// JSON inventory snapshot to read items from
    pub inventory_path: PathBuf,

    /// Include/exclude rules document; without it no rule ever matches
    #[serde(default)]
    pub filter_config_path: Option<PathBuf>,

    /// Only sweep items of this provider
    #[serde(default)]
    pub provider: Option<Provider>,

    /// Filter names, applied in order
    #[serde(default)]
    pub filters: Vec<String>,

    #[serde(default)]
    pub action: ActionKind,

    #[serde(default = "default_ignore_label")]
    pub ignore_label: String,

    #[serde(default)]
    pub ignore_label_disabled: bool,

    #[serde(default)]
    pub exact_owner_match: bool,

    #[serde(default = "default_owner_label")]
    pub owner_label: String,

    #[serde(default = "default_long_running_hours")]
    pub long_running_hours: u64,

    /// Items evaluated concurrently within a stage
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Whole run is cancelled after this many seconds
    #[serde(default = "default_run_timeout")]
    pub run_timeout_secs: u64,

    /// Prometheus textfile written after the run
    #[serde(default)]
    pub metrics_file: Option<PathBuf>,
}

fn default_ignore_label() -> String {
    "cloud-sweeper-ignore".to_string()
}

fn default_owner_label() -> String {
    DEFAULT_OWNER_LABEL.to_string()
}

fn default_long_running_hours() -> u64 {
    24
}

fn default_concurrency() -> usize {
    sweeper_lib::pipeline::default_concurrency()
}

fn default_run_timeout() -> u64 {
    300
}

impl SweeperConfig {
    /// Load configuration from an optional file, then `SWEEPER_*` variables
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::load_with(file, environment())
    }

    fn load_with(file: Option<&Path>, env: config::Environment) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path));
        }

        let config = builder
            .add_source(env)
            .build()
            .context("Failed to read sweeper configuration")?;

        config
            .try_deserialize()
            .context("Invalid sweeper configuration")
    }

    /// Ignore label as the engine expects it; empty disables the override
    pub fn ignore_label(&self) -> Option<String> {
        let label = self.ignore_label.trim();
        (!label.is_empty()).then(|| label.to_string())
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("filters")
}
