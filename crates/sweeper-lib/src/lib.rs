//! Sweeper library for cloud resource filtering
//!
//! This crate provides the core functionality for:
//! - A uniform resource model over instances, clusters, stacks, databases,
//!   disks, access keys and alerts
//! - Declarative include/exclude rules and the engine that matches them
//! - Idle detection from monitoring samples
//! - Remote HTTP probing of instances
//! - The filter pipeline and its built-in filters
//! - Observability

pub mod action;
pub mod collector;
pub mod engine;
pub mod error;
pub mod idle;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod probe;
pub mod settings;

pub use action::{Action, ActionKind, ActionReport, JsonAction, LogAction};
pub use collector::{Collector, JsonFileCollector};
pub use engine::{Direction, FilterConfig, FilterEngine, MatchOutcome, MatchSettings, RuleKey};
pub use error::{ConfigError, MetricError, ProbeError};
pub use models::*;
pub use observability::{RunLogger, SweeperMetrics};
pub use pipeline::{
    Filter, FilterDeps, FilterKind, FilterPipeline, FilterRegistry, FilterSettings,
    PipelineReport, Verdict,
};
pub use settings::ProbeEnvironment;
