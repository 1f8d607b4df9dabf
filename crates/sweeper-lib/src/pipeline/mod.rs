//! Filter pipeline
//!
//! Runs an ordered chain of filters over the collected items. Each stage
//! consults the [`FilterEngine`] for the declarative rules and the filter's
//! own heuristic, then hands the surviving items to the next stage.
//!
//! Per-item work within a stage runs through a bounded, order-preserving
//! pool; output order always matches input order.

mod filters;
mod registry;

pub use filters::{
    HttpUrlFilter, IdleFilter, LicenseFilter, LongRunningFilter, OwnerlessFilter, VersionFilter,
    INVALID_LICENSE_MESSAGE, LICENSE_GRACE_DAYS, MIN_PATCHED_VERSION, PATCHED_VERSIONS,
    VERSION_PATH,
};
pub use registry::{FilterDeps, FilterKind, FilterRegistry, FilterSettings};

use crate::engine::{Direction, FilterEngine};
use crate::models::CloudItem;
use crate::observability::{RunLogger, SweeperMetrics};
use anyhow::Result;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Heuristic decision for a single item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The item needs action, with a short reason
    Select(String),
    Skip,
}

impl Verdict {
    pub fn select(reason: impl Into<String>) -> Self {
        Verdict::Select(reason.into())
    }

    pub fn is_selected(&self) -> bool {
        matches!(self, Verdict::Select(_))
    }
}

/// A pipeline stage
///
/// Implementations must not fail: per-item problems are logged and turned
/// into [`Verdict::Skip`].
#[async_trait]
pub trait Filter: Send + Sync {
    fn name(&self) -> &str;

    /// Direction applied to the declarative rules
    fn direction(&self) -> Direction {
        Direction::Exclusive
    }

    /// Does the item need action according to this filter's heuristic?
    async fn evaluate(&self, item: &CloudItem, cancel: &CancellationToken) -> Verdict;
}

/// Outcome of a single stage
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub filter: String,
    pub input: usize,
    pub output: usize,
    pub elapsed_ms: u64,
}

/// Outcome of a full run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub selected: Vec<CloudItem>,
    pub stages: Vec<StageReport>,
    pub cancelled: bool,
}

/// Run one filter over a list of items
///
/// An item is kept when the engine includes it and the filter selects it.
/// The heuristic is not consulted for items the rules already dropped.
pub async fn filter_items(
    filter: &dyn Filter,
    engine: &FilterEngine,
    items: Vec<CloudItem>,
    concurrency: usize,
    cancel: &CancellationToken,
    logger: &RunLogger,
) -> Vec<CloudItem> {
    let name = filter.name();
    let direction = filter.direction();

    stream::iter(items.into_iter().map(|item| async move {
        if !engine.is_included(name, &item, direction) {
            return None;
        }
        match filter.evaluate(&item, cancel).await {
            Verdict::Select(reason) => {
                logger.log_item_selected(name, item.name(), &reason);
                Some(item)
            }
            Verdict::Skip => {
                debug!(filter = %name, item = %item.name(), "Item not selected");
                None
            }
        }
    }))
    .buffered(concurrency.max(1))
    .filter_map(|kept| async move { kept })
    .collect()
    .await
}

/// Ordered chain of filters
pub struct FilterPipeline {
    engine: Arc<FilterEngine>,
    stages: Vec<Arc<dyn Filter>>,
    concurrency: usize,
    logger: RunLogger,
    metrics: SweeperMetrics,
}

impl FilterPipeline {
    pub fn builder() -> FilterPipelineBuilder {
        FilterPipelineBuilder::new()
    }

    pub fn stage_names(&self) -> Vec<String> {
        self.stages.iter().map(|s| s.name().to_string()).collect()
    }

    /// Run every stage in order
    ///
    /// A cancelled run hands nothing on: items that did not pass every stage
    /// must not reach an action.
    pub async fn run(&self, items: Vec<CloudItem>, cancel: &CancellationToken) -> PipelineReport {
        let started = Instant::now();
        self.logger.log_run_started(&self.stage_names(), items.len());

        let mut current = items;
        let mut reports = Vec::with_capacity(self.stages.len());

        for (index, stage) in self.stages.iter().enumerate() {
            if cancel.is_cancelled() {
                return self.cancelled(reports, self.stages.len() - index);
            }

            let stage_started = Instant::now();
            let input = current.len();
            current = filter_items(
                stage.as_ref(),
                &self.engine,
                current,
                self.concurrency,
                cancel,
                &self.logger,
            )
            .await;
            let elapsed = stage_started.elapsed();

            if cancel.is_cancelled() {
                return self.cancelled(reports, self.stages.len() - index);
            }

            self.record_stage(stage.name(), input, current.len(), elapsed);
            reports.push(StageReport {
                filter: stage.name().to_string(),
                input,
                output: current.len(),
                elapsed_ms: elapsed.as_millis() as u64,
            });
        }

        self.logger.log_run_finished(current.len(), started.elapsed());
        PipelineReport {
            selected: current,
            stages: reports,
            cancelled: false,
        }
    }

    fn record_stage(&self, filter: &str, input: usize, output: usize, elapsed: Duration) {
        self.metrics.inc_evaluated(filter, input as u64);
        self.metrics.inc_selected(filter, output as u64);
        self.metrics.observe_stage_latency(filter, elapsed);
        self.logger.log_stage_completed(filter, input, output, elapsed);
    }

    fn cancelled(&self, stages: Vec<StageReport>, remaining: usize) -> PipelineReport {
        self.logger.log_run_cancelled(stages.len(), remaining);
        PipelineReport {
            selected: Vec::new(),
            stages,
            cancelled: true,
        }
    }
}

/// Builder for the filter pipeline
pub struct FilterPipelineBuilder {
    engine: Option<Arc<FilterEngine>>,
    stages: Vec<Arc<dyn Filter>>,
    concurrency: usize,
    run_id: Option<String>,
}

impl FilterPipelineBuilder {
    pub fn new() -> Self {
        Self {
            engine: None,
            stages: Vec::new(),
            concurrency: default_concurrency(),
            run_id: None,
        }
    }

    /// Set the rule engine
    pub fn engine(mut self, engine: Arc<FilterEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Append a stage
    pub fn stage(mut self, filter: Arc<dyn Filter>) -> Self {
        self.stages.push(filter);
        self
    }

    /// Append several stages in order
    pub fn stages(mut self, filters: impl IntoIterator<Item = Arc<dyn Filter>>) -> Self {
        self.stages.extend(filters);
        self
    }

    /// Bound on concurrently evaluated items per stage
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn build(self) -> Result<FilterPipeline> {
        let engine = self
            .engine
            .ok_or_else(|| anyhow::anyhow!("Filter engine is required"))?;
        if self.stages.is_empty() {
            anyhow::bail!("At least one filter stage is required");
        }

        let run_id = self
            .run_id
            .unwrap_or_else(|| chrono::Utc::now().format("%Y%m%dT%H%M%S").to_string());
        info!(run_id = %run_id, concurrency = self.concurrency, "Built filter pipeline");

        Ok(FilterPipeline {
            engine,
            stages: self.stages,
            concurrency: self.concurrency,
            logger: RunLogger::new(run_id),
            metrics: SweeperMetrics::new(),
        })
    }
}

impl Default for FilterPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Number of available execution units
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
