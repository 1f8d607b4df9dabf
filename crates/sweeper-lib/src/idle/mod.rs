//! Idle resource detection
//!
//! An instance is idle when, over a trailing window, every metric in the
//! catalog stays under its threshold at the configured percentile. Samples
//! are streamed page by page into a [`TDigest`], never held in full.
//!
//! Instances younger than the window are never classified. A failed or empty
//! metric query yields [`IdleOutcome::InsufficientData`] so that the idle
//! filter does not act on a guess.

mod digest;
mod source;

pub use digest::{TDigest, DEFAULT_COMPRESSION};
pub use source::{
    CloudMonitoringSource, MetricQuery, MetricSource, SamplePage, DEFAULT_MONITORING_ENDPOINT,
};

use crate::error::{ConfigError, MetricError};
use crate::models::CloudItem;
use crate::observability::SweeperMetrics;
use chrono::{Duration, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Trailing window sampled for each metric
pub const DEFAULT_IDLE_WINDOW_DAYS: i64 = 30;

/// Upper bound on pages read for one metric
const MAX_PAGES: usize = 10_000;

pub const CPU_UTILIZATION_METRIC: &str = "compute.googleapis.com/instance/cpu/utilization";

/// Post-estimation adjustment applied before the threshold comparison
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Transform {
    #[default]
    Identity,
    Linear { scale: f64, offset: f64 },
}

impl Transform {
    pub fn apply(self, value: f64) -> f64 {
        match self {
            Transform::Identity => value,
            Transform::Linear { scale, offset } => value * scale + offset,
        }
    }
}

/// One tracked metric and, after evaluation, its measured value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdleMetric {
    pub metric: String,
    pub percentile: f64,
    pub threshold: f64,
    pub transform: Transform,
    pub measured: Option<f64>,
}

impl IdleMetric {
    pub fn new(metric: impl Into<String>, percentile: f64, threshold: f64) -> Self {
        Self {
            metric: metric.into(),
            percentile,
            threshold,
            transform: Transform::Identity,
            measured: None,
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Below-threshold check on the measured value
    pub fn is_under_threshold(&self) -> bool {
        self.measured.map(|m| m < self.threshold).unwrap_or(false)
    }
}

/// Static set of metrics that define "idle"
#[derive(Debug, Clone, PartialEq)]
pub struct IdleCatalog {
    metrics: Vec<IdleMetric>,
}

impl Default for IdleCatalog {
    /// CPU utilization p95 below 5%
    fn default() -> Self {
        Self {
            metrics: vec![IdleMetric::new(CPU_UTILIZATION_METRIC, 0.95, 0.05)],
        }
    }
}

impl IdleCatalog {
    /// Rejects an empty set and percentiles outside (0, 1]
    pub fn new(metrics: Vec<IdleMetric>) -> Result<Self, ConfigError> {
        if metrics.is_empty() {
            return Err(ConfigError::InvalidSetting {
                name: "idle_metrics".to_string(),
                reason: "at least one metric is required".to_string(),
            });
        }
        if let Some(bad) = metrics
            .iter()
            .find(|m| !(m.percentile > 0.0 && m.percentile <= 1.0))
        {
            return Err(ConfigError::InvalidSetting {
                name: "idle_metrics".to_string(),
                reason: format!(
                    "percentile {} for {} is outside (0, 1]",
                    bad.percentile, bad.metric
                ),
            });
        }
        Ok(Self { metrics })
    }

    pub fn metrics(&self) -> &[IdleMetric] {
        &self.metrics
    }
}

/// Idle classification of a single item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdleOutcome {
    Idle,
    Active,
    /// Created inside the sampling window
    TooYoung,
    /// A query failed, was cancelled or returned no samples
    InsufficientData,
}

impl IdleOutcome {
    pub fn is_idle(self) -> bool {
        self == IdleOutcome::Idle
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IdleOutcome::Idle => "idle",
            IdleOutcome::Active => "active",
            IdleOutcome::TooYoung => "too_young",
            IdleOutcome::InsufficientData => "insufficient_data",
        }
    }
}

impl fmt::Display for IdleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies instances from monitoring samples
pub struct IdleDetector {
    source: Arc<dyn MetricSource>,
    catalog: Arc<IdleCatalog>,
    project_id: String,
    window: Duration,
    metrics: SweeperMetrics,
}

impl IdleDetector {
    pub fn new(source: Arc<dyn MetricSource>, project_id: impl Into<String>) -> Self {
        Self {
            source,
            catalog: Arc::new(IdleCatalog::default()),
            project_id: project_id.into(),
            window: Duration::days(DEFAULT_IDLE_WINDOW_DAYS),
            metrics: SweeperMetrics::new(),
        }
    }

    /// Replace the metric catalog
    pub fn with_catalog(mut self, catalog: IdleCatalog) -> Self {
        self.catalog = Arc::new(catalog);
        self
    }

    /// Set custom window size
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Classify an item
    pub async fn classify(&self, item: &CloudItem, cancel: &CancellationToken) -> IdleOutcome {
        let outcome = self.evaluate(item, cancel).await;
        self.metrics.inc_idle_classification(outcome.as_str());
        outcome
    }

    async fn evaluate(&self, item: &CloudItem, cancel: &CancellationToken) -> IdleOutcome {
        let now = Utc::now();
        let start = now - self.window;
        if item.created() > start {
            debug!(
                item = %item.name(),
                created = %item.created(),
                window_days = self.window.num_days(),
                "Item younger than idle window, skipping"
            );
            return IdleOutcome::TooYoung;
        }

        let mut idle = true;
        for template in self.catalog.metrics() {
            let mut metric = template.clone();
            let query = MetricQuery {
                project_id: self.project_id.clone(),
                metric_type: metric.metric.clone(),
                instance_name: item.name().to_string(),
                start,
                end: now,
            };

            let mut digest = match self.collect(&query, cancel).await {
                Ok(digest) => digest,
                Err(MetricError::Cancelled) => {
                    warn!(item = %item.name(), metric = %metric.metric, "Metric query cancelled");
                    return IdleOutcome::InsufficientData;
                }
                Err(e) => {
                    self.metrics.inc_metric_query_errors();
                    error!(
                        item = %item.name(),
                        metric = %metric.metric,
                        error = %e,
                        "Metric query failed, excluding item from idle classification"
                    );
                    return IdleOutcome::InsufficientData;
                }
            };

            let Some(estimate) = digest.quantile(metric.percentile) else {
                warn!(item = %item.name(), metric = %metric.metric, "No samples in idle window");
                return IdleOutcome::InsufficientData;
            };

            metric.measured = Some(metric.transform.apply(estimate));
            info!(
                item = %item.name(),
                metric = %metric.metric,
                percentile = metric.percentile,
                threshold = metric.threshold,
                measured = ?metric.measured,
                samples = digest.count(),
                "Measured idle metric"
            );
            idle &= metric.is_under_threshold();
        }

        if idle {
            IdleOutcome::Idle
        } else {
            IdleOutcome::Active
        }
    }

    async fn collect(
        &self,
        query: &MetricQuery,
        cancel: &CancellationToken,
    ) -> Result<TDigest, MetricError> {
        let mut digest = TDigest::new(DEFAULT_COMPRESSION);
        let mut token: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let page = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(MetricError::Cancelled),
                page = self.source.fetch_page(query, token.as_deref()) => page?,
            };

            for value in page.values {
                digest.add(value);
            }

            match page.next_page_token {
                Some(next) => token = Some(next),
                None => return Ok(digest),
            }
        }

        warn!(metric = %query.metric_type, "Page limit reached, using partial samples");
        Ok(digest)
    }
}
