//! Observability infrastructure for the sweeper
//!
//! Provides:
//! - Prometheus metrics (items evaluated/selected per filter, probe outcomes,
//!   idle classifications, stage latency)
//! - A textfile export of the registry for batch runs
//! - Structured JSON logging of run lifecycle events with tracing

use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter, register_int_counter_vec,
    Encoder, Histogram, HistogramVec, IntCounter, IntCounterVec, TextEncoder,
};
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{info, warn};

/// Buckets for network-bound latencies (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<SweeperMetricsInner> = OnceLock::new();

struct SweeperMetricsInner {
    items_evaluated: IntCounterVec,
    items_selected: IntCounterVec,
    probe_results: IntCounterVec,
    probe_latency_seconds: Histogram,
    idle_classifications: IntCounterVec,
    metric_query_errors: IntCounter,
    stage_latency_seconds: HistogramVec,
}

impl SweeperMetricsInner {
    fn new() -> Self {
        Self {
            items_evaluated: register_int_counter_vec!(
                "sweeper_items_evaluated_total",
                "Items offered to a filter stage",
                &["filter"]
            )
            .expect("Failed to register items_evaluated"),

            items_selected: register_int_counter_vec!(
                "sweeper_items_selected_total",
                "Items kept by a filter stage",
                &["filter"]
            )
            .expect("Failed to register items_selected"),

            probe_results: register_int_counter_vec!(
                "sweeper_probe_results_total",
                "Remote probe results by outcome",
                &["outcome"]
            )
            .expect("Failed to register probe_results"),

            probe_latency_seconds: register_histogram!(
                "sweeper_probe_latency_seconds",
                "Time spent probing a remote endpoint",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register probe_latency_seconds"),

            idle_classifications: register_int_counter_vec!(
                "sweeper_idle_classifications_total",
                "Idle detector decisions by result",
                &["result"]
            )
            .expect("Failed to register idle_classifications"),

            metric_query_errors: register_int_counter!(
                "sweeper_metric_query_errors_total",
                "Failed monitoring backend queries"
            )
            .expect("Failed to register metric_query_errors"),

            stage_latency_seconds: register_histogram_vec!(
                "sweeper_stage_latency_seconds",
                "Wall time of a filter stage",
                &["filter"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register stage_latency_seconds"),
        }
    }
}

/// Sweeper metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct SweeperMetrics {
    _private: (),
}

impl Default for SweeperMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SweeperMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SweeperMetrics").finish()
    }
}

impl SweeperMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(SweeperMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &SweeperMetricsInner {
        GLOBAL_METRICS.get_or_init(SweeperMetricsInner::new)
    }

    pub fn inc_evaluated(&self, filter: &str, count: u64) {
        self.inner()
            .items_evaluated
            .with_label_values(&[filter])
            .inc_by(count);
    }

    pub fn inc_selected(&self, filter: &str, count: u64) {
        self.inner()
            .items_selected
            .with_label_values(&[filter])
            .inc_by(count);
    }

    /// Record a probe outcome and how long it took
    pub fn observe_probe(&self, outcome: &str, duration: Duration) {
        self.inner()
            .probe_results
            .with_label_values(&[outcome])
            .inc();
        self.inner()
            .probe_latency_seconds
            .observe(duration.as_secs_f64());
    }

    pub fn inc_idle_classification(&self, result: &str) {
        self.inner()
            .idle_classifications
            .with_label_values(&[result])
            .inc();
    }

    pub fn inc_metric_query_errors(&self) {
        self.inner().metric_query_errors.inc();
    }

    pub fn observe_stage_latency(&self, filter: &str, duration: Duration) {
        self.inner()
            .stage_latency_seconds
            .with_label_values(&[filter])
            .observe(duration.as_secs_f64());
    }

    /// Render the default registry in the Prometheus text format
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Write the registry to a file for a node-exporter textfile collector
    pub fn write_textfile(&self, path: &Path) -> anyhow::Result<()> {
        let rendered = self.render()?;
        let tmp = path.with_extension("prom.tmp");
        std::fs::write(&tmp, rendered)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

/// Structured logger for sweep run events
#[derive(Clone, Debug)]
pub struct RunLogger {
    run_id: String,
}

impl RunLogger {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn log_run_started(&self, stages: &[String], items: usize) {
        info!(
            event = "run_started",
            run_id = %self.run_id,
            stages = ?stages,
            items = items,
            "Sweep run started"
        );
    }

    pub fn log_stage_completed(&self, filter: &str, input: usize, output: usize, elapsed: Duration) {
        info!(
            event = "stage_completed",
            run_id = %self.run_id,
            filter = %filter,
            input = input,
            output = output,
            elapsed_ms = elapsed.as_millis() as u64,
            "Filter stage completed"
        );
    }

    pub fn log_item_selected(&self, filter: &str, item: &str, reason: &str) {
        info!(
            event = "item_selected",
            run_id = %self.run_id,
            filter = %filter,
            item = %item,
            reason = %reason,
            "Item selected by filter"
        );
    }

    pub fn log_run_finished(&self, selected: usize, elapsed: Duration) {
        info!(
            event = "run_finished",
            run_id = %self.run_id,
            selected = selected,
            elapsed_ms = elapsed.as_millis() as u64,
            "Sweep run finished"
        );
    }

    pub fn log_run_cancelled(&self, completed_stages: usize, remaining: usize) {
        warn!(
            event = "run_cancelled",
            run_id = %self.run_id,
            completed_stages = completed_stages,
            remaining = remaining,
            "Sweep run cancelled, no items handed on"
        );
    }
}
