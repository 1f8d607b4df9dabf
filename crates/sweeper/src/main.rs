//! Cloud Sweeper - one-shot cloud resource filter run
//!
//! Reads an inventory snapshot, runs the configured filters over it and hands
//! the surviving items to a reporting action.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use sweeper_lib::{
    Collector, FilterConfig, FilterDeps, FilterEngine, FilterPipeline, FilterRegistry,
    FilterSettings, JsonFileCollector, MatchSettings, ProbeEnvironment, SweeperMetrics,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

const SWEEPER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(name = "sweeper", version, about = "Find cloud resources that need attention")]
struct Args {
    /// Configuration file (any format the config loader understands)
    #[arg(short, long, env = "SWEEPER_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // JSON logs go to stderr so stdout stays free for the json action
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json().with_writer(std::io::stderr))
        .init();

    info!(version = SWEEPER_VERSION, "Starting sweeper");

    let config = config::SweeperConfig::load(args.config.as_deref())?;
    let probe_env = ProbeEnvironment::from_env().context("Invalid probe environment")?;

    let rules = match &config.filter_config_path {
        Some(path) => {
            let rules = FilterConfig::load(path)
                .with_context(|| format!("Failed to load filter config {}", path.display()))?;
            info!(path = %path.display(), rules = rules.entries().count(), "Loaded filter config");
            Some(Arc::new(rules))
        }
        None => {
            warn!("No filter config given, rules will not match any item");
            None
        }
    };

    let engine = Arc::new(FilterEngine::new(
        rules,
        MatchSettings {
            ignore_label: config.ignore_label(),
            ignore_label_disabled: config.ignore_label_disabled,
            exact_owner_match: config.exact_owner_match,
        },
    ));

    let settings = FilterSettings {
        owner_label: config.owner_label.clone(),
        long_running_hours: config.long_running_hours,
        probe_env,
        ..FilterSettings::default()
    };
    let registry = FilterRegistry::from_names(&config.filters, &settings, FilterDeps::default())
        .context("Failed to build filters")?;

    let run_id = chrono::Utc::now().format("%Y%m%dT%H%M%S").to_string();
    let pipeline = FilterPipeline::builder()
        .engine(engine)
        .stages(registry.stages())
        .concurrency(config.concurrency)
        .run_id(run_id.clone())
        .build()?;

    let cancel = CancellationToken::new();
    let watchdog = tokio::spawn(cancel_on_signal_or_timeout(
        cancel.clone(),
        Duration::from_secs(config.run_timeout_secs),
    ));

    let items = JsonFileCollector::new(&config.inventory_path)
        .list(config.provider)
        .await?;
    info!(run_id = %run_id, items = items.len(), "Collected inventory");

    let report = pipeline.run(items, &cancel).await;
    watchdog.abort();

    if let Some(path) = &config.metrics_file {
        SweeperMetrics::new().write_textfile(path)?;
    }

    if report.cancelled {
        anyhow::bail!(
            "Run {} was cancelled after {} stage(s), no action taken",
            run_id,
            report.stages.len()
        );
    }

    let action = config.action.build();
    let outcome = action.apply(&report.selected).await?;
    info!(
        run_id = %run_id,
        action = %outcome.action,
        processed = outcome.processed,
        "Run complete"
    );

    Ok(())
}

/// Cancel the run on SIGINT or once the run timeout elapses
async fn cancel_on_signal_or_timeout(cancel: CancellationToken, timeout: Duration) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => warn!("Interrupt received, cancelling run"),
            Err(e) => {
                warn!(error = %e, "Failed to listen for interrupt, relying on run timeout");
                tokio::time::sleep(timeout).await;
            }
        },
        _ = tokio::time::sleep(timeout) => {
            warn!(timeout_secs = timeout.as_secs(), "Run timeout reached, cancelling run");
        }
    }
    cancel.cancel();
}
