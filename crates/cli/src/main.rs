//! Cloud Sweeper operator CLI
//!
//! Inspects filter rule documents and explains how the rule engine treats
//! the items of an inventory snapshot.

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use commands::{explain, rules};
use std::path::PathBuf;
use sweeper_lib::Direction;
use tracing_subscriber::EnvFilter;

/// Cloud Sweeper CLI
#[derive(Parser)]
#[command(name = "sweepctl")]
#[command(author, version, about = "Operator CLI for Cloud Sweeper filter rules", long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(long, short, default_value = "table")]
    pub output: output::OutputFormat,

    /// Log engine decisions to stderr
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List every configured rule of a filter document
    Rules {
        /// Filter document (YAML, JSON or TOML)
        #[arg(long, env = "SWEEPER_FILTER_CONFIG_PATH")]
        filter_config: PathBuf,
    },

    /// Show the rule engine outcome for every item of an inventory
    Explain {
        /// Filter document (YAML, JSON or TOML)
        #[arg(long, env = "SWEEPER_FILTER_CONFIG_PATH")]
        filter_config: PathBuf,

        /// JSON inventory snapshot
        #[arg(long, env = "SWEEPER_INVENTORY_PATH")]
        inventory: PathBuf,

        /// Rule partition to evaluate
        #[arg(long, default_value = "exclusive")]
        direction: DirectionArg,

        /// Tag key that overrides the rules
        #[arg(long)]
        ignore_label: Option<String>,

        /// Compare owners by equality instead of prefix
        #[arg(long)]
        exact_owner_match: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DirectionArg {
    Inclusive,
    Exclusive,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Inclusive => Direction::Inclusive,
            DirectionArg::Exclusive => Direction::Exclusive,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
            )
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Rules { filter_config } => {
            rules::show_rules(&filter_config, cli.output)?;
        }
        Commands::Explain {
            filter_config,
            inventory,
            direction,
            ignore_label,
            exact_owner_match,
        } => {
            let options = explain::ExplainOptions {
                direction: direction.into(),
                ignore_label,
                exact_owner_match,
            };
            explain::explain(&filter_config, &inventory, options, cli.output).await?;
        }
    }

    Ok(())
}
