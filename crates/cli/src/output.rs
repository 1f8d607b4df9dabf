//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use sweeper_lib::MatchOutcome;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print rows as a table, or the serializable records as JSON
pub fn print_rows<R: Tabled, S: Serialize>(
    rows: Vec<R>,
    records: &[S],
    format: OutputFormat,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Table => {
            if rows.is_empty() {
                print_warning("No items found");
                return Ok(());
            }
            let table = Table::new(rows).with(Style::rounded()).to_string();
            println!("{}", table);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(records)?);
        }
    }
    Ok(())
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Color an engine outcome
pub fn color_outcome(outcome: MatchOutcome) -> String {
    let text = outcome.to_string();
    match outcome {
        MatchOutcome::Matched => text.green().to_string(),
        MatchOutcome::Unmatched => text.normal().to_string(),
        MatchOutcome::Overridden => text.magenta().to_string(),
        MatchOutcome::NotApplicable => text.dimmed().to_string(),
    }
}

/// Color the keep/drop decision
pub fn color_decision(included: bool) -> String {
    if included {
        "keep".green().bold().to_string()
    } else {
        "drop".red().bold().to_string()
    }
}

/// Join rule values for a table cell
pub fn format_values(values: &[String]) -> String {
    if values.is_empty() {
        "(none)".to_string()
    } else {
        values.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_values() {
        assert_eq!(format_values(&[]), "(none)");
        assert_eq!(
            format_values(&["prod-".to_string(), "ci-".to_string()]),
            "prod-, ci-"
        );
    }

    #[test]
    fn test_colored_text_keeps_words() {
        colored::control::set_override(false);
        assert_eq!(color_decision(true), "keep");
        assert_eq!(color_decision(false), "drop");
        assert_eq!(color_outcome(MatchOutcome::NotApplicable), "not-applicable");
    }
}
