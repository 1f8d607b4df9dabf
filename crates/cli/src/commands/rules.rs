//! Rule document inspection

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use sweeper_lib::{FilterConfig, RuleKey};
use tabled::Tabled;

use crate::output::{format_values, print_rows, OutputFormat};

/// Row for rules table
#[derive(Tabled)]
struct RuleRow {
    #[tabled(rename = "Direction")]
    direction: String,
    #[tabled(rename = "Section")]
    section: String,
    #[tabled(rename = "Provider")]
    provider: String,
    #[tabled(rename = "Property")]
    property: String,
    #[tabled(rename = "Values")]
    values: String,
}

#[derive(Serialize)]
struct RuleRecord<'a> {
    #[serde(flatten)]
    key: &'a RuleKey,
    values: &'a [String],
}

/// Show every configured rule list
pub fn show_rules(path: &Path, format: OutputFormat) -> Result<()> {
    let config = FilterConfig::load(path)
        .with_context(|| format!("Failed to load filter config {}", path.display()))?;

    let records: Vec<RuleRecord> = config
        .entries()
        .map(|(key, values)| RuleRecord { key, values })
        .collect();

    let rows = records
        .iter()
        .map(|r| RuleRow {
            direction: r.key.direction.to_string(),
            section: r.key.section.to_string(),
            provider: r.key.provider.to_string(),
            property: r.key.property.to_string(),
            values: format_values(r.values),
        })
        .collect();

    print_rows(rows, &records, format)
}
