//! Per-item explanation of rule engine decisions

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use sweeper_lib::{
    CloudItem, Collector, Direction, FilterConfig, FilterEngine, JsonFileCollector, MatchOutcome,
    MatchSettings,
};
use tabled::Tabled;

use crate::output::{color_decision, color_outcome, print_info, print_rows, OutputFormat};

/// Name the engine logs decisions under
const EXPLAIN_FILTER: &str = "explain";

pub struct ExplainOptions {
    pub direction: Direction,
    pub ignore_label: Option<String>,
    pub exact_owner_match: bool,
}

/// Row for explanation table
#[derive(Tabled)]
struct ExplanationRow {
    #[tabled(rename = "Provider")]
    provider: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Owner")]
    owner: String,
    #[tabled(rename = "Outcome")]
    outcome: String,
    #[tabled(rename = "Decision")]
    decision: String,
}

#[derive(Debug, Serialize)]
struct Explanation {
    provider: String,
    kind: String,
    name: String,
    owner: String,
    outcome: MatchOutcome,
    included: bool,
}

fn explain_item(engine: &FilterEngine, item: &CloudItem, direction: Direction) -> Explanation {
    let outcome = engine.evaluate(EXPLAIN_FILTER, item, direction);
    Explanation {
        provider: item.provider().to_string(),
        kind: item.kind().to_string(),
        name: item.name().to_string(),
        owner: item.owner().to_string(),
        outcome,
        included: outcome.is_included(direction),
    }
}

/// Evaluate every inventory item against the rules
pub async fn explain(
    filter_config: &Path,
    inventory: &Path,
    options: ExplainOptions,
    format: OutputFormat,
) -> Result<()> {
    let config = FilterConfig::load(filter_config)
        .with_context(|| format!("Failed to load filter config {}", filter_config.display()))?;
    let items = JsonFileCollector::new(inventory).list(None).await?;

    let engine = FilterEngine::new(
        Some(Arc::new(config)),
        MatchSettings {
            ignore_label: options.ignore_label,
            ignore_label_disabled: false,
            exact_owner_match: options.exact_owner_match,
        },
    );

    let explanations: Vec<Explanation> = items
        .iter()
        .map(|item| explain_item(&engine, item, options.direction))
        .collect();

    let rows = explanations
        .iter()
        .map(|e| ExplanationRow {
            provider: e.provider.clone(),
            kind: e.kind.clone(),
            name: e.name.clone(),
            owner: e.owner.clone(),
            outcome: color_outcome(e.outcome),
            decision: color_decision(e.included),
        })
        .collect();

    print_rows(rows, &explanations, format)?;

    if matches!(format, OutputFormat::Table) && !explanations.is_empty() {
        let kept = explanations.iter().filter(|e| e.included).count();
        print_info(&format!(
            "{} of {} items kept by {} rules",
            kept,
            explanations.len(),
            options.direction
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sweeper_lib::engine::{Property, RuleSection};
    use sweeper_lib::Provider;

    fn item(name: &str, tags: serde_json::Value) -> CloudItem {
        serde_json::from_value(json!({
            "kind": "instance",
            "id": name,
            "name": name,
            "created": "2024-01-01T00:00:00Z",
            "provider": "AWS",
            "state": "running",
            "tags": tags,
        }))
        .unwrap()
    }

    fn engine() -> FilterEngine {
        let config = FilterConfig::builder()
            .rule(
                Direction::Exclusive,
                RuleSection::Instance,
                Provider::Aws,
                Property::Name,
                ["prod-"],
            )
            .build()
            .unwrap();
        FilterEngine::new(
            Some(Arc::new(config)),
            MatchSettings {
                ignore_label: Some("keep-me".to_string()),
                ..MatchSettings::default()
            },
        )
    }

    #[test]
    fn test_explain_item() {
        let engine = engine();

        let prod = explain_item(&engine, &item("prod-db", json!({})), Direction::Exclusive);
        assert_eq!(prod.outcome, MatchOutcome::Matched);
        assert!(!prod.included);

        let dev = explain_item(&engine, &item("dev-db", json!({})), Direction::Exclusive);
        assert_eq!(dev.outcome, MatchOutcome::Unmatched);
        assert!(dev.included);

        let ignored = explain_item(&engine, &item("prod-x", json!({"keep-me": "1"})), Direction::Exclusive);
        assert_eq!(ignored.outcome, MatchOutcome::Overridden);
        assert!(ignored.included);
    }
}
