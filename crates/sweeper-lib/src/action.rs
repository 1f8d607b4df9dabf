//! Consumers of the filtered item list
//!
//! Actions receive the pipeline output in its original relative order. Only
//! non-destructive reporting actions live here.

use crate::models::CloudItem;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use tracing::info;

/// What an action did with the items
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActionReport {
    pub action: String,
    pub processed: usize,
}

#[async_trait]
pub trait Action: Send + Sync {
    fn name(&self) -> &str;

    async fn apply(&self, items: &[CloudItem]) -> Result<ActionReport>;
}

/// Configured action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    #[default]
    Log,
    Json,
}

impl ActionKind {
    pub fn build(self) -> Box<dyn Action> {
        match self {
            ActionKind::Log => Box::new(LogAction),
            ActionKind::Json => Box::new(JsonAction),
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Log => write!(f, "log"),
            ActionKind::Json => write!(f, "json"),
        }
    }
}

/// Emits one structured log event per item
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAction;

#[async_trait]
impl Action for LogAction {
    fn name(&self) -> &str {
        "log"
    }

    async fn apply(&self, items: &[CloudItem]) -> Result<ActionReport> {
        for item in items {
            info!(
                event = "item_reported",
                provider = %item.provider(),
                kind = %item.kind(),
                id = %item.id(),
                item = %item.name(),
                owner = %item.owner(),
                created = %item.created(),
                "Item needs attention"
            );
        }
        Ok(ActionReport {
            action: self.name().to_string(),
            processed: items.len(),
        })
    }
}

/// Prints the items as a JSON array on stdout
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonAction;

impl JsonAction {
    pub fn render(items: &[CloudItem]) -> Result<String> {
        serde_json::to_string_pretty(items).context("Failed to serialize items")
    }
}

#[async_trait]
impl Action for JsonAction {
    fn name(&self) -> &str {
        "json"
    }

    async fn apply(&self, items: &[CloudItem]) -> Result<ActionReport> {
        let rendered = Self::render(items)?;
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", rendered).context("Failed to write to stdout")?;

        Ok(ActionReport {
            action: self.name().to_string(),
            processed: items.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::*;
    use crate::models::Provider;

    #[tokio::test]
    async fn test_log_action_reports_count() {
        let items = vec![
            instance("a", Provider::Aws, &[]),
            database("b", Provider::Gcp, &[]),
        ];
        let report = LogAction.apply(&items).await.unwrap();
        assert_eq!(report.action, "log");
        assert_eq!(report.processed, 2);
    }

    #[test]
    fn test_json_render_keeps_order_and_kind() {
        let items = vec![
            database("orders", Provider::Aws, &[]),
            instance("web", Provider::Aws, &[]),
        ];
        let rendered = JsonAction::render(&items).unwrap();
        let parsed: Vec<CloudItem> = serde_json::from_str(&rendered).unwrap();

        assert_eq!(parsed, items);
        assert!(rendered.contains("\"kind\": \"database\""));
    }

    #[test]
    fn test_action_kind_from_config_value() {
        let kind: ActionKind = serde_json::from_str("\"json\"").unwrap();
        assert_eq!(kind, ActionKind::Json);
        assert_eq!(kind.build().name(), "json");
        assert_eq!(ActionKind::default(), ActionKind::Log);
    }
}
