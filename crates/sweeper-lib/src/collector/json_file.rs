//! Inventory snapshot reader
//!
//! The snapshot is a JSON array of items tagged by `kind`:
//!
//! ```json
//! [{"kind": "instance", "id": "i-1", "name": "web", "created": "2024-01-01T00:00:00Z", "provider": "AWS"}]
//! ```

use super::Collector;
use crate::models::{CloudItem, Provider};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Reads items from a JSON snapshot on disk
#[derive(Debug, Clone)]
pub struct JsonFileCollector {
    path: PathBuf,
}

impl JsonFileCollector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Collector for JsonFileCollector {
    async fn list(&self, provider: Option<Provider>) -> Result<Vec<CloudItem>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read inventory {}", self.path.display()))?;

        let items: Vec<CloudItem> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse inventory {}", self.path.display()))?;
        let total = items.len();

        let items: Vec<CloudItem> = match provider {
            Some(provider) => items
                .into_iter()
                .filter(|item| item.provider() == provider)
                .collect(),
            None => items,
        };

        debug!(path = %self.path.display(), total, "Read inventory snapshot");
        info!(
            provider = ?provider,
            items = items.len(),
            "Collected items"
        );
        Ok(items)
    }
}
