//! Inventory collection
//!
//! A collector returns the finalized list of items for a run. Provider
//! specific enumeration lives outside this crate; the file collector reads a
//! snapshot produced by it.

mod json_file;

pub use json_file::JsonFileCollector;

use crate::models::{CloudItem, Provider};
use anyhow::Result;

pub use async_trait::async_trait;

/// Source of cloud items
#[async_trait]
pub trait Collector: Send + Sync {
    /// List items, optionally restricted to one provider, in stable order
    async fn list(&self, provider: Option<Provider>) -> Result<Vec<CloudItem>>;
}
