use super::probe_address;
use crate::models::CloudItem;
use crate::pipeline::{Filter, Verdict};
use crate::probe::RemoteProbe;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Selects running instances that answer HTTP on a path
pub struct HttpUrlFilter {
    probe: Arc<RemoteProbe>,
    path: String,
    port: Option<u16>,
}

impl HttpUrlFilter {
    pub fn new(probe: Arc<RemoteProbe>, path: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            probe,
            path: path.into(),
            port,
        }
    }
}

#[async_trait]
impl Filter for HttpUrlFilter {
    fn name(&self) -> &str {
        "httpurl"
    }

    async fn evaluate(&self, item: &CloudItem, cancel: &CancellationToken) -> Verdict {
        let Some(address) = probe_address(self.name(), item) else {
            return Verdict::Skip;
        };

        let result = self.probe.probe(address, self.port, &self.path, cancel).await;
        debug!(filter = self.name(), item = %item.name(), status = %result.status, "Probed instance");

        if result.status.is_sentinel() {
            Verdict::Skip
        } else {
            Verdict::select(format!("{} answered {}", self.path, result.code()))
        }
    }
}
