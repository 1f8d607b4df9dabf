use super::unsupported;
use crate::idle::{IdleDetector, IdleOutcome};
use crate::models::{CloudItem, Provider};
use crate::pipeline::{Filter, Verdict};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Selects GCP instances the idle detector classifies as idle
pub struct IdleFilter {
    detector: IdleDetector,
}

impl IdleFilter {
    pub fn new(detector: IdleDetector) -> Self {
        Self { detector }
    }
}

#[async_trait]
impl Filter for IdleFilter {
    fn name(&self) -> &str {
        "idle"
    }

    async fn evaluate(&self, item: &CloudItem, cancel: &CancellationToken) -> Verdict {
        if item.as_instance().is_none() {
            return unsupported(self.name(), item);
        }
        if item.provider() != Provider::Gcp {
            debug!(
                filter = self.name(),
                item = %item.name(),
                provider = %item.provider(),
                "Idle metrics only exist for GCP instances, skipping"
            );
            return Verdict::Skip;
        }

        match self.detector.classify(item, cancel).await {
            IdleOutcome::Idle => Verdict::select("idle"),
            outcome => {
                debug!(filter = self.name(), item = %item.name(), %outcome, "Item is not idle");
                Verdict::Skip
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MetricError;
    use crate::idle::{IdleCatalog, IdleMetric, MetricQuery, MetricSource, SamplePage};
    use crate::models::fixtures::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct ConstantSource {
        value: f64,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MetricSource for ConstantSource {
        async fn fetch_page(
            &self,
            _query: &MetricQuery,
            _page_token: Option<&str>,
        ) -> Result<SamplePage, MetricError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(SamplePage {
                values: vec![self.value; 100],
                next_page_token: None,
            })
        }
    }

    fn filter(value: f64) -> (IdleFilter, Arc<ConstantSource>) {
        let source = Arc::new(ConstantSource {
            value,
            calls: AtomicUsize::new(0),
        });
        let detector = IdleDetector::new(source.clone(), "proj")
            .with_catalog(IdleCatalog::new(vec![IdleMetric::new("cpu", 0.95, 0.15)]).unwrap());
        (IdleFilter::new(detector), source)
    }

    #[tokio::test]
    async fn test_selects_idle_gcp_instance() {
        let (filter, _) = filter(0.10);
        let item = instance("vm", Provider::Gcp, &[]);
        assert_eq!(
            filter.evaluate(&item, &CancellationToken::new()).await,
            Verdict::select("idle")
        );
    }

    #[tokio::test]
    async fn test_skips_busy_instance() {
        let (filter, _) = filter(0.80);
        let item = instance("vm", Provider::Gcp, &[]);
        assert_eq!(
            filter.evaluate(&item, &CancellationToken::new()).await,
            Verdict::Skip
        );
    }

    #[tokio::test]
    async fn test_other_providers_are_not_queried() {
        let (filter, source) = filter(0.10);
        let aws = instance("vm", Provider::Aws, &[]);
        let db = database("db", Provider::Gcp, &[]);
        let cancel = CancellationToken::new();

        assert_eq!(filter.evaluate(&aws, &cancel).await, Verdict::Skip);
        assert_eq!(filter.evaluate(&db, &cancel).await, Verdict::Skip);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }
}
