use super::unsupported;
use crate::models::{CloudItem, State};
use crate::pipeline::{Filter, Verdict};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Selects instances and stacks without an owner tag
pub struct OwnerlessFilter {
    owner_label: String,
}

impl OwnerlessFilter {
    pub fn new(owner_label: impl Into<String>) -> Self {
        Self {
            owner_label: owner_label.into(),
        }
    }

    fn verdict(&self, item: &CloudItem) -> Verdict {
        if item.tags().contains_key(&self.owner_label) {
            Verdict::Skip
        } else {
            Verdict::select(format!("missing {} tag", self.owner_label))
        }
    }
}

#[async_trait]
impl Filter for OwnerlessFilter {
    fn name(&self) -> &str {
        "ownerless"
    }

    async fn evaluate(&self, item: &CloudItem, _cancel: &CancellationToken) -> Verdict {
        match item {
            CloudItem::Instance(instance) if instance.state == State::Terminated => {
                debug!(
                    filter = self.name(),
                    item = %item.name(),
                    "Filter does not apply for terminated instance"
                );
                Verdict::Skip
            }
            CloudItem::Instance(_) | CloudItem::Stack(_) => self.verdict(item),
            _ => unsupported(self.name(), item),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::*;
    use crate::models::Provider;

    async fn run(item: &CloudItem) -> Verdict {
        OwnerlessFilter::new("Owner")
            .evaluate(item, &CancellationToken::new())
            .await
    }

    #[tokio::test]
    async fn test_selects_untagged_instance_and_stack() {
        assert!(run(&instance("vm", Provider::Aws, &[])).await.is_selected());
        assert!(run(&stack("st", Provider::Aws, &[("team", "x")])).await.is_selected());
    }

    #[tokio::test]
    async fn test_skips_owned_items() {
        let owned = instance("vm", Provider::Aws, &[("Owner", "alice")]);
        assert_eq!(run(&owned).await, Verdict::Skip);
    }

    #[tokio::test]
    async fn test_skips_terminated_instance() {
        let terminated = instance_in_state("vm", State::Terminated, None);
        assert_eq!(run(&terminated).await, Verdict::Skip);
    }

    #[tokio::test]
    async fn test_unsupported_kind_is_skipped() {
        assert_eq!(run(&database("db", Provider::Aws, &[])).await, Verdict::Skip);
        assert_eq!(
            run(&access("key", Provider::Aws, None)).await,
            Verdict::Skip
        );
    }
}
