use crate::error::ConfigError;
use crate::models::CloudItem;
use crate::pipeline::{Filter, Verdict};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio_util::sync::CancellationToken;

/// Selects items older than a fixed age
pub struct LongRunningFilter {
    threshold: Duration,
}

impl LongRunningFilter {
    pub fn new(threshold: Duration) -> Self {
        Self { threshold }
    }

    /// Threshold in hours; values chrono cannot represent are rejected
    pub fn from_hours(hours: u64) -> Result<Self, ConfigError> {
        i64::try_from(hours)
            .ok()
            .and_then(Duration::try_hours)
            .map(Self::new)
            .ok_or_else(|| ConfigError::InvalidSetting {
                name: "long_running_hours".to_string(),
                reason: format!("{} hours is out of range", hours),
            })
    }
}

#[async_trait]
impl Filter for LongRunningFilter {
    fn name(&self) -> &str {
        "longrunning"
    }

    async fn evaluate(&self, item: &CloudItem, _cancel: &CancellationToken) -> Verdict {
        let age = Utc::now() - item.created();
        if age > self.threshold {
            Verdict::select(format!("running for {}h", age.num_hours()))
        } else {
            Verdict::Skip
        }
    }
}
