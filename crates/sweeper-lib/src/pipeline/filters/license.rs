use super::probe_address;
use crate::models::CloudItem;
use crate::pipeline::{Filter, Verdict};
use crate::probe::{LicenseResponse, ProbeResult, ProbeStatus, RemoteProbe};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Path answered by every instance running the application
pub const VERSION_PATH: &str = "/api/service/version";

/// Message the application reports for a rejected license
pub const INVALID_LICENSE_MESSAGE: &str = "tamr license is not valid";

/// Days a license keeps working past its end date
pub const LICENSE_GRACE_DAYS: i64 = 5;

/// Selects instances running the application without a valid license
pub struct LicenseFilter {
    probe: Arc<RemoteProbe>,
    path: Option<String>,
    port: Option<u16>,
}

impl LicenseFilter {
    /// With no license path the filter selects nothing
    pub fn new(probe: Arc<RemoteProbe>, path: Option<String>, port: Option<u16>) -> Self {
        Self { probe, path, port }
    }
}

#[async_trait]
impl Filter for LicenseFilter {
    fn name(&self) -> &str {
        "license"
    }

    async fn evaluate(&self, item: &CloudItem, cancel: &CancellationToken) -> Verdict {
        let Some(path) = self.path.as_deref() else {
            return Verdict::Skip;
        };
        let Some(address) = probe_address(self.name(), item) else {
            return Verdict::Skip;
        };

        let version = self.probe.probe(address, self.port, VERSION_PATH, cancel).await;
        if version.status.is_sentinel() {
            debug!(
                filter = self.name(),
                item = %item.name(),
                status = %version.status,
                "Instance does not appear to run the application"
            );
            return Verdict::Skip;
        }

        let license = self.probe.probe(address, self.port, path, cancel).await;
        license_verdict(self.name(), item, &license, Utc::now())
    }
}

pub(crate) fn license_verdict(
    filter: &str,
    item: &CloudItem,
    result: &ProbeResult,
    now: DateTime<Utc>,
) -> Verdict {
    match result.status {
        status if status.is_sentinel() => {
            debug!(filter, item = %item.name(), %status, "No usable license response");
            Verdict::Skip
        }
        ProbeStatus::Http(200) => {
            let license = match result.decode::<LicenseResponse>() {
                Ok(response) => response.license,
                Err(e) => {
                    debug!(filter, item = %item.name(), error = %e, "License response could not be processed");
                    return Verdict::Skip;
                }
            };

            if !license.healthy {
                return Verdict::select("license unhealthy");
            }
            if license.message == INVALID_LICENSE_MESSAGE {
                return Verdict::select("license not valid");
            }
            if let Some(until) = license.timestamp {
                if until + Duration::days(LICENSE_GRACE_DAYS) < now {
                    return Verdict::select(format!("license expired at {}", until));
                }
            }
            debug!(filter, item = %item.name(), until = ?license.timestamp, "Instance has a valid license");
            Verdict::Skip
        }
        status => {
            debug!(filter, item = %item.name(), %status, "License endpoint did not confirm a license");
            Verdict::select(format!("license endpoint answered {}", status.code()))
        }
    }
}
