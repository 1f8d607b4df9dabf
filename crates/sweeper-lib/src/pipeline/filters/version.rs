use super::{license::VERSION_PATH, probe_address};
use crate::models::CloudItem;
use crate::pipeline::{Filter, Verdict};
use crate::probe::{ProbeResult, ProbeStatus, RemoteProbe, ServiceVersion};
use async_trait::async_trait;
use std::cmp::Ordering;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Releases carrying the security patch
pub const PATCHED_VERSIONS: &[&str] = &[
    "2019.019.2",
    "2020.004.3",
    "2020.012.1",
    "2020.016.7",
    "2020.024.3",
    "2021.002.4",
    "2021.006.4",
    "2021.020.1",
    "2021.021.0",
    "develop-SNAPSHOT",
];

/// Every release from this one on is patched
pub const MIN_PATCHED_VERSION: &str = "2021.021.0";

/// Selects instances running an unpatched application release
pub struct VersionFilter {
    probe: Arc<RemoteProbe>,
    path: String,
    port: Option<u16>,
}

impl VersionFilter {
    /// Falls back to the service version path when none is given
    pub fn new(probe: Arc<RemoteProbe>, path: Option<String>, port: Option<u16>) -> Self {
        Self {
            probe,
            path: path.unwrap_or_else(|| VERSION_PATH.to_string()),
            port,
        }
    }
}

#[async_trait]
impl Filter for VersionFilter {
    fn name(&self) -> &str {
        "version"
    }

    async fn evaluate(&self, item: &CloudItem, cancel: &CancellationToken) -> Verdict {
        let Some(address) = probe_address(self.name(), item) else {
            return Verdict::Skip;
        };
        let result = self.probe.probe(address, self.port, &self.path, cancel).await;
        version_verdict(self.name(), item, &result)
    }
}

pub(crate) fn version_verdict(filter: &str, item: &CloudItem, result: &ProbeResult) -> Verdict {
    match result.status {
        ProbeStatus::Http(200) => {
            let version = match result.decode::<ServiceVersion>() {
                Ok(body) => body.version,
                Err(e) => {
                    debug!(filter, item = %item.name(), error = %e, "Version response could not be processed");
                    return Verdict::Skip;
                }
            };
            info!(filter, item = %item.name(), version = %version, "Instance reports version");

            if version.is_empty() || PATCHED_VERSIONS.contains(&version.as_str()) {
                return Verdict::Skip;
            }
            match compare_versions(&version, MIN_PATCHED_VERSION) {
                Some(Ordering::Less) => Verdict::select(format!(
                    "version {} older than {}",
                    version, MIN_PATCHED_VERSION
                )),
                Some(_) => Verdict::Skip,
                None => {
                    warn!(filter, item = %item.name(), version = %version, "Cannot compare version");
                    Verdict::Skip
                }
            }
        }
        status if status.is_sentinel() => {
            debug!(filter, item = %item.name(), %status, "Instance did not respond, filter does not apply");
            Verdict::Skip
        }
        status => Verdict::select(format!("version endpoint answered {}", status.code())),
    }
}

/// Compare dot separated numeric versions; missing components count as zero
pub(crate) fn compare_versions(a: &str, b: &str) -> Option<Ordering> {
    let parse = |v: &str| {
        v.split('.')
            .map(|part| part.parse::<u64>().ok())
            .collect::<Option<Vec<u64>>>()
    };
    let (a, b) = (parse(a)?, parse(b)?);

    let len = a.len().max(b.len());
    for i in 0..len {
        let (x, y) = (a.get(i).copied().unwrap_or(0), b.get(i).copied().unwrap_or(0));
        match x.cmp(&y) {
            Ordering::Equal => continue,
            other => return Some(other),
        }
    }
    Some(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::*;
    use crate::models::Provider;
    use serde_json::json;

    fn ok(version: &str) -> ProbeResult {
        ProbeResult {
            status: ProbeStatus::Http(200),
            body: String::new(),
            json: Some(json!({ "version": version })),
            failed: false,
        }
    }

    fn verdict(result: &ProbeResult) -> Verdict {
        version_verdict("version", &instance("app", Provider::Gcp, &[]), result)
    }

    #[test]
    fn test_compare_versions() {
        assert_eq!(compare_versions("2020.016.7", "2021.021.0"), Some(Ordering::Less));
        assert_eq!(compare_versions("2021.021.0", "2021.021.0"), Some(Ordering::Equal));
        assert_eq!(compare_versions("2022.001", "2021.021.0"), Some(Ordering::Greater));
        assert_eq!(compare_versions("2021.21", "2021.021.0"), Some(Ordering::Equal));
        assert_eq!(compare_versions("develop", "2021.021.0"), None);
    }

    #[test]
    fn test_old_version_is_selected() {
        assert!(verdict(&ok("2020.016.6")).is_selected());
    }

    #[test]
    fn test_patched_and_new_versions_are_skipped() {
        assert_eq!(verdict(&ok("2020.016.7")), Verdict::Skip);
        assert_eq!(verdict(&ok("develop-SNAPSHOT")), Verdict::Skip);
        assert_eq!(verdict(&ok("2022.003.0")), Verdict::Skip);
    }

    #[test]
    fn test_unparseable_or_missing_version_is_skipped() {
        assert_eq!(verdict(&ok("feature-branch")), Verdict::Skip);
        assert_eq!(verdict(&ok("")), Verdict::Skip);

        let text = ProbeResult {
            status: ProbeStatus::Http(200),
            body: "2019.001.0".into(),
            json: None,
            failed: false,
        };
        assert_eq!(verdict(&text), Verdict::Skip);
    }

    #[test]
    fn test_status_handling() {
        let unreachable = ProbeResult {
            status: ProbeStatus::Unreachable,
            body: String::new(),
            json: None,
            failed: true,
        };
        let not_found = ProbeResult {
            status: ProbeStatus::Http(404),
            body: "missing".into(),
            json: None,
            failed: false,
        };

        assert_eq!(verdict(&unreachable), Verdict::Skip);
        assert!(verdict(&not_found).is_selected());
    }
}
