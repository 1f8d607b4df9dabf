//! Filter construction
//!
//! Filters are registered explicitly at startup. Building a filter that
//! cannot work without a missing setting fails with a [`ConfigError`];
//! filters with optional inputs are built degraded with a warning.

use super::filters::{
    HttpUrlFilter, IdleFilter, LicenseFilter, LongRunningFilter, OwnerlessFilter, VersionFilter,
};
use super::Filter;
use crate::error::ConfigError;
use crate::idle::{CloudMonitoringSource, IdleCatalog, IdleDetector, MetricSource};
use crate::models::DEFAULT_OWNER_LABEL;
use crate::probe::RemoteProbe;
use crate::settings::{ProbeEnvironment, ENV_HTTP_PATH, ENV_MONITORING_ENDPOINT, ENV_PROJECT_ID};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

/// Names of the built-in filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    Ownerless,
    LongRunning,
    Idle,
    HttpUrl,
    License,
    Version,
}

impl FilterKind {
    pub const ALL: [FilterKind; 6] = [
        FilterKind::Ownerless,
        FilterKind::LongRunning,
        FilterKind::Idle,
        FilterKind::HttpUrl,
        FilterKind::License,
        FilterKind::Version,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FilterKind::Ownerless => "ownerless",
            FilterKind::LongRunning => "longrunning",
            FilterKind::Idle => "idle",
            FilterKind::HttpUrl => "httpurl",
            FilterKind::License => "license",
            FilterKind::Version => "version",
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        FilterKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| ConfigError::UnknownFilter(s.to_string()))
    }
}

/// Inputs shared by the built-in filters
#[derive(Debug, Clone)]
pub struct FilterSettings {
    pub owner_label: String,
    pub long_running_hours: u64,
    pub probe_env: ProbeEnvironment,
    pub idle_catalog: IdleCatalog,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            owner_label: DEFAULT_OWNER_LABEL.to_string(),
            long_running_hours: 24,
            probe_env: ProbeEnvironment::default(),
            idle_catalog: IdleCatalog::default(),
        }
    }
}

/// Network collaborators; missing ones are built from the settings
#[derive(Default, Clone)]
pub struct FilterDeps {
    pub probe: Option<Arc<RemoteProbe>>,
    pub metric_source: Option<Arc<dyn MetricSource>>,
}

impl FilterDeps {
    pub fn with_probe(mut self, probe: Arc<RemoteProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn with_metric_source(mut self, source: Arc<dyn MetricSource>) -> Self {
        self.metric_source = Some(source);
        self
    }

    fn probe(&mut self) -> Result<Arc<RemoteProbe>, ConfigError> {
        if let Some(probe) = &self.probe {
            return Ok(probe.clone());
        }
        let probe = Arc::new(RemoteProbe::with_reqwest().map_err(|e| {
            ConfigError::InvalidSetting {
                name: "http client".to_string(),
                reason: e.to_string(),
            }
        })?);
        self.probe = Some(probe.clone());
        Ok(probe)
    }

    fn metric_source(&mut self, env: &ProbeEnvironment) -> Result<Arc<dyn MetricSource>, ConfigError> {
        if let Some(source) = &self.metric_source {
            return Ok(source.clone());
        }
        let source: Arc<dyn MetricSource> = Arc::new(
            CloudMonitoringSource::new(env.monitoring_endpoint.clone(), env.access_token.clone())
                .map_err(|e| ConfigError::InvalidSetting {
                    name: ENV_MONITORING_ENDPOINT.to_string(),
                    reason: e.to_string(),
                })?,
        );
        self.metric_source = Some(source.clone());
        Ok(source)
    }
}

/// Filters in the order they were registered
#[derive(Default)]
pub struct FilterRegistry {
    filters: Vec<(FilterKind, Arc<dyn Filter>)>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: FilterKind, filter: Arc<dyn Filter>) {
        info!(filter = %kind, "Registered filter");
        self.filters.push((kind, filter));
    }

    /// Build the filters named in `names`, in order
    pub fn from_names<S: AsRef<str>>(
        names: &[S],
        settings: &FilterSettings,
        deps: FilterDeps,
    ) -> Result<Self, ConfigError> {
        let kinds = names
            .iter()
            .map(|n| n.as_ref().parse::<FilterKind>())
            .collect::<Result<Vec<_>, _>>()?;
        Self::build(&kinds, settings, deps)
    }

    /// Build the requested filters, in order
    pub fn build(
        kinds: &[FilterKind],
        settings: &FilterSettings,
        mut deps: FilterDeps,
    ) -> Result<Self, ConfigError> {
        let env = &settings.probe_env;
        let mut registry = Self::new();

        for &kind in kinds {
            let filter: Arc<dyn Filter> = match kind {
                FilterKind::Ownerless => Arc::new(OwnerlessFilter::new(settings.owner_label.clone())),
                FilterKind::LongRunning => {
                    Arc::new(LongRunningFilter::from_hours(settings.long_running_hours)?)
                }
                FilterKind::Idle => {
                    let project_id = env
                        .project_id
                        .clone()
                        .ok_or_else(|| missing(kind, ENV_PROJECT_ID))?;
                    let detector = IdleDetector::new(deps.metric_source(env)?, project_id)
                        .with_catalog(settings.idle_catalog.clone());
                    Arc::new(IdleFilter::new(detector))
                }
                FilterKind::HttpUrl => {
                    let path = env.http_path.clone().ok_or_else(|| missing(kind, ENV_HTTP_PATH))?;
                    Arc::new(HttpUrlFilter::new(deps.probe()?, path, env.http_port))
                }
                FilterKind::License => {
                    if env.http_path.is_none() {
                        warn!(filter = %kind, "No path found in {}, filter will select nothing", ENV_HTTP_PATH);
                    }
                    Arc::new(LicenseFilter::new(deps.probe()?, env.http_path.clone(), env.http_port))
                }
                FilterKind::Version => {
                    if env.http_path.is_none() {
                        warn!(filter = %kind, "No path found in {}, using the service version path", ENV_HTTP_PATH);
                    }
                    Arc::new(VersionFilter::new(deps.probe()?, env.http_path.clone(), env.http_port))
                }
            };
            registry.register(kind, filter);
        }

        Ok(registry)
    }

    pub fn get(&self, kind: FilterKind) -> Option<Arc<dyn Filter>> {
        self.filters
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, f)| f.clone())
    }

    pub fn kinds(&self) -> Vec<FilterKind> {
        self.filters.iter().map(|(k, _)| *k).collect()
    }

    /// Filters as pipeline stages
    pub fn stages(&self) -> Vec<Arc<dyn Filter>> {
        self.filters.iter().map(|(_, f)| f.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

fn missing(kind: FilterKind, name: &str) -> ConfigError {
    ConfigError::MissingSetting {
        filter: kind.to_string(),
        name: name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(path: Option<&str>, project: Option<&str>) -> FilterSettings {
        FilterSettings {
            probe_env: ProbeEnvironment {
                http_path: path.map(str::to_string),
                project_id: project.map(str::to_string),
                ..ProbeEnvironment::default()
            },
            ..FilterSettings::default()
        }
    }

    #[test]
    fn test_parse_filter_names() {
        assert_eq!("ownerless".parse::<FilterKind>().unwrap(), FilterKind::Ownerless);
        assert_eq!(" HTTPURL ".parse::<FilterKind>().unwrap(), FilterKind::HttpUrl);
        assert!(matches!(
            "nope".parse::<FilterKind>(),
            Err(ConfigError::UnknownFilter(ref n)) if n == "nope"
        ));
    }

    #[test]
    fn test_build_keeps_requested_order() {
        let registry = FilterRegistry::from_names(
            &["longrunning", "ownerless"],
            &FilterSettings::default(),
            FilterDeps::default(),
        )
        .unwrap();

        assert_eq!(
            registry.kinds(),
            vec![FilterKind::LongRunning, FilterKind::Ownerless]
        );
        let names: Vec<String> = registry.stages().iter().map(|s| s.name().to_string()).collect();
        assert_eq!(names, vec!["longrunning", "ownerless"]);
    }

    #[test]
    fn test_unknown_name_fails() {
        let result = FilterRegistry::from_names(
            &["ownerless", "bogus"],
            &FilterSettings::default(),
            FilterDeps::default(),
        );
        assert!(matches!(result, Err(ConfigError::UnknownFilter(_))));
    }

    #[test]
    fn test_idle_requires_project_id() {
        let result = FilterRegistry::build(&[FilterKind::Idle], &env(None, None), FilterDeps::default());
        assert!(matches!(
            result,
            Err(ConfigError::MissingSetting { ref name, .. }) if name == ENV_PROJECT_ID
        ));

        let registry =
            FilterRegistry::build(&[FilterKind::Idle], &env(None, Some("proj")), FilterDeps::default())
                .unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_httpurl_requires_path() {
        let result =
            FilterRegistry::build(&[FilterKind::HttpUrl], &env(None, None), FilterDeps::default());
        assert!(matches!(
            result,
            Err(ConfigError::MissingSetting { ref filter, .. }) if filter == "httpurl"
        ));

        assert!(FilterRegistry::build(
            &[FilterKind::HttpUrl],
            &env(Some("/health"), None),
            FilterDeps::default()
        )
        .is_ok());
    }

    #[test]
    fn test_probe_filters_degrade_without_path() {
        let registry = FilterRegistry::build(
            &[FilterKind::License, FilterKind::Version],
            &env(None, None),
            FilterDeps::default(),
        )
        .unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.get(FilterKind::Version).is_some());
        assert!(registry.get(FilterKind::Idle).is_none());
    }

    #[test]
    fn test_long_running_hours_out_of_range() {
        for hours in [u64::MAX, 1 << 62] {
            let settings = FilterSettings {
                long_running_hours: hours,
                ..FilterSettings::default()
            };
            let result =
                FilterRegistry::build(&[FilterKind::LongRunning], &settings, FilterDeps::default());
            assert!(matches!(
                result,
                Err(ConfigError::InvalidSetting { ref name, .. }) if name == "long_running_hours"
            ));
        }
    }
}
