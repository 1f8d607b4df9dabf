//! Environment sourced settings for probe based filters

use crate::error::ConfigError;
use crate::idle::DEFAULT_MONITORING_ENDPOINT;
use tracing::{info, warn};

pub const ENV_HTTP_PATH: &str = "HTTPURL_PATH";
pub const ENV_HTTP_PORT: &str = "HTTPURL_PORT";
pub const ENV_PROJECT_ID: &str = "GOOGLE_PROJECT_ID";
pub const ENV_ACCESS_TOKEN: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";
pub const ENV_MONITORING_ENDPOINT: &str = "MONITORING_ENDPOINT";

/// Parameters for the probe and idle filters
///
/// Nothing is validated here beyond the port format; each filter checks the
/// values it needs when the registry builds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeEnvironment {
    pub http_path: Option<String>,
    pub http_port: Option<u16>,
    pub project_id: Option<String>,
    pub access_token: Option<String>,
    pub monitoring_endpoint: String,
}

impl Default for ProbeEnvironment {
    fn default() -> Self {
        Self {
            http_path: None,
            http_port: None,
            project_id: None,
            access_token: None,
            monitoring_endpoint: DEFAULT_MONITORING_ENDPOINT.to_string(),
        }
    }
}

impl ProbeEnvironment {
    /// Read the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read through an arbitrary lookup; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let http_port = match get(ENV_HTTP_PORT) {
            Some(raw) => Some(raw.trim().parse::<u16>().map_err(|e| {
                ConfigError::InvalidSetting {
                    name: ENV_HTTP_PORT.to_string(),
                    reason: format!("{:?} is not a port: {}", raw, e),
                }
            })?),
            None => None,
        };

        let env = Self {
            http_path: get(ENV_HTTP_PATH),
            http_port,
            project_id: get(ENV_PROJECT_ID),
            access_token: get(ENV_ACCESS_TOKEN),
            monitoring_endpoint: get(ENV_MONITORING_ENDPOINT)
                .unwrap_or_else(|| DEFAULT_MONITORING_ENDPOINT.to_string()),
        };

        info!(
            http_path = ?env.http_path,
            http_port = ?env.http_port,
            project_id = ?env.project_id,
            "Loaded probe environment"
        );
        if env.access_token.is_none() {
            warn!("No monitoring access token set, idle queries will be unauthenticated");
        }
        Ok(env)
    }
}
