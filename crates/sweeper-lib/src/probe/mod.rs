//! Remote endpoint probing
//!
//! A probe is a TCP reachability check followed by an HTTP GET. Every
//! outcome is a [`ProbeResult`]; failures are encoded as sentinel status
//! codes above the HTTP range so callers can tell "no usable response"
//! apart from "valid but unexpected response".

mod http;
mod schema;

pub use http::{HttpFetch, HttpResponse, ReqwestFetch, HTTP_TIMEOUT};
pub use schema::{LicenseResponse, LicenseStatus, ServiceVersion};

use crate::error::ProbeError;
use crate::observability::SweeperMetrics;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};
use url::Url;

/// Fixed timeout for the TCP reachability check
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(1);

/// Port dialled when none is configured
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// Status of a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    /// Real HTTP status code
    Http(u16),
    /// TCP connect failed or timed out
    Unreachable,
    /// HTTP request failed after the port accepted
    Transport,
    /// Body could not be read
    BodyRead,
    /// Probe was cancelled
    Cancelled,
    /// Response had no body
    Empty,
}

impl ProbeStatus {
    pub const UNREACHABLE: u16 = 999;
    pub const TRANSPORT: u16 = 998;
    pub const BODY_READ: u16 = 997;
    pub const CANCELLED: u16 = 996;
    pub const EMPTY: u16 = 995;

    pub fn code(self) -> u16 {
        match self {
            ProbeStatus::Http(code) => code,
            ProbeStatus::Unreachable => Self::UNREACHABLE,
            ProbeStatus::Transport => Self::TRANSPORT,
            ProbeStatus::BodyRead => Self::BODY_READ,
            ProbeStatus::Cancelled => Self::CANCELLED,
            ProbeStatus::Empty => Self::EMPTY,
        }
    }

    pub fn is_sentinel(self) -> bool {
        !matches!(self, ProbeStatus::Http(_))
    }

    /// Metric label
    pub fn outcome(self) -> &'static str {
        match self {
            ProbeStatus::Http(_) => "http",
            ProbeStatus::Unreachable => "unreachable",
            ProbeStatus::Transport => "transport",
            ProbeStatus::BodyRead => "body_read",
            ProbeStatus::Cancelled => "cancelled",
            ProbeStatus::Empty => "empty",
        }
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeStatus::Http(code) => write!(f, "{}", code),
            other => write!(f, "{} ({})", other.code(), other.outcome()),
        }
    }
}

/// Result of probing one endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeResult {
    pub status: ProbeStatus,
    pub body: String,
    /// Decoded payload for `application/json` responses
    pub json: Option<serde_json::Value>,
    /// Set when no usable response was obtained
    pub failed: bool,
}

impl ProbeResult {
    fn sentinel(status: ProbeStatus, body: String) -> Self {
        Self {
            status,
            body,
            json: None,
            failed: true,
        }
    }

    pub fn code(&self) -> u16 {
        self.status.code()
    }

    /// Decode the JSON payload into an application schema
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ProbeError> {
        let value = self
            .json
            .as_ref()
            .ok_or_else(|| ProbeError::Decode("response is not JSON".to_string()))?;
        serde_json::from_value(value.clone()).map_err(|e| ProbeError::Decode(e.to_string()))
    }
}

/// Reachability and content probe
#[derive(Clone)]
pub struct RemoteProbe {
    fetch: Arc<dyn HttpFetch>,
    dial_timeout: Duration,
    metrics: SweeperMetrics,
}

impl RemoteProbe {
    pub fn new(fetch: Arc<dyn HttpFetch>) -> Self {
        Self {
            fetch,
            dial_timeout: DIAL_TIMEOUT,
            metrics: SweeperMetrics::new(),
        }
    }

    /// Probe backed by `reqwest` with the fixed HTTP timeout
    pub fn with_reqwest() -> Result<Self, ProbeError> {
        Ok(Self::new(Arc::new(ReqwestFetch::new(HTTP_TIMEOUT)?)))
    }

    /// GET `http://host[:port]path`
    ///
    /// The port is dialled first (80 when `port` is `None`); the HTTP request
    /// is only made if the dial succeeds.
    pub async fn probe(
        &self,
        host: &str,
        port: Option<u16>,
        path: &str,
        cancel: &CancellationToken,
    ) -> ProbeResult {
        let started = Instant::now();
        let result = self.run(host, port, path, cancel).await;
        self.metrics
            .observe_probe(result.status.outcome(), started.elapsed());
        result
    }

    async fn run(
        &self,
        host: &str,
        port: Option<u16>,
        path: &str,
        cancel: &CancellationToken,
    ) -> ProbeResult {
        let dial_port = port.unwrap_or(DEFAULT_HTTP_PORT);

        let reachable = tokio::select! {
            biased;
            _ = cancel.cancelled() => return ProbeResult::sentinel(ProbeStatus::Cancelled, String::new()),
            reachable = self.dial(host, dial_port) => reachable,
        };
        if !reachable {
            return ProbeResult::sentinel(ProbeStatus::Unreachable, String::new());
        }

        let url = match probe_url(host, port, path) {
            Ok(url) => url,
            Err(e) => {
                error!(host, path, error = %e, "Cannot build probe URL");
                return ProbeResult::sentinel(ProbeStatus::Transport, String::new());
            }
        };

        debug!(url = %url, "Making HTTP request");
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return ProbeResult::sentinel(ProbeStatus::Cancelled, String::new()),
            response = self.fetch.get(&url) => response,
        };

        let response = match response {
            Ok(response) => response,
            Err(ProbeError::BodyRead { status, reason }) => {
                error!(url = %url, status, reason = %reason, "Error reading response body");
                return ProbeResult::sentinel(ProbeStatus::BodyRead, String::new());
            }
            Err(e) => {
                error!(url = %url, error = %e, "Error fetching URL");
                return ProbeResult::sentinel(ProbeStatus::Transport, String::new());
            }
        };
        debug!(url = %url, status = response.status, "HTTP response");

        if response.body.is_empty() {
            debug!(url = %url, "HTTP request returned empty response");
            return ProbeResult::sentinel(ProbeStatus::Empty, response.body);
        }

        let json = if response.is_json() {
            match serde_json::from_str::<serde_json::Value>(&response.body) {
                Ok(value) => Some(value),
                Err(e) => {
                    debug!(url = %url, error = %e, "Response claims JSON but does not parse");
                    None
                }
            }
        } else {
            None
        };

        ProbeResult {
            status: ProbeStatus::Http(response.status),
            body: response.body,
            json,
            failed: false,
        }
    }

    async fn dial(&self, host: &str, port: u16) -> bool {
        match tokio::time::timeout(self.dial_timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(_stream)) => {
                debug!(host, port, "TCP port is open");
                true
            }
            Ok(Err(e)) => {
                debug!(host, port, error = %e, "Error making TCP connection");
                false
            }
            Err(_) => {
                debug!(host, port, "TCP connection timed out");
                false
            }
        }
    }
}

fn probe_url(host: &str, port: Option<u16>, path: &str) -> Result<Url, url::ParseError> {
    let host = match host.parse::<IpAddr>() {
        Ok(IpAddr::V6(v6)) => format!("[{}]", v6),
        _ => host.to_string(),
    };
    let authority = match port {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    };
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };
    Url::parse(&format!("http://{}{}", authority, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels_outside_http_range() {
        for status in [
            ProbeStatus::Unreachable,
            ProbeStatus::Transport,
            ProbeStatus::BodyRead,
            ProbeStatus::Cancelled,
            ProbeStatus::Empty,
        ] {
            assert!(status.code() >= 900);
            assert!(status.is_sentinel());
        }
        assert_eq!(ProbeStatus::Unreachable.code(), 999);
        assert_eq!(ProbeStatus::Empty.code(), 995);
        assert!(!ProbeStatus::Http(404).is_sentinel());
    }

    #[test]
    fn test_probe_url() {
        assert_eq!(
            probe_url("10.0.0.1", None, "/api/version").unwrap().as_str(),
            "http://10.0.0.1/api/version"
        );
        assert_eq!(
            probe_url("10.0.0.1", Some(9100), "health").unwrap().as_str(),
            "http://10.0.0.1:9100/health"
        );
        assert_eq!(
            probe_url("::1", Some(8080), "/").unwrap().as_str(),
            "http://[::1]:8080/"
        );
    }

    #[test]
    fn test_decode_requires_json() {
        let result = ProbeResult {
            status: ProbeStatus::Http(200),
            body: "hello".into(),
            json: None,
            failed: false,
        };
        assert!(matches!(
            result.decode::<ServiceVersion>(),
            Err(ProbeError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_schema() {
        let result = ProbeResult {
            status: ProbeStatus::Http(200),
            body: r#"{"version":"2021.021.0"}"#.into(),
            json: Some(serde_json::json!({"version": "2021.021.0"})),
            failed: false,
        };
        let version: ServiceVersion = result.decode().unwrap();
        assert_eq!(version.version, "2021.021.0");
    }
}
