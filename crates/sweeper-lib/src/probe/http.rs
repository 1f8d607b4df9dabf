//! HTTP layer behind the remote probe

use crate::error::ProbeError;
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

/// Fixed timeout for a probe GET
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(2);

/// What the probe needs from a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .map(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
            .unwrap_or(false)
    }
}

/// Performs a plain GET
///
/// Transport failures return [`ProbeError::Transport`]; a failure after the
/// status line arrived returns [`ProbeError::BodyRead`].
#[async_trait]
pub trait HttpFetch: Send + Sync {
    async fn get(&self, url: &Url) -> Result<HttpResponse, ProbeError>;
}

/// `reqwest` backed fetcher
#[derive(Debug, Clone)]
pub struct ReqwestFetch {
    client: reqwest::Client,
}

impl ReqwestFetch {
    pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProbeError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpFetch for ReqwestFetch {
    async fn get(&self, url: &Url) -> Result<HttpResponse, ProbeError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ProbeError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.text().await.map_err(|e| ProbeError::BodyRead {
            status,
            reason: e.to_string(),
        })?;

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}
