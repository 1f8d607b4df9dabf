//! Monitoring backend access
//!
//! The idle detector only needs raw sample values for one metric of one
//! instance over a time window. Backends hand them out page by page so the
//! caller can fold each page into a digest and drop it.

use crate::error::MetricError;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Public Cloud Monitoring endpoint
pub const DEFAULT_MONITORING_ENDPOINT: &str = "https://monitoring.googleapis.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One metric series request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricQuery {
    pub project_id: String,
    pub metric_type: String,
    pub instance_name: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl MetricQuery {
    /// Monitoring filter expression selecting the series
    pub fn filter_expression(&self) -> String {
        format!(
            "metric.type = \"{}\" AND metric.label.instance_name = \"{}\"",
            escape_filter_value(&self.metric_type),
            escape_filter_value(&self.instance_name)
        )
    }
}

/// Escape a value for a double-quoted filter string
fn escape_filter_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// A page of raw sample values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SamplePage {
    pub values: Vec<f64>,
    pub next_page_token: Option<String>,
}

/// Source of metric samples
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Fetch one page; `page_token` is `None` for the first page
    async fn fetch_page(
        &self,
        query: &MetricQuery,
        page_token: Option<&str>,
    ) -> Result<SamplePage, MetricError>;
}

/// Cloud Monitoring v3 REST client
#[derive(Debug, Clone)]
pub struct CloudMonitoringSource {
    client: reqwest::Client,
    endpoint: String,
    access_token: Option<String>,
}

impl CloudMonitoringSource {
    pub fn new(endpoint: impl Into<String>, access_token: Option<String>) -> Result<Self, MetricError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| MetricError::Request(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            access_token,
        })
    }

    fn series_url(&self, project_id: &str) -> String {
        format!("{}/v3/projects/{}/timeSeries", self.endpoint, project_id)
    }
}

#[async_trait]
impl MetricSource for CloudMonitoringSource {
    async fn fetch_page(
        &self,
        query: &MetricQuery,
        page_token: Option<&str>,
    ) -> Result<SamplePage, MetricError> {
        let filter = query.filter_expression();
        let start = query.start.to_rfc3339_opts(SecondsFormat::Secs, true);
        let end = query.end.to_rfc3339_opts(SecondsFormat::Secs, true);

        let mut params: Vec<(&str, &str)> = vec![
            ("filter", filter.as_str()),
            ("interval.startTime", start.as_str()),
            ("interval.endTime", end.as_str()),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }

        let mut request = self.client.get(self.series_url(&query.project_id)).query(&params);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        debug!(
            metric = %query.metric_type,
            instance = %query.instance_name,
            page_token = ?page_token,
            "Querying monitoring backend"
        );

        let response = request
            .send()
            .await
            .map_err(|e| MetricError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MetricError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: TimeSeriesResponse = response
            .json()
            .await
            .map_err(|e| MetricError::Response(e.to_string()))?;

        payload.into_page()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimeSeriesResponse {
    #[serde(default)]
    time_series: Vec<TimeSeries>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimeSeries {
    #[serde(default)]
    value_type: Option<String>,
    #[serde(default)]
    points: Vec<Point>,
}

#[derive(Debug, Deserialize)]
struct Point {
    value: TypedValue,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TypedValue {
    #[serde(default)]
    double_value: Option<f64>,
    // int64 values are JSON strings in the REST encoding
    #[serde(default)]
    int64_value: Option<String>,
}

impl TimeSeriesResponse {
    fn into_page(self) -> Result<SamplePage, MetricError> {
        let mut values = Vec::new();
        for series in self.time_series {
            let int64 = series.value_type.as_deref() == Some("INT64");
            for point in series.points {
                values.push(point.value.as_f64(int64)?);
            }
        }

        Ok(SamplePage {
            values,
            next_page_token: self.next_page_token.filter(|t| !t.is_empty()),
        })
    }
}

impl TypedValue {
    fn as_f64(&self, int64: bool) -> Result<f64, MetricError> {
        match (&self.int64_value, self.double_value) {
            (Some(raw), _) if int64 || self.double_value.is_none() => raw
                .parse::<i64>()
                .map(|v| v as f64)
                .map_err(|e| MetricError::Response(format!("bad int64 value {raw:?}: {e}"))),
            (_, Some(value)) => Ok(value),
            _ => Err(MetricError::Response("point without numeric value".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_expression() {
        let query = MetricQuery {
            project_id: "proj".into(),
            metric_type: "compute.googleapis.com/instance/cpu/utilization".into(),
            instance_name: "vm-1".into(),
            start: Utc::now(),
            end: Utc::now(),
        };
        assert_eq!(
            query.filter_expression(),
            "metric.type = \"compute.googleapis.com/instance/cpu/utilization\" AND metric.label.instance_name = \"vm-1\""
        );
    }

    #[test]
    fn test_filter_expression_escapes_quotes() {
        let query = MetricQuery {
            project_id: "proj".into(),
            metric_type: "cpu".into(),
            instance_name: r#"vm "a"\b"#.into(),
            start: Utc::now(),
            end: Utc::now(),
        };
        assert_eq!(
            query.filter_expression(),
            r#"metric.type = "cpu" AND metric.label.instance_name = "vm \"a\"\\b""#
        );
    }

    #[test]
    fn test_decode_double_and_int64_points() {
        let body = r#"{
            "timeSeries": [
                {"valueType": "DOUBLE", "points": [
                    {"interval": {"endTime": "2024-01-01T00:00:00Z"}, "value": {"doubleValue": 0.25}},
                    {"interval": {"endTime": "2024-01-01T00:01:00Z"}, "value": {"doubleValue": 0.5}}
                ]},
                {"valueType": "INT64", "points": [
                    {"interval": {"endTime": "2024-01-01T00:00:00Z"}, "value": {"int64Value": "1200"}}
                ]}
            ],
            "nextPageToken": "abc"
        }"#;

        let response: TimeSeriesResponse = serde_json::from_str(body).unwrap();
        let page = response.into_page().unwrap();

        assert_eq!(page.values, vec![0.25, 0.5, 1200.0]);
        assert_eq!(page.next_page_token.as_deref(), Some("abc"));
    }

    #[test]
    fn test_empty_response_has_no_next_page() {
        let response: TimeSeriesResponse =
            serde_json::from_str(r#"{"nextPageToken": ""}"#).unwrap();
        let page = response.into_page().unwrap();
        assert!(page.values.is_empty());
        assert_eq!(page.next_page_token, None);
    }

    #[test]
    fn test_bad_int64_is_a_response_error() {
        let response: TimeSeriesResponse = serde_json::from_str(
            r#"{"timeSeries": [{"valueType": "INT64", "points": [{"value": {"int64Value": "x"}}]}]}"#,
        )
        .unwrap();
        assert!(matches!(response.into_page(), Err(MetricError::Response(_))));
    }
}
