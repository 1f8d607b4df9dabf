//! Application payloads served by probed instances

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body of the license endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseResponse {
    pub license: LicenseStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseStatus {
    pub healthy: bool,
    #[serde(default)]
    pub message: String,
    /// End of the license term
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Body of the service version endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceVersion {
    pub version: String,
    #[serde(default)]
    pub git_describe: Option<String>,
    #[serde(default)]
    pub git_commit_id: Option<String>,
    #[serde(default)]
    pub git_commit_short: Option<String>,
    #[serde(default)]
    pub git_commit_time: Option<String>,
    #[serde(default)]
    pub build_time: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_license_decode() {
        let body = r#"{"license": {"healthy": true, "message": "ok", "timestamp": "2030-01-01T00:00:00Z"}}"#;
        let decoded: LicenseResponse = serde_json::from_str(body).unwrap();
        assert!(decoded.license.healthy);
        assert_eq!(decoded.license.message, "ok");
        assert!(decoded.license.timestamp.is_some());
    }

    #[test]
    fn test_version_decode_with_build_info() {
        let body = r#"{"version": "2021.021.0", "gitCommitShort": "abc123", "buildTime": "2021-10-01 10:00:00 AM UTC"}"#;
        let decoded: ServiceVersion = serde_json::from_str(body).unwrap();
        assert_eq!(decoded.version, "2021.021.0");
        assert_eq!(decoded.git_commit_short.as_deref(), Some("abc123"));
    }
}
