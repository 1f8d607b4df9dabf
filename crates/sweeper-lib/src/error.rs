//! Error types for the sweeper library

use thiserror::Error;

/// Startup configuration errors
///
/// Returned by the filter document loader and the filter registry. Filters
/// that cannot work without a value fail construction with one of these;
/// per-item problems never do.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A value a requested filter cannot run without is absent
    #[error("missing required setting {name} for filter {filter}")]
    MissingSetting { filter: String, name: String },

    /// A value is present but cannot be used
    #[error("invalid setting {name}: {reason}")]
    InvalidSetting { name: String, reason: String },

    /// Filter name not known to the registry
    #[error("unknown filter: {0}")]
    UnknownFilter(String),

    /// The declarative filter document could not be read or parsed
    #[error("invalid filter document: {0}")]
    Document(String),
}

/// Failures inside the HTTP layer of the remote probe
#[derive(Error, Debug)]
pub enum ProbeError {
    /// Connection refused, DNS failure, timeout, malformed URL
    #[error("transport error: {0}")]
    Transport(String),

    /// Headers arrived but the body could not be read
    #[error("body read error (status {status}): {reason}")]
    BodyRead { status: u16, reason: String },

    /// Body is not the expected JSON schema
    #[error("decode error: {0}")]
    Decode(String),
}

/// Failures talking to the monitoring backend
#[derive(Error, Debug)]
pub enum MetricError {
    #[error("monitoring request failed: {0}")]
    Request(String),

    #[error("monitoring backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected monitoring response: {0}")]
    Response(String),

    #[error("metric query cancelled")]
    Cancelled,
}
