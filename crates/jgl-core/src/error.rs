//! Error types for the download counters.
//!
//! The four fetch failure kinds (transport, upstream status, decode, parse)
//! never reach end users; [`crate::MetricsCache`] collapses them into the
//! "Not Found" sentinel. The remaining variants cover configuration and
//! lookup problems surfaced to the server.

use std::time::Duration;
use thiserror::Error;

/// Main error type for the metrics library.
#[derive(Debug, Error)]
pub enum MetricsError {
    // Fetch errors
    #[error("Network error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    #[error("Upstream {url} returned status {status}")]
    UpstreamStatus { url: String, status: u16 },

    #[error("Malformed JSON from upstream: {message}")]
    Decode {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("Field '{field}' {message}")]
    Parse { field: &'static str, message: String },

    // Lookup and configuration errors
    #[error("Unknown metric source: {0}")]
    UnknownSource(String),

    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias for metrics operations.
pub type Result<T> = std::result::Result<T, MetricsError>;

impl From<reqwest::Error> for MetricsError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            MetricsError::Timeout(crate::config::NetworkConfig::REQUEST_TIMEOUT)
        } else if err.is_decode() {
            MetricsError::Decode {
                message: err.to_string(),
                source: None,
            }
        } else {
            MetricsError::Transport {
                message: err.to_string(),
                source: Some(err),
            }
        }
    }
}

impl From<serde_json::Error> for MetricsError {
    fn from(err: serde_json::Error) -> Self {
        MetricsError::Decode {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl MetricsError {
    /// Whether this error came from talking to an upstream and should be
    /// reported as the "Not Found" sentinel.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            MetricsError::Transport { .. }
                | MetricsError::Timeout(_)
                | MetricsError::UpstreamStatus { .. }
                | MetricsError::Decode { .. }
                | MetricsError::Parse { .. }
        )
    }
}
