//! HTTP client wrapper with a bounded timeout.
//!
//! Every request is capped by the client-wide timeout so one slow upstream
//! cannot tie up request handling. Non-success statuses and body read
//! failures are reported as errors instead of being passed to the caller.

use crate::config::NetworkConfig;
use crate::error::{MetricsError, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// HTTP client for upstream metric APIs.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    timeout: Duration,
}

impl HttpClient {
    /// Create a client with the default five second timeout.
    pub fn new() -> Result<Self> {
        Self::with_timeout(NetworkConfig::REQUEST_TIMEOUT)
    }

    /// Create a client with a custom timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| MetricsError::Config {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// GET `url` with extra headers and return the full body of a 200 response.
    pub async fn get_body(&self, url: &str, headers: &[(String, String)]) -> Result<Vec<u8>> {
        let mut request = self.client.get(url);
        for (key, value) in headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|e| self.classify(url, e))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(MetricsError::UpstreamStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| self.classify(url, e))?;
        debug!("GET {} returned {} bytes", url, body.len());
        Ok(body.to_vec())
    }

    fn classify(&self, url: &str, err: reqwest::Error) -> MetricsError {
        if err.is_timeout() {
            MetricsError::Timeout(self.timeout)
        } else {
            MetricsError::Transport {
                message: format!("GET {} failed: {}", url, err),
                source: Some(err),
            }
        }
    }
}
