//! Fetching raw counts from upstream APIs.

use crate::config::SourceConfig;
use crate::error::Result;
use crate::network::client::HttpClient;
use crate::sources::MetricSource;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

/// Fetches the current count for one package from one source.
///
/// Implementations perform exactly one upstream request per call and never
/// retry; caching and failure handling belong to [`crate::MetricsCache`].
#[async_trait]
pub trait CountFetcher: Send + Sync {
    async fn fetch(&self, source: MetricSource, package: &str) -> Result<u64>;
}

/// Shared, type-erased fetcher.
pub type DynCountFetcher = Arc<dyn CountFetcher>;

/// Fetcher backed by the real upstream HTTP APIs.
pub struct HttpFetcher {
    http: HttpClient,
    config: SourceConfig,
}

impl HttpFetcher {
    pub fn new(config: SourceConfig) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new()?,
            config,
        })
    }

    pub fn with_client(http: HttpClient, config: SourceConfig) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }
}

#[async_trait]
impl CountFetcher for HttpFetcher {
    async fn fetch(&self, source: MetricSource, package: &str) -> Result<u64> {
        let today = Utc::now().date_naive();
        let request = source.build_request(package, &self.config, today)?;
        debug!("Fetching {} count for {} from {}", source, package, request.url);

        let body = self.http.get_body(&request.url, &request.headers).await?;
        source.parse(&body)
    }
}
