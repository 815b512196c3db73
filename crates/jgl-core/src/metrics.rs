//! Cached download counts.
//!
//! Order of operations for a lookup:
//! 1. Check the store (no network I/O on a hit)
//! 2. On a miss, fetch once from the upstream source
//! 3. Cache the count for a day, or the "Not Found" sentinel for ten minutes

use crate::config::CacheConfig;
use crate::network::DynCountFetcher;
use crate::sources::MetricSource;
use crate::store::TtlStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Read-through cache of upstream download counts.
pub struct MetricsCache {
    store: Arc<TtlStore>,
    fetcher: DynCountFetcher,
    success_ttl: Duration,
    failure_ttl: Duration,
}

impl MetricsCache {
    pub fn new(store: Arc<TtlStore>, fetcher: DynCountFetcher) -> Self {
        Self {
            store,
            fetcher,
            success_ttl: CacheConfig::SUCCESS_TTL,
            failure_ttl: CacheConfig::FAILURE_TTL,
        }
    }

    /// Override the success and failure lifetimes.
    pub fn with_ttls(mut self, success_ttl: Duration, failure_ttl: Duration) -> Self {
        self.success_ttl = success_ttl;
        self.failure_ttl = failure_ttl;
        self
    }

    /// Store key for a (source, package) pair.
    pub fn cache_key(source: MetricSource, package: &str) -> String {
        format!("{}:{}", source.as_str(), package)
    }

    /// Display string for `package` on the source named `source_name`.
    ///
    /// Returns the decimal count, or "Not Found" if the source is unknown or
    /// the upstream could not be queried. Never fails.
    pub async fn get_count(&self, source_name: &str, package: &str) -> String {
        match MetricSource::from_name(source_name) {
            Some(source) => self.count(source, package).await,
            None => {
                warn!("Count requested from unknown source '{}'", source_name);
                CacheConfig::NOT_FOUND.to_string()
            }
        }
    }

    /// Display string for `package` on `source`.
    pub async fn count(&self, source: MetricSource, package: &str) -> String {
        let key = Self::cache_key(source, package);

        if let Some(value) = self.store.get(&key) {
            debug!("Download count cache hit for {}", key);
            return value;
        }

        debug!("Download count cache miss for {}, fetching", key);
        match self.fetcher.fetch(source, package).await {
            Ok(count) => {
                let value = count.to_string();
                info!("Refreshed {} = {}", key, value);
                self.store.set(key, value.clone(), self.success_ttl);
                value
            }
            Err(e) => {
                warn!(
                    "Failed to fetch {}: {} (caching '{}' for {:?})",
                    key,
                    e,
                    CacheConfig::NOT_FOUND,
                    self.failure_ttl
                );
                self.store
                    .set(key, CacheConfig::NOT_FOUND, self.failure_ttl);
                CacheConfig::NOT_FOUND.to_string()
            }
        }
    }

    /// Drop the cached value for a package so the next lookup refetches it.
    pub fn invalidate(&self, source: MetricSource, package: &str) -> bool {
        self.store.remove(&Self::cache_key(source, package))
    }

    pub fn store(&self) -> &Arc<TtlStore> {
        &self.store
    }
}
