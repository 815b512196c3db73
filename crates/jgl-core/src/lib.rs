//! JGL Metrics - cached download counters for externally hosted packages.
//!
//! Counts come from third-party APIs (pepy.tech for PyPI, the npm registry,
//! GitHub traffic) that are slow and rate limited. This crate fetches them on
//! demand, caches successes for a day and failures for ten minutes, and
//! collapses every failure into the "Not Found" sentinel.
//!
//! # Example
//!
//! ```rust,ignore
//! use jgl_metrics::{Aggregator, HttpFetcher, MetricsCache, SourceConfig, TrackedPackage, TtlStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> jgl_metrics::Result<()> {
//!     let fetcher = HttpFetcher::new(SourceConfig::new(std::env::var("GH_TOKEN").ok()))?;
//!     let cache = Arc::new(MetricsCache::new(Arc::new(TtlStore::new()), Arc::new(fetcher)));
//!
//!     println!("{}", cache.get_count("npm-registry", "left-pad").await);
//!
//!     let aggregator = Aggregator::new(cache, TrackedPackage::defaults());
//!     println!("{:?}", aggregator.get_all_counts().await);
//!     Ok(())
//! }
//! ```

pub mod aggregator;
pub mod config;
pub mod error;
pub mod metrics;
pub mod network;
pub mod sources;
pub mod store;

pub use aggregator::{Aggregator, TrackedPackage};
pub use config::{CacheConfig, NetworkConfig, SourceConfig};
pub use error::{MetricsError, Result};
pub use metrics::MetricsCache;
pub use network::{CountFetcher, DynCountFetcher, HttpClient, HttpFetcher};
pub use sources::{MetricSource, SourceDescriptor, SourceRequest};
pub use store::{CacheEntry, TtlStore};
