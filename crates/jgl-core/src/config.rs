//! Centralized configuration for the download counters.
//!
//! Fixed constants (TTLs, timeouts, upstream endpoints) live here as
//! associated consts. Values that change per deployment are carried by
//! [`SourceConfig`].

use chrono::NaiveDate;
use std::time::Duration;

/// Cache timing.
pub struct CacheConfig;

impl CacheConfig {
    /// Lifetime of a successfully fetched count.
    pub const SUCCESS_TTL: Duration = Duration::from_secs(24 * 60 * 60);
    /// Lifetime of the failure sentinel, so an upstream outage is retried soon.
    pub const FAILURE_TTL: Duration = Duration::from_secs(10 * 60);
    /// Value reported and cached for any fetch or parse failure.
    pub const NOT_FOUND: &'static str = "Not Found";
}

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
    pub const USER_AGENT: &'static str = concat!("jgl-metrics/", env!("CARGO_PKG_VERSION"));
    pub const PYPI_API_BASE: &'static str = "https://api.pepy.tech";
    pub const NPM_API_BASE: &'static str = "https://api.npmjs.org";
    pub const GITHUB_API_BASE: &'static str = "https://api.github.com";
    pub const GITHUB_DEFAULT_OWNER: &'static str = "Nebulizer1213";

    /// First day of the npm download window.
    pub fn npm_epoch_start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or(NaiveDate::MIN)
    }
}

/// Runtime configuration consumed by the source adapters.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Token sent as `Authorization: token <value>` to GitHub.
    pub github_token: Option<String>,
    /// Account owning the GitHub repositories whose traffic is counted.
    pub github_owner: String,
    pub pypi_base: String,
    pub npm_base: String,
    pub github_base: String,
}

impl SourceConfig {
    /// Configuration pointing at the public upstream APIs.
    pub fn new(github_token: Option<String>) -> Self {
        Self {
            github_token: github_token.filter(|t| !t.trim().is_empty()),
            ..Self::default()
        }
    }

    pub fn with_github_owner(mut self, owner: impl Into<String>) -> Self {
        self.github_owner = owner.into();
        self
    }

    /// Point every source at the same base URL. Used to target a local mock upstream.
    pub fn with_base_url(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        self.pypi_base = base.to_string();
        self.npm_base = base.to_string();
        self.github_base = base.to_string();
        self
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            github_token: None,
            github_owner: NetworkConfig::GITHUB_DEFAULT_OWNER.to_string(),
            pypi_base: NetworkConfig::PYPI_API_BASE.to_string(),
            npm_base: NetworkConfig::NPM_API_BASE.to_string(),
            github_base: NetworkConfig::GITHUB_API_BASE.to_string(),
        }
    }
}
