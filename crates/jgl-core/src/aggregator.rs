//! Combined download counts for every tracked package.

use crate::error::{MetricsError, Result};
use crate::metrics::MetricsCache;
use crate::sources::MetricSource;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// A package whose downloads are reported, and the name it is reported under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedPackage {
    pub source: String,
    pub package: String,
    pub name: String,
}

impl TrackedPackage {
    pub fn new(source: MetricSource, package: impl Into<String>) -> Self {
        let package = package.into();
        Self {
            source: source.as_str().to_string(),
            name: package.clone(),
            package,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Packages reported when nothing else is configured: one per source.
    pub fn defaults() -> Vec<TrackedPackage> {
        vec![
            TrackedPackage::new(MetricSource::PythonPackageIndex, "jglbot"),
            TrackedPackage::new(MetricSource::NpmRegistry, "jglbot-js"),
            TrackedPackage::new(MetricSource::GithubTraffic, "GinRateLimit"),
        ]
    }

    pub fn matches(&self, source: MetricSource, package: &str) -> bool {
        self.source == source.as_str() && self.package == package
    }
}

/// Parses `<source>:<package>[=<name>]`.
impl FromStr for TrackedPackage {
    type Err = MetricsError;

    fn from_str(s: &str) -> Result<Self> {
        let (spec, name) = match s.split_once('=') {
            Some((spec, name)) => (spec, Some(name.trim())),
            None => (s, None),
        };
        let (source, package) = spec.split_once(':').ok_or_else(|| MetricsError::Config {
            message: format!("expected <source>:<package>[=<name>], got '{}'", s),
        })?;

        let source: MetricSource = source.trim().parse()?;
        let package = package.trim();
        if package.is_empty() || name.is_some_and(str::is_empty) {
            return Err(MetricsError::Config {
                message: format!("empty package or name in '{}'", s),
            });
        }
        source.check_package(package)?;

        let tracked = TrackedPackage::new(source, package);
        Ok(match name {
            Some(name) => tracked.named(name),
            None => tracked,
        })
    }
}

impl fmt::Display for TrackedPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}={}", self.source, self.package, self.name)
    }
}

/// Looks up every tracked package through the metrics cache.
pub struct Aggregator {
    cache: Arc<MetricsCache>,
    packages: Vec<TrackedPackage>,
}

impl Aggregator {
    pub fn new(cache: Arc<MetricsCache>, packages: Vec<TrackedPackage>) -> Self {
        Self { cache, packages }
    }

    pub fn packages(&self) -> &[TrackedPackage] {
        &self.packages
    }

    /// Whether `package` on `source` is one of the reported packages.
    pub fn is_tracked(&self, source: MetricSource, package: &str) -> bool {
        self.packages.iter().any(|tracked| tracked.matches(source, package))
    }

    /// Map of reported name to count (or "Not Found").
    ///
    /// Lookups run concurrently; a failing source only affects its own entry.
    pub async fn get_all_counts(&self) -> BTreeMap<String, String> {
        let lookups = self.packages.iter().map(|tracked| async move {
            let value = self.cache.get_count(&tracked.source, &tracked.package).await;
            (tracked.name.clone(), value)
        });

        join_all(lookups).await.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::tests::StubFetcher;
    use crate::store::TtlStore;

    fn aggregator(stub: Arc<StubFetcher>, packages: Vec<TrackedPackage>) -> Aggregator {
        let cache = MetricsCache::new(Arc::new(TtlStore::new()), stub);
        Aggregator::new(Arc::new(cache), packages)
    }

    #[test]
    fn test_parse_tracked_package() {
        let tracked: TrackedPackage = "npm-registry:left-pad=Left Pad".parse().unwrap();
        assert_eq!(tracked.source, "npm-registry");
        assert_eq!(tracked.package, "left-pad");
        assert_eq!(tracked.name, "Left Pad");

        let tracked: TrackedPackage = "python-package-index:jglbot".parse().unwrap();
        assert_eq!(tracked.name, "jglbot");
        assert_eq!(tracked.to_string(), "python-package-index:jglbot=jglbot");
    }

    #[test]
    fn test_parse_tracked_package_errors() {
        assert!("left-pad".parse::<TrackedPackage>().is_err());
        assert!(matches!(
            "crates-io:serde".parse::<TrackedPackage>(),
            Err(MetricsError::UnknownSource(_))
        ));
        assert!("npm-registry:".parse::<TrackedPackage>().is_err());
        assert!("npm-registry:left-pad=".parse::<TrackedPackage>().is_err());
        assert!("github-traffic:../other/private".parse::<TrackedPackage>().is_err());
        assert!("python-package-index:a/b".parse::<TrackedPackage>().is_err());

        let scoped: TrackedPackage = "npm-registry:@types/node".parse().unwrap();
        assert_eq!(scoped.package, "@types/node");
    }

    #[test]
    fn test_is_tracked() {
        let agg = aggregator(
            Arc::new(StubFetcher::default()),
            vec![TrackedPackage::new(MetricSource::NpmRegistry, "left-pad")],
        );
        assert!(agg.is_tracked(MetricSource::NpmRegistry, "left-pad"));
        assert!(!agg.is_tracked(MetricSource::PythonPackageIndex, "left-pad"));
        assert!(!agg.is_tracked(MetricSource::NpmRegistry, "junk"));
    }

    #[tokio::test]
    async fn test_one_failure_does_not_abort_aggregate() {
        let stub = Arc::new(StubFetcher::default().with("jglbot", 42));
        let agg = aggregator(
            stub.clone(),
            vec![
                TrackedPackage::new(MetricSource::PythonPackageIndex, "jglbot").named("JGLBot"),
                TrackedPackage::new(MetricSource::GithubTraffic, "GinRateLimit"),
            ],
        );

        let counts = agg.get_all_counts().await;
        assert_eq!(counts.len(), 2);
        assert_eq!(counts["JGLBot"], "42");
        assert_eq!(counts["GinRateLimit"], "Not Found");
        assert_eq!(stub.calls(), 2);
    }

    #[tokio::test]
    async fn test_second_aggregate_served_from_cache() {
        let stub = Arc::new(StubFetcher::default().with("jglbot", 1).with("left-pad", 2));
        let agg = aggregator(
            stub.clone(),
            vec![
                TrackedPackage::new(MetricSource::PythonPackageIndex, "jglbot"),
                TrackedPackage::new(MetricSource::NpmRegistry, "left-pad"),
            ],
        );

        let first = agg.get_all_counts().await;
        let second = agg.get_all_counts().await;
        assert_eq!(first, second);
        assert_eq!(stub.calls(), 2);
    }

    #[tokio::test]
    async fn test_empty_aggregate() {
        let agg = aggregator(Arc::new(StubFetcher::default()), Vec::new());
        assert!(agg.get_all_counts().await.is_empty());
    }

    #[test]
    fn test_defaults() {
        let defaults = TrackedPackage::defaults();
        for source in MetricSource::ALL {
            assert!(
                defaults.iter().any(|t| t.source == source.as_str()),
                "no default package for {}",
                source
            );
        }
        for tracked in &defaults {
            let source = MetricSource::from_name(&tracked.source).unwrap();
            assert!(source.check_package(&tracked.package).is_ok());
        }
    }
}
