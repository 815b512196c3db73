//! Upstream metric sources.
//!
//! Each source knows how to build the request for one upstream API and how
//! to pull a single integer count out of its JSON response:
//!
//! | Source                 | Endpoint                                               | Field             |
//! |------------------------|--------------------------------------------------------|-------------------|
//! | `python-package-index` | `{pypi}/api/projects/{package}`                        | `total_downloads` |
//! | `npm-registry`         | `{npm}/downloads/point/2020-01-01:{today}/{package}`    | `downloads`       |
//! | `github-traffic`       | `{github}/repos/{owner}/{package}/traffic/clones?per=week` | `uniques` |

use crate::config::{NetworkConfig, SourceConfig};
use crate::error::{MetricsError, Result};
use chrono::NaiveDate;
use reqwest::Url;
use serde_json::Value;
use std::fmt;

/// The closed set of supported metric sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricSource {
    /// PyPI download totals via pepy.tech.
    PythonPackageIndex,
    /// npm registry download counts over a date window.
    NpmRegistry,
    /// GitHub repository clone traffic. Requires a token.
    GithubTraffic,
}

/// Static description of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceDescriptor {
    pub name: &'static str,
    pub endpoint_template: &'static str,
    pub auth_required: bool,
    /// JSON field holding the count.
    pub count_field: &'static str,
}

/// A fully built upstream request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl MetricSource {
    pub const ALL: [MetricSource; 3] = [
        MetricSource::PythonPackageIndex,
        MetricSource::NpmRegistry,
        MetricSource::GithubTraffic,
    ];

    pub fn descriptor(&self) -> SourceDescriptor {
        match self {
            MetricSource::PythonPackageIndex => SourceDescriptor {
                name: "python-package-index",
                endpoint_template: "{base}/api/projects/{package}",
                auth_required: false,
                count_field: "total_downloads",
            },
            MetricSource::NpmRegistry => SourceDescriptor {
                name: "npm-registry",
                endpoint_template: "{base}/downloads/point/{start}:{today}/{package}",
                auth_required: false,
                count_field: "downloads",
            },
            MetricSource::GithubTraffic => SourceDescriptor {
                name: "github-traffic",
                endpoint_template: "{base}/repos/{owner}/{package}/traffic/clones?per=week",
                auth_required: true,
                count_field: "uniques",
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.descriptor().name
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|source| source.as_str().eq_ignore_ascii_case(name))
    }

    /// Reject identifiers that could escape their path segment.
    ///
    /// Only npm accepts a slash, and only in the `@scope/name` form.
    pub fn check_package(&self, package: &str) -> Result<()> {
        let segments: Vec<&str> = match (self, package.strip_prefix('@')) {
            (MetricSource::NpmRegistry, Some(scoped)) => match scoped.split_once('/') {
                Some((scope, name)) => vec![scope, name],
                None => vec![package],
            },
            _ => vec![package],
        };

        let valid = segments.iter().all(|segment| {
            !segment.is_empty()
                && *segment != "."
                && *segment != ".."
                && !segment.contains('/')
                && !segment.chars().any(char::is_control)
        });
        if valid {
            Ok(())
        } else {
            Err(MetricsError::Config {
                message: format!("invalid {} package identifier '{}'", self, package),
            })
        }
    }

    /// Build the upstream request for `package`.
    ///
    /// The package is percent-encoded as path segments, so it can never
    /// change the path or query sent upstream. `today` closes the npm
    /// download window and is ignored by the other sources. A missing
    /// GitHub token sends no credentials; GitHub then rejects the request
    /// like any other failed fetch.
    pub fn build_request(
        &self,
        package: &str,
        config: &SourceConfig,
        today: NaiveDate,
    ) -> Result<SourceRequest> {
        self.check_package(package)?;

        let mut headers = Vec::new();
        let package_segments: Vec<&str> = package.split('/').collect();
        let url = match self {
            MetricSource::PythonPackageIndex => {
                let mut url = base_url(&config.pypi_base)?;
                push_segments(&mut url, ["api", "projects", package])?;
                url
            }
            MetricSource::NpmRegistry => {
                let window = format!(
                    "{}:{}",
                    NetworkConfig::npm_epoch_start().format("%Y-%m-%d"),
                    today.format("%Y-%m-%d")
                );
                let mut url = base_url(&config.npm_base)?;
                push_segments(&mut url, ["downloads", "point", window.as_str()])?;
                push_segments(&mut url, package_segments)?;
                url
            }
            MetricSource::GithubTraffic => {
                headers.push((
                    "Accept".to_string(),
                    "application/vnd.github+json".to_string(),
                ));
                if let Some(token) = &config.github_token {
                    headers.push(("Authorization".to_string(), format!("token {}", token)));
                }
                let mut url = base_url(&config.github_base)?;
                push_segments(
                    &mut url,
                    [
                        "repos",
                        config.github_owner.as_str(),
                        package,
                        "traffic",
                        "clones",
                    ],
                )?;
                url.set_query(Some("per=week"));
                url
            }
        };

        Ok(SourceRequest {
            url: url.to_string(),
            headers,
        })
    }

    /// Extract the count from a raw response body.
    pub fn parse(&self, body: &[u8]) -> Result<u64> {
        let json: Value = serde_json::from_slice(body)?;
        let field = self.descriptor().count_field;
        let value = json.get(field).ok_or(MetricsError::Parse {
            field,
            message: "is missing".to_string(),
        })?;
        coerce_count(value).ok_or_else(|| MetricsError::Parse {
            field,
            message: format!("is not a non-negative number: {}", value),
        })
    }
}

fn base_url(base: &str) -> Result<Url> {
    Url::parse(base).map_err(|e| MetricsError::Config {
        message: format!("invalid upstream base URL '{}': {}", base, e),
    })
}

fn push_segments<'a>(url: &mut Url, segments: impl IntoIterator<Item = &'a str>) -> Result<()> {
    let base = url.to_string();
    let mut path = url.path_segments_mut().map_err(|_| MetricsError::Config {
        message: format!("upstream base URL '{}' cannot carry a path", base),
    })?;
    path.pop_if_empty();
    for segment in segments {
        path.push(segment);
    }
    Ok(())
}

/// Upstreams report counts as JSON numbers, sometimes with a fractional part.
fn coerce_count(value: &Value) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    value
        .as_f64()
        .filter(|f| f.is_finite() && *f >= 0.0 && *f <= u64::MAX as f64)
        .map(|f| f as u64)
}

impl fmt::Display for MetricSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MetricSource {
    type Err = MetricsError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s).ok_or_else(|| MetricsError::UnknownSource(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 7).unwrap()
    }

    #[test]
    fn test_name_roundtrip() {
        for source in MetricSource::ALL {
            assert_eq!(MetricSource::from_name(source.as_str()), Some(source));
        }
        assert_eq!(
            MetricSource::from_name("NPM-Registry"),
            Some(MetricSource::NpmRegistry)
        );
        assert!(MetricSource::from_name("crates-io").is_none());
        assert!("crates-io".parse::<MetricSource>().is_err());
    }

    #[test]
    fn test_only_github_requires_auth() {
        let auth: Vec<_> = MetricSource::ALL
            .iter()
            .filter(|s| s.descriptor().auth_required)
            .collect();
        assert_eq!(auth, vec![&MetricSource::GithubTraffic]);
    }

    #[test]
    fn test_pypi_request() {
        let request = MetricSource::PythonPackageIndex
            .build_request("jglbot", &SourceConfig::default(), today())
            .unwrap();
        assert_eq!(request.url, "https://api.pepy.tech/api/projects/jglbot");
        assert!(request.headers.is_empty());
    }

    #[test]
    fn test_npm_request_window_ends_today() {
        let request = MetricSource::NpmRegistry
            .build_request("left-pad", &SourceConfig::default(), today())
            .unwrap();
        assert_eq!(
            request.url,
            "https://api.npmjs.org/downloads/point/2020-01-01:2024-03-07/left-pad"
        );
    }

    #[test]
    fn test_github_request_with_token() {
        let config = SourceConfig::new(Some("secret".into()));
        let request = MetricSource::GithubTraffic
            .build_request("GinRateLimit", &config, today())
            .unwrap();
        assert_eq!(
            request.url,
            "https://api.github.com/repos/Nebulizer1213/GinRateLimit/traffic/clones?per=week"
        );
        assert!(request
            .headers
            .contains(&("Authorization".to_string(), "token secret".to_string())));
    }

    #[test]
    fn test_github_request_without_token() {
        let request = MetricSource::GithubTraffic
            .build_request("GinRateLimit", &SourceConfig::default(), today())
            .unwrap();
        assert!(request.headers.iter().all(|(k, _)| k != "Authorization"));
    }

    #[test]
    fn test_scoped_npm_package() {
        let request = MetricSource::NpmRegistry
            .build_request("@types/node", &SourceConfig::default(), today())
            .unwrap();
        assert_eq!(
            request.url,
            "https://api.npmjs.org/downloads/point/2020-01-01:2024-03-07/@types/node"
        );
    }

    #[test]
    fn test_path_traversal_rejected() {
        let config = SourceConfig::new(Some("secret".into()));
        for package in ["../../otherorg/private", "..", ".", "", "a/b", "@scope/../x"] {
            for source in MetricSource::ALL {
                let result = source.build_request(package, &config, today());
                assert!(
                    matches!(result, Err(MetricsError::Config { .. })),
                    "{} accepted {:?}",
                    source,
                    package
                );
            }
        }
    }

    #[test]
    fn test_query_characters_stay_in_path() {
        let request = MetricSource::PythonPackageIndex
            .build_request("x?y=1#", &SourceConfig::default(), today())
            .unwrap();
        let url = Url::parse(&request.url).unwrap();
        assert_eq!(url.path(), "/api/projects/x%3Fy=1%23");
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);

        let config = SourceConfig::new(Some("secret".into()));
        let request = MetricSource::GithubTraffic
            .build_request("repo?per=day#", &config, today())
            .unwrap();
        let url = Url::parse(&request.url).unwrap();
        assert_eq!(
            url.path(),
            "/repos/Nebulizer1213/repo%3Fper=day%23/traffic/clones"
        );
        assert_eq!(url.query(), Some("per=week"));
    }

    #[test]
    fn test_base_url_with_path_prefix() {
        let config = SourceConfig::default().with_base_url("http://127.0.0.1:9000/mock");
        let request = MetricSource::PythonPackageIndex
            .build_request("jglbot", &config, today())
            .unwrap();
        assert_eq!(request.url, "http://127.0.0.1:9000/mock/api/projects/jglbot");
    }

    #[test]
    fn test_parse_fields() {
        assert_eq!(
            MetricSource::PythonPackageIndex
                .parse(br#"{"id":"jglbot","total_downloads":1234}"#)
                .unwrap(),
            1234
        );
        assert_eq!(
            MetricSource::NpmRegistry
                .parse(br#"{"downloads":56,"start":"2020-01-01","end":"2024-03-07"}"#)
                .unwrap(),
            56
        );
        assert_eq!(
            MetricSource::GithubTraffic
                .parse(br#"{"count":40,"uniques":7,"clones":[]}"#)
                .unwrap(),
            7
        );
    }

    #[test]
    fn test_parse_float_is_truncated() {
        assert_eq!(
            MetricSource::PythonPackageIndex
                .parse(br#"{"total_downloads":99.0}"#)
                .unwrap(),
            99
        );
    }

    #[test]
    fn test_parse_missing_field() {
        let err = MetricSource::GithubTraffic
            .parse(br#"{"message":"Bad credentials"}"#)
            .unwrap_err();
        assert!(matches!(err, MetricsError::Parse { field: "uniques", .. }));
    }

    #[test]
    fn test_parse_non_numeric_field() {
        let err = MetricSource::NpmRegistry
            .parse(br#"{"downloads":"lots"}"#)
            .unwrap_err();
        assert!(matches!(err, MetricsError::Parse { .. }));

        let err = MetricSource::NpmRegistry
            .parse(br#"{"downloads":-3}"#)
            .unwrap_err();
        assert!(matches!(err, MetricsError::Parse { .. }));
    }

    #[test]
    fn test_parse_malformed_json() {
        let err = MetricSource::PythonPackageIndex
            .parse(b"<html>502</html>")
            .unwrap_err();
        assert!(matches!(err, MetricsError::Decode { .. }));
    }
}
