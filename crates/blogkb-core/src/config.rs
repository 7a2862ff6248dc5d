//! Configuration for the content pipeline.
//!
//! Settings are resolved in three layers, each overriding the previous one:
//!
//! 1. **Built-in defaults** (see [`Config::default`])
//! 2. **Config file**: `config.toml` in the platform config directory
//!    (e.g. `~/.config/blogkb/config.toml` on Linux), or an explicit path
//! 3. **Environment variables**: `BLOG_*`
//!
//! None of the layers is required. A missing file or unset variable silently keeps the
//! previous value, and an unparsable variable logs a warning and is ignored.
//!
//! ## Example Configuration File
//!
//! ```toml
//! base_url = "https://jeongil.dev"
//! document_path = "/ko/llms.txt"
//! cache_ttl_minutes = 30
//! http_max_retries = 5
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Field |
//! |----------|-------|
//! | `BLOG_BASE_URL` | `base_url` |
//! | `BLOG_LLMS_PATH` | `document_path` |
//! | `BLOG_CACHE_TTL_MINUTES` | `cache_ttl_minutes` |
//! | `BLOG_HTTP_TIMEOUT` | `http_timeout_seconds` |
//! | `BLOG_HTTP_MAX_RETRIES` | `http_max_retries` |
//! | `BLOG_HTTP_RETRY_DELAY` | `http_retry_base_delay_seconds` |
//! | `BLOG_CIRCUIT_FAILURE_THRESHOLD` | `circuit_failure_threshold` |
//! | `BLOG_CIRCUIT_RESET_TIMEOUT` | `circuit_reset_timeout_seconds` |

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{Error, Result};

/// Runtime configuration for fetching, caching and circuit breaking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Scheme and host of the blog, also used to resolve relative links.
    pub base_url: String,
    /// Path of the llms.txt document below `base_url`.
    pub document_path: String,
    /// How long a parsed corpus is served before it is considered stale.
    pub cache_ttl_minutes: u64,
    /// Per-attempt HTTP timeout.
    pub http_timeout_seconds: f64,
    /// Total number of attempts made for one fetch before giving up.
    pub http_max_retries: u32,
    /// Base delay of the exponential backoff between attempts.
    pub http_retry_base_delay_seconds: f64,
    /// Consecutive failed fetches that open the circuit breaker.
    pub circuit_failure_threshold: u32,
    /// How long an open circuit rejects calls before allowing a probe.
    pub circuit_reset_timeout_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "https://jeongil.dev".to_string(),
            document_path: "/ko/llms.txt".to_string(),
            cache_ttl_minutes: 60,
            http_timeout_seconds: 30.0,
            http_max_retries: 3,
            http_retry_base_delay_seconds: 1.0,
            circuit_failure_threshold: 5,
            circuit_reset_timeout_seconds: 300,
        }
    }
}

impl Config {
    /// Load configuration from the default file location and the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] only if a config file exists but cannot be read or
    /// contains invalid TOML. Missing files and variables fall back to defaults.
    pub fn load() -> Result<Self> {
        let config = match Self::config_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        Ok(config.with_env())
    }

    /// Load configuration from an explicit file, then apply environment overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        Ok(Self::from_file(path)?.with_env())
    }

    /// Parse a TOML config file without applying environment overrides.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {e}", path.display())))?;
        let config: Self = toml::from_str(&content)?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Platform config file location, if one can be determined.
    pub fn config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("dev", "", "blogkb")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Apply `BLOG_*` overrides from the process environment.
    #[must_use]
    pub fn with_env(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `BLOG_*` overrides using an arbitrary variable lookup.
    #[must_use]
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("BLOG_BASE_URL") {
            self.base_url = value;
        }
        if let Some(value) = lookup("BLOG_LLMS_PATH") {
            self.document_path = value;
        }
        override_parsed(&lookup, "BLOG_CACHE_TTL_MINUTES", &mut self.cache_ttl_minutes);
        override_parsed(&lookup, "BLOG_HTTP_TIMEOUT", &mut self.http_timeout_seconds);
        override_parsed(&lookup, "BLOG_HTTP_MAX_RETRIES", &mut self.http_max_retries);
        override_parsed(
            &lookup,
            "BLOG_HTTP_RETRY_DELAY",
            &mut self.http_retry_base_delay_seconds,
        );
        override_parsed(
            &lookup,
            "BLOG_CIRCUIT_FAILURE_THRESHOLD",
            &mut self.circuit_failure_threshold,
        );
        override_parsed(
            &lookup,
            "BLOG_CIRCUIT_RESET_TIMEOUT",
            &mut self.circuit_reset_timeout_seconds,
        );
        self
    }

    /// Full URL of the source document.
    pub fn document_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.document_path.trim_start_matches('/')
        )
    }

    /// Cache time-to-live.
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_minutes.saturating_mul(60))
    }

    /// Per-attempt HTTP timeout.
    pub fn http_timeout(&self) -> Duration {
        seconds(self.http_timeout_seconds)
    }

    /// Base delay for exponential backoff.
    pub fn retry_base_delay(&self) -> Duration {
        seconds(self.http_retry_base_delay_seconds)
    }

    /// Circuit breaker reset timeout.
    pub const fn circuit_reset_timeout(&self) -> Duration {
        Duration::from_secs(self.circuit_reset_timeout_seconds)
    }
}

fn override_parsed<F, T>(lookup: &F, key: &str, target: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => *target = value,
        Err(_) => warn!("Invalid value {raw:?} for {key}, keeping previous setting"),
    }
}

/// Negative, NaN and infinite inputs collapse to zero rather than panicking.
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.document_url(), "https://jeongil.dev/ko/llms.txt");
        assert_eq!(config.cache_ttl(), Duration::from_secs(3600));
        assert_eq!(config.http_timeout(), Duration::from_secs(30));
        assert_eq!(config.http_max_retries, 3);
        assert_eq!(config.retry_base_delay(), Duration::from_secs(1));
        assert_eq!(config.circuit_failure_threshold, 5);
        assert_eq!(config.circuit_reset_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn test_no_overrides_keeps_defaults() {
        let config = Config::default().with_overrides(|_| None);
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::default().with_overrides(lookup_from(&[
            ("BLOG_BASE_URL", "http://localhost:8080/"),
            ("BLOG_LLMS_PATH", "/en/llms.txt"),
            ("BLOG_CACHE_TTL_MINUTES", "5"),
            ("BLOG_HTTP_TIMEOUT", "2.5"),
            ("BLOG_HTTP_MAX_RETRIES", "7"),
            ("BLOG_HTTP_RETRY_DELAY", "0.25"),
            ("BLOG_CIRCUIT_FAILURE_THRESHOLD", "2"),
            ("BLOG_CIRCUIT_RESET_TIMEOUT", "10"),
        ]));

        assert_eq!(config.document_url(), "http://localhost:8080/en/llms.txt");
        assert_eq!(config.cache_ttl(), Duration::from_secs(300));
        assert_eq!(config.http_timeout(), Duration::from_millis(2500));
        assert_eq!(config.http_max_retries, 7);
        assert_eq!(config.retry_base_delay(), Duration::from_millis(250));
        assert_eq!(config.circuit_failure_threshold, 2);
        assert_eq!(config.circuit_reset_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_invalid_env_values_are_ignored() {
        let config = Config::default().with_overrides(lookup_from(&[
            ("BLOG_CACHE_TTL_MINUTES", "soon"),
            ("BLOG_HTTP_TIMEOUT", "fast"),
            ("BLOG_HTTP_MAX_RETRIES", "-1"),
        ]));

        assert_eq!(config.cache_ttl_minutes, 60);
        assert_eq!(config.http_timeout_seconds, 30.0);
        assert_eq!(config.http_max_retries, 3);
    }

    #[test]
    fn test_negative_durations_clamp_to_zero() {
        let config = Config {
            http_retry_base_delay_seconds: -1.0,
            http_timeout_seconds: f64::NAN,
            ..Config::default()
        };
        assert_eq!(config.retry_base_delay(), Duration::ZERO);
        assert_eq!(config.http_timeout(), Duration::ZERO);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "cache_ttl_minutes = 15\nbase_url = \"http://example.test\"").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.cache_ttl_minutes, 15);
        assert_eq!(config.base_url, "http://example.test");
        assert_eq!(config.document_path, "/ko/llms.txt");
        assert_eq!(config.http_max_retries, 3);
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "cache_ttl_minutes = \"not a number\"").unwrap();

        let err = Config::from_file(file.path()).unwrap_err();
        assert_eq!(err.category(), "config");
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = Config::from_file(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
