//! Runtime configuration for the crawler, resolved once at startup.
//!
//! All knobs come from environment variables with documented defaults, so a
//! bare invocation behaves sensibly and deployments override only what they
//! need:
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `REQUESTS_TIMEOUT` | `30` | Per-attempt request timeout, seconds |
//! | `HTTP_USER_AGENT` | identifying UA + contact | `User-Agent` header |
//! | `PROXY_URL` | none | Optional upstream proxy |
//! | `MAX_CONCURRENCY` | `8` | Max in-flight fetches process-wide |
//! | `LOG_LEVEL` | `info` | Default tracing filter level |

use std::env;
use std::time::Duration;

/// Default per-attempt request timeout.
pub const DEFAULT_TIMEOUT_SECS: f64 = 30.0;
/// Default user agent: names the crawler and a contact address.
pub const DEFAULT_USER_AGENT: &str = "polite_crawler/0.1 (+crawler-ops@example.org)";
/// Default bound on concurrently outstanding fetches.
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// Configuration consumed by the fetch engine and batch controller.
///
/// Resolved once at process start; components receive it (or the pieces
/// they need) at construction rather than reading the environment
/// themselves.
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Per-attempt request timeout.
    pub request_timeout: Duration,
    /// `User-Agent` header, also used for robots evaluation.
    pub user_agent: String,
    /// Optional upstream proxy URL.
    pub proxy_url: Option<String>,
    /// Maximum concurrently outstanding fetches.
    pub max_concurrency: usize,
    /// Default log level when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs_f64(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            proxy_url: None,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            log_level: "info".to_string(),
        }
    }
}

impl CrawlerConfig {
    /// Read configuration from the environment, falling back to defaults
    /// for unset or unparseable values.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let request_timeout = env::var("REQUESTS_TIMEOUT")
            .ok()
            .and_then(|raw| raw.parse::<f64>().ok())
            .filter(|secs| *secs > 0.0)
            .map(Duration::from_secs_f64)
            .unwrap_or(defaults.request_timeout);

        let user_agent = env::var("HTTP_USER_AGENT")
            .ok()
            .filter(|ua| !ua.trim().is_empty())
            .unwrap_or(defaults.user_agent);

        let proxy_url = env::var("PROXY_URL").ok().filter(|p| !p.trim().is_empty());

        let max_concurrency = env::var("MAX_CONCURRENCY")
            .ok()
            .and_then(|raw| raw.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.max_concurrency);

        let log_level = env::var("LOG_LEVEL")
            .ok()
            .filter(|l| !l.trim().is_empty())
            .unwrap_or(defaults.log_level);

        Self {
            request_timeout,
            user_agent,
            proxy_url,
            max_concurrency,
            log_level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CrawlerConfig::default();
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.user_agent.contains("polite_crawler"));
        assert!(config.user_agent.contains('+'), "UA should carry a contact");
        assert!(config.proxy_url.is_none());
        assert_eq!(config.max_concurrency, 8);
        assert_eq!(config.log_level, "info");
    }
}
