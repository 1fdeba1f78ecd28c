//! HTTP fetch engine with retry, backoff, and a politeness delay.
//!
//! The engine is layered so the retry policy can be tested without a
//! network:
//! - [`Transport`]: the seam for performing one HTTP GET
//! - [`HttpTransport`]: the `reqwest`-backed implementation
//! - [`RetryFetch`]: decorator adding the retry loop and the post-success
//!   politeness pause
//! - [`Sleeper`]: injectable sleep so tests observe delays instead of
//!   waiting them out
//!
//! # Retry Strategy
//!
//! Only transport-class failures are retried (connection establishment,
//! read timeout, protocol reset). A completed response with an error status
//! is a [`FetchError::HttpStatus`] and is surfaced immediately. Backoff
//! doubles from 1 second per attempt, capped at 30 seconds, with at most 5
//! total attempts and no jitter; exhaustion surfaces the last transport
//! error.
//!
//! # Politeness Delay
//!
//! Every successful response is followed by a pause sampled uniformly from
//! [0.15s, 0.6s] before the result is returned, so back-to-back fetches
//! against one host do not arrive in a burst. The pause is per-request and
//! is not part of the backoff schedule.

use rand::{rng, Rng};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, instrument, warn};

use crate::config::CrawlerConfig;

/// Total attempts (first try included) before a transport error is surfaced.
pub const MAX_FETCH_ATTEMPTS: usize = 5;
/// First backoff delay; doubles with each further attempt.
pub const BASE_BACKOFF: Duration = Duration::from_secs(1);
/// Backoff ceiling.
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Classification of a transport-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Connection could not be established.
    Connect,
    /// The request or response read timed out.
    Timeout,
    /// The peer violated or reset the protocol mid-exchange.
    Protocol,
    /// Redirect following was exhausted without a final response.
    Redirect,
    /// Anything else (bad request construction, local I/O, ...).
    Other,
}

/// Errors surfaced by the fetch engine.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request never completed. Retried internally when the kind is
    /// transient (connect, timeout, protocol).
    #[error("transport error ({kind:?}) fetching {url}: {message}")]
    Transport {
        url: String,
        kind: TransportKind,
        message: String,
    },
    /// The request completed with a non-success status. Never retried.
    #[error("HTTP status {status} fetching {url}")]
    HttpStatus { url: String, status: u16 },
}

impl FetchError {
    /// Whether the retry loop should try again after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::Transport {
                kind: TransportKind::Connect | TransportKind::Timeout | TransportKind::Protocol,
                ..
            }
        )
    }

    fn from_reqwest(url: &str, e: reqwest::Error) -> Self {
        let kind = if e.is_connect() {
            TransportKind::Connect
        } else if e.is_timeout() {
            TransportKind::Timeout
        } else if e.is_redirect() {
            TransportKind::Redirect
        } else if e.is_builder() {
            TransportKind::Other
        } else if e.is_request() || e.is_body() || e.is_decode() {
            TransportKind::Protocol
        } else {
            TransportKind::Other
        };
        FetchError::Transport {
            url: url.to_string(),
            kind,
            message: e.to_string(),
        }
    }
}

/// Outcome of one completed fetch attempt.
///
/// A retried request produces a fresh `FetchResult`; earlier attempts'
/// results are discarded.
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// The URL as requested (redirects are followed transparently).
    pub url: String,
    /// Final status code after redirect following.
    pub status: u16,
    /// Response body decoded to text.
    pub body: String,
    /// Response headers of the final response.
    pub headers: HashMap<String, String>,
}

/// The seam for performing a single HTTP GET.
pub trait Transport {
    /// Perform one attempt. Implementations must not retry internally.
    async fn get(&self, url: &str) -> Result<FetchResult, FetchError>;
}

/// Injectable sleep, so retry/politeness delays are observable in tests.
pub trait Sleeper {
    async fn sleep(&self, duration: Duration);
}

/// The production sleeper.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Build the shared HTTP client from configuration.
///
/// One client (and therefore one connection pool) is shared by all fetches
/// in a batch, including the robots.txt lookups; clones are handles onto
/// the same pool. Redirects are followed up to reqwest's own limit.
pub fn build_client(config: &CrawlerConfig) -> Result<reqwest::Client, reqwest::Error> {
    let mut builder = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .user_agent(&config.user_agent)
        .pool_max_idle_per_host(config.max_concurrency);
    if let Some(proxy_url) = &config.proxy_url {
        builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
    }
    builder.build()
}

/// `reqwest`-backed [`Transport`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<FetchResult, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
            .collect();

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        Ok(FetchResult {
            url: url.to_string(),
            status: status.as_u16(),
            body,
            headers,
        })
    }
}

/// Sample the post-fetch politeness pause, uniform over [0.15s, 0.6s].
pub(crate) fn polite_delay() -> Duration {
    Duration::from_secs_f64(rng().random_range(0.15..=0.6))
}

/// Decorator adding retry-with-backoff and the politeness pause to any
/// [`Transport`].
pub struct RetryFetch<T, S> {
    inner: T,
    sleeper: S,
    max_attempts: usize,
    base_backoff: Duration,
    max_backoff: Duration,
}

impl<T, S> RetryFetch<T, S>
where
    T: Transport,
    S: Sleeper,
{
    /// Wrap a transport with the default policy (5 attempts, 1s..30s).
    pub fn new(inner: T, sleeper: S) -> Self {
        Self::with_policy(inner, sleeper, MAX_FETCH_ATTEMPTS, BASE_BACKOFF)
    }

    /// Wrap a transport with an explicit attempt ceiling and base delay.
    pub fn with_policy(inner: T, sleeper: S, max_attempts: usize, base_backoff: Duration) -> Self {
        Self {
            inner,
            sleeper,
            max_attempts: max_attempts.max(1),
            base_backoff,
            max_backoff: MAX_BACKOFF,
        }
    }

    /// Fetch `url`, retrying transport failures up to the attempt ceiling.
    ///
    /// HTTP status errors are returned on the first attempt without retry.
    /// On success the politeness pause runs before the result is returned.
    #[instrument(level = "debug", skip_all, fields(%url))]
    pub async fn fetch(&self, url: &str) -> Result<FetchResult, FetchError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            attempt += 1;
            let attempt_t0 = Instant::now();
            match self.inner.get(url).await {
                Ok(result) => {
                    debug!(
                        attempt,
                        status = result.status,
                        elapsed_ms = attempt_t0.elapsed().as_millis() as u64,
                        "Fetch succeeded"
                    );
                    self.sleeper.sleep(polite_delay()).await;
                    return Ok(result);
                }
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let exp = (attempt - 1).min(31) as u32;
                    let mut delay = self.base_backoff.saturating_mul(1u32 << exp);
                    if delay > self.max_backoff {
                        delay = self.max_backoff;
                    }
                    warn!(
                        attempt,
                        max = self.max_attempts,
                        ?delay,
                        error = %e,
                        "Transport error; backing off"
                    );
                    self.sleeper.sleep(delay).await;
                }
                Err(e) => {
                    error!(
                        attempt,
                        elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                        error = %e,
                        "Fetch failed"
                    );
                    return Err(e);
                }
            }
        }
    }
}

/// The production fetcher: retrying `reqwest` transport with real sleeps.
pub type HttpFetcher = RetryFetch<HttpTransport, TokioSleeper>;

/// Build the production fetcher on top of a shared client.
pub fn http_fetcher(client: reqwest::Client) -> HttpFetcher {
    RetryFetch::new(HttpTransport::new(client), TokioSleeper)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const POLITE_MIN: Duration = Duration::from_millis(150);
    const POLITE_MAX: Duration = Duration::from_millis(600);

    struct MockTransport {
        responses: Mutex<VecDeque<Result<FetchResult, FetchError>>>,
        calls: AtomicUsize,
    }

    impl MockTransport {
        fn new(responses: Vec<Result<FetchResult, FetchError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Transport for &MockTransport {
        async fn get(&self, _url: &str) -> Result<FetchResult, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("mock transport ran out of scripted responses")
        }
    }

    #[derive(Default)]
    struct RecordingSleeper {
        slept: Mutex<Vec<Duration>>,
    }

    impl RecordingSleeper {
        fn slept(&self) -> Vec<Duration> {
            self.slept.lock().unwrap().clone()
        }
    }

    impl Sleeper for &RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.slept.lock().unwrap().push(duration);
        }
    }

    fn ok_result() -> Result<FetchResult, FetchError> {
        Ok(FetchResult {
            url: "https://example.com/x".into(),
            status: 200,
            body: "ok".into(),
            headers: HashMap::new(),
        })
    }

    fn connect_error() -> Result<FetchResult, FetchError> {
        Err(FetchError::Transport {
            url: "https://example.com/x".into(),
            kind: TransportKind::Connect,
            message: "connection refused".into(),
        })
    }

    #[tokio::test]
    async fn test_transport_errors_are_retried_to_success() {
        let transport = MockTransport::new(vec![connect_error(), connect_error(), ok_result()]);
        let sleeper = RecordingSleeper::default();
        let fetcher = RetryFetch::new(&transport, &sleeper);

        let result = fetcher.fetch("https://example.com/x").await.unwrap();
        assert_eq!(result.status, 200);
        assert_eq!(transport.calls(), 3);

        // Two backoff sleeps (1s then 2s), then the politeness pause.
        let slept = sleeper.slept();
        assert_eq!(slept.len(), 3);
        assert_eq!(slept[0], Duration::from_secs(1));
        assert_eq!(slept[1], Duration::from_secs(2));
        assert!(slept[2] >= POLITE_MIN && slept[2] <= POLITE_MAX);
    }

    #[tokio::test]
    async fn test_http_status_errors_are_not_retried() {
        let transport = MockTransport::new(vec![Err(FetchError::HttpStatus {
            url: "https://example.com/x".into(),
            status: 500,
        })]);
        let sleeper = RecordingSleeper::default();
        let fetcher = RetryFetch::new(&transport, &sleeper);

        let err = fetcher.fetch("https://example.com/x").await.unwrap_err();
        assert!(matches!(err, FetchError::HttpStatus { status: 500, .. }));
        assert_eq!(transport.calls(), 1);
        assert!(sleeper.slept().is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_last_transport_error() {
        let transport = MockTransport::new(vec![
            connect_error(),
            connect_error(),
            connect_error(),
            connect_error(),
            connect_error(),
        ]);
        let sleeper = RecordingSleeper::default();
        let fetcher = RetryFetch::new(&transport, &sleeper);

        let err = fetcher.fetch("https://example.com/x").await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(transport.calls(), MAX_FETCH_ATTEMPTS);
        // Backoff doubles per attempt and no politeness pause runs.
        assert_eq!(
            sleeper.slept(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
            ]
        );
    }

    #[tokio::test]
    async fn test_backoff_is_capped() {
        let transport = MockTransport::new(vec![connect_error(), connect_error(), ok_result()]);
        let sleeper = RecordingSleeper::default();
        let fetcher = RetryFetch::with_policy(&transport, &sleeper, 3, Duration::from_secs(20));

        fetcher.fetch("https://example.com/x").await.unwrap();
        let slept = sleeper.slept();
        assert_eq!(slept[0], Duration::from_secs(20));
        assert_eq!(slept[1], MAX_BACKOFF);
    }

    #[tokio::test]
    async fn test_redirect_exhaustion_is_not_retried() {
        let transport = MockTransport::new(vec![Err(FetchError::Transport {
            url: "https://example.com/loop".into(),
            kind: TransportKind::Redirect,
            message: "too many redirects".into(),
        })]);
        let sleeper = RecordingSleeper::default();
        let fetcher = RetryFetch::new(&transport, &sleeper);

        let err = fetcher.fetch("https://example.com/loop").await.unwrap_err();
        assert!(!err.is_retryable());
        assert_eq!(transport.calls(), 1);
    }

    #[test]
    fn test_polite_delay_stays_within_bounds() {
        for _ in 0..1000 {
            let d = polite_delay();
            assert!(d >= POLITE_MIN, "delay {:?} below lower bound", d);
            assert!(d <= POLITE_MAX, "delay {:?} above upper bound", d);
        }
    }
}
