//! Batch crawl controller: politeness gate + bounded concurrent fetching.
//!
//! A [`Crawler`] owns the shared fetch stack and processes a batch of URLs
//! in two phases:
//!
//! 1. **Gate pass**: every URL is checked against the robots gate first.
//!    Disallowed URLs become [`CrawlOutcome::Skipped`] and never reach the
//!    fetch engine nor occupy a concurrency slot.
//! 2. **Fan-out**: admitted URLs are fetched with at most
//!    `max_concurrency` requests outstanding at once, all over one shared
//!    connection pool. Completion order is unconstrained; every admitted
//!    URL is attempted exactly once.
//!
//! One failing URL never aborts a batch: failures are logged with their
//! source context, counted, and returned as [`CrawlOutcome::Failed`].
//! Cancelling the batch token stops scheduling new fetches and drops any
//! still in flight; partial results are never surfaced.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::config::CrawlerConfig;
use crate::fetch::{
    http_fetcher, FetchError, FetchResult, HttpTransport, RetryFetch, Sleeper, TokioSleeper,
    Transport,
};
use crate::metrics::CrawlMetrics;
use crate::models::Article;
use crate::pipeline::to_article;
use crate::robots::RobotsGate;

/// Tags stamped onto every outcome and metric of a batch.
#[derive(Debug, Clone)]
pub struct BatchLabels {
    pub source: String,
    pub country: String,
    pub language: Option<String>,
}

impl BatchLabels {
    /// Labels for ad-hoc URL crawls outside the source catalog.
    pub fn adhoc() -> Self {
        Self {
            source: "cli".to_string(),
            country: String::new(),
            language: None,
        }
    }
}

/// Per-URL result of a batch crawl.
#[derive(Debug)]
pub enum CrawlOutcome {
    /// Fetch and parse succeeded.
    Fetched {
        page: FetchResult,
        article: Article,
    },
    /// Disallowed by the politeness gate; the fetch engine was never
    /// invoked.
    Skipped { url: String },
    /// The fetch failed after internal retries.
    Failed { url: String, error: FetchError },
}

impl CrawlOutcome {
    pub fn url(&self) -> &str {
        match self {
            CrawlOutcome::Fetched { page, .. } => &page.url,
            CrawlOutcome::Skipped { url } => url,
            CrawlOutcome::Failed { url, .. } => url,
        }
    }
}

/// Batch crawl controller, generic over the transport and sleeper so tests
/// can run without a network or real delays.
pub struct Crawler<T, S> {
    fetcher: RetryFetch<T, S>,
    gate: Arc<RobotsGate>,
    metrics: Arc<CrawlMetrics>,
    user_agent: String,
    max_concurrency: usize,
}

impl Crawler<HttpTransport, TokioSleeper> {
    /// Production crawler: retrying HTTP transport and a robots gate, both
    /// sharing `client`'s connection pool.
    pub fn new(config: &CrawlerConfig, client: reqwest::Client, metrics: Arc<CrawlMetrics>) -> Self {
        Self::with_parts(
            http_fetcher(client.clone()),
            Arc::new(RobotsGate::new(client)),
            metrics,
            config.user_agent.clone(),
            config.max_concurrency,
        )
    }
}

impl<T, S> Crawler<T, S>
where
    T: Transport,
    S: Sleeper,
{
    /// Assemble a crawler from explicit parts.
    pub fn with_parts(
        fetcher: RetryFetch<T, S>,
        gate: Arc<RobotsGate>,
        metrics: Arc<CrawlMetrics>,
        user_agent: String,
        max_concurrency: usize,
    ) -> Self {
        Self {
            fetcher,
            gate,
            metrics,
            user_agent,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// The robots gate, for pre-seeding.
    pub fn gate(&self) -> &RobotsGate {
        &self.gate
    }

    /// Crawl a batch of URLs under the politeness gate and concurrency
    /// bound. Returns one outcome per processed URL.
    #[instrument(level = "info", skip_all, fields(source = %labels.source, country = %labels.country, urls = urls.len()))]
    pub async fn crawl_batch(
        &self,
        urls: &[String],
        labels: &BatchLabels,
        cancel: &CancellationToken,
    ) -> Vec<CrawlOutcome> {
        let mut outcomes: Vec<CrawlOutcome> = Vec::with_capacity(urls.len());
        let mut admitted: Vec<String> = Vec::with_capacity(urls.len());

        for url in urls {
            if cancel.is_cancelled() {
                info!(remaining = urls.len() - admitted.len() - outcomes.len(), "Batch cancelled during gate pass");
                break;
            }
            if self.gate.is_allowed(url, &self.user_agent).await {
                admitted.push(url.clone());
            } else {
                warn!(%url, source = %labels.source, "Disallowed by robots; skipping");
                outcomes.push(CrawlOutcome::Skipped { url: url.clone() });
            }
        }

        let fetched: Vec<CrawlOutcome> = stream::iter(admitted)
            .map(|url| {
                let labels = labels.clone();
                async move {
                    match self.fetcher.fetch(&url).await {
                        Ok(page) => {
                            let article = to_article(
                                &url,
                                &page.body,
                                &labels.country,
                                labels.language.as_deref(),
                                &labels.source,
                            );
                            self.metrics
                                .inc_pages_crawled(&labels.source, &labels.country);
                            info!(
                                %url,
                                status = page.status,
                                title = article.title.as_deref().unwrap_or(""),
                                hash = %article.content_hash,
                                "Fetched and parsed"
                            );
                            CrawlOutcome::Fetched { page, article }
                        }
                        Err(e) => {
                            self.metrics
                                .inc_fetch_errors(&labels.source, &labels.country);
                            error!(
                                %url,
                                source = %labels.source,
                                country = %labels.country,
                                error = %e,
                                "Fetch failed"
                            );
                            CrawlOutcome::Failed { url, error: e }
                        }
                    }
                }
            })
            .buffer_unordered(self.max_concurrency)
            .take_until(cancel.cancelled())
            .collect()
            .await;

        outcomes.extend(fetched);
        outcomes
    }
}
