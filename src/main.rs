//! # Polite Crawler
//!
//! A polite, resilient web crawler. Given explicit URLs or a configured
//! source from the YAML catalog, it fetches pages subject to per-host
//! robots rules, deduplicates content by fingerprint, extracts article
//! text, and optionally persists raw pages and curated article batches.
//!
//! ## Politeness
//!
//! - robots.txt is honored per host, with rules cached process-wide
//! - fetches are bounded to a configurable number in flight (default 8)
//! - every successful request is followed by a jittered pause so no host
//!   sees a burst
//!
//! ## Resilience
//!
//! - transport failures retry with exponential backoff (up to 5 attempts)
//! - HTTP error statuses surface immediately with their code
//! - one failing URL never aborts a batch
//!
//! ## Usage
//!
//! ```sh
//! polite_crawler urls https://example.com/news
//! polite_crawler run --source example-news --country MZ --write-raw \
//!     --storage-dir ./data
//! ```

use chrono::{NaiveDate, Utc};
use clap::Parser;
use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cli;
mod config;
mod crawl;
mod dedup;
mod fetch;
mod metrics;
mod models;
mod parse;
mod pipeline;
mod robots;
mod sources;
mod storage;

use cli::{Cli, Command};
use config::CrawlerConfig;
use crawl::{BatchLabels, CrawlOutcome, Crawler};
use fetch::FetchResult;
use metrics::CrawlMetrics;
use models::PageRaw;
use sources::SourceCatalog;
use storage::{select_backend, Storage, StorageError};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let settings = CrawlerConfig::from_env();

    // --- Tracing init ---
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_level));
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logs {
        // One JSON object per line, for log shippers.
        tfmt().with_env_filter(filter).with_target(true).json().init();
    } else {
        tfmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_file(false)
            .with_line_number(false)
            .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
            .init();
    }

    let args = Cli::parse();
    info!("polite_crawler starting up");

    match args.command {
        Command::Urls { urls } => crawl_urls(&settings, urls).await,
        Command::Run {
            source,
            country,
            max_pages,
            write_raw,
            catalog,
            storage_dir,
        } => {
            run_source(
                &settings,
                &source,
                &country,
                max_pages,
                write_raw,
                &catalog,
                storage_dir,
            )
            .await
        }
    }
}

/// Fetch explicit URLs once, logging each outcome.
async fn crawl_urls(settings: &CrawlerConfig, urls: Vec<String>) -> Result<(), Box<dyn Error>> {
    let client = fetch::build_client(settings)?;
    let metrics = Arc::new(CrawlMetrics::default());
    let crawler = Crawler::new(settings, client, Arc::clone(&metrics));

    let cancel = CancellationToken::new();
    let outcomes = crawler
        .crawl_batch(&urls, &BatchLabels::adhoc(), &cancel)
        .await;

    // Failures and robots skips were already logged by the controller;
    // summarize the successes here.
    for outcome in &outcomes {
        if let CrawlOutcome::Fetched { page, article } = outcome {
            info!(
                url = %page.url,
                status = page.status,
                hash = %article.content_hash,
                title = article.title.as_deref().unwrap_or(""),
                "fetched"
            );
        }
    }

    info!(
        snapshot = %serde_json::to_string(&metrics.snapshot())?,
        "Crawl metrics"
    );
    Ok(())
}

/// Crawl a configured source from the catalog, optionally persisting raw
/// pages and the curated article batch.
async fn run_source(
    settings: &CrawlerConfig,
    source: &str,
    country: &str,
    max_pages: usize,
    write_raw: bool,
    catalog_path: &str,
    storage_dir: Option<String>,
) -> Result<(), Box<dyn Error>> {
    let catalog = match SourceCatalog::load(catalog_path).await {
        Ok(c) => c,
        Err(e) => {
            error!(path = %catalog_path, error = %e, "Failed to load sources catalog");
            return Err(Box::new(e));
        }
    };
    let Some(entry) = catalog.find(source, country) else {
        error!(%source, %country, "No such source in catalog");
        return Ok(());
    };

    let base_urls: Vec<String> = entry.base_urls.iter().take(max_pages).cloned().collect();
    info!(%source, %country, urls = base_urls.len(), "Starting source crawl");

    let client = fetch::build_client(settings)?;
    let metrics = Arc::new(CrawlMetrics::default());
    let crawler = Crawler::new(settings, client, Arc::clone(&metrics));
    let store = select_backend(storage_dir.as_deref());

    let labels = BatchLabels {
        source: source.to_string(),
        country: country.to_string(),
        language: entry.language.clone(),
    };
    let cancel = CancellationToken::new();
    let outcomes = crawler.crawl_batch(&base_urls, &labels, &cancel).await;

    let today = Utc::now().date_naive();
    let mut articles = Vec::new();
    for (idx, outcome) in outcomes.iter().enumerate() {
        let CrawlOutcome::Fetched { page, article } = outcome else {
            continue;
        };
        articles.push(article.clone());

        if write_raw {
            match write_raw_page(store.as_ref(), page, &labels, today, idx + 1).await {
                Ok(raw) => {
                    metrics.add_bytes_written(
                        "raw",
                        &labels.source,
                        &labels.country,
                        page.body.len() as u64,
                    );
                    debug!(key = %raw.storage_key, hash = %raw.content_hash, "Raw page written");
                }
                Err(e) => {
                    error!(url = %page.url, error = %e, "Raw write failed");
                }
            }
        }
    }

    let articles = pipeline::dedup_by_fingerprint(articles);
    if !articles.is_empty() {
        match pipeline::write_curated_articles(store.as_ref(), &articles, country, today).await {
            Ok(()) => info!(count = articles.len(), "Curated batch written"),
            Err(e) => warn!(error = %e, "Curated write failed; continuing"),
        }
    }

    info!(
        snapshot = %serde_json::to_string(&metrics.snapshot())?,
        "Crawl metrics"
    );
    Ok(())
}

/// Persist one raw page and return its storage record.
async fn write_raw_page(
    store: &dyn Storage,
    page: &FetchResult,
    labels: &BatchLabels,
    dt: NaiveDate,
    idx: usize,
) -> Result<PageRaw, StorageError> {
    let key = format!(
        "raw/{}/{}/dt={}/page-{:06}.html",
        labels.source,
        labels.country,
        dt.format("%Y-%m-%d"),
        idx
    );
    let hash = dedup::content_hash(&page.body);

    let mut meta = HashMap::new();
    meta.insert("content_hash".to_string(), hash.clone());
    meta.insert("status".to_string(), page.status.to_string());
    meta.insert("source".to_string(), labels.source.clone());
    meta.insert("country".to_string(), labels.country.clone());

    store.put_compressed(&key, page.body.as_bytes(), &meta).await?;

    Ok(PageRaw {
        url: page.url.clone(),
        fetched_at: Utc::now(),
        status: page.status,
        headers: page.headers.clone(),
        content_hash: hash,
        storage_key: key,
    })
}
