//! In-process crawl counters.
//!
//! A [`CrawlMetrics`] instance is created at startup and injected into the
//! components that report progress; tests construct their own instance so
//! counters never leak between cases. Recording is fire-and-forget: it
//! never blocks meaningfully and never fails the caller. Exporter wiring
//! (Prometheus endpoints and the like) lives outside this crate; batch
//! callers log a [`snapshot`](CrawlMetrics::snapshot) instead.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;

/// Labeled counters for one crawler process.
#[derive(Debug, Default)]
pub struct CrawlMetrics {
    inner: Mutex<Counters>,
}

#[derive(Debug, Default, Clone, Serialize)]
struct Counters {
    /// Pages successfully crawled, keyed by `source/country`.
    pages_crawled: HashMap<String, u64>,
    /// Fetch failures, keyed by `source/country`.
    fetch_errors: HashMap<String, u64>,
    /// Bytes persisted to storage, keyed by `layer/source/country`.
    bytes_written: HashMap<String, u64>,
}

/// A point-in-time copy of all counters, serializable for logging.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub pages_crawled: HashMap<String, u64>,
    pub fetch_errors: HashMap<String, u64>,
    pub bytes_written: HashMap<String, u64>,
}

fn label(source: &str, country: &str) -> String {
    format!("{}/{}", source, country)
}

impl CrawlMetrics {
    /// Count one successfully crawled page.
    pub fn inc_pages_crawled(&self, source: &str, country: &str) {
        if let Ok(mut c) = self.inner.lock() {
            *c.pages_crawled.entry(label(source, country)).or_default() += 1;
        }
    }

    /// Count one failed fetch.
    pub fn inc_fetch_errors(&self, source: &str, country: &str) {
        if let Ok(mut c) = self.inner.lock() {
            *c.fetch_errors.entry(label(source, country)).or_default() += 1;
        }
    }

    /// Count bytes written to a storage layer ("raw" or "curated").
    pub fn add_bytes_written(&self, layer: &str, source: &str, country: &str, bytes: u64) {
        if let Ok(mut c) = self.inner.lock() {
            *c.bytes_written
                .entry(format!("{}/{}/{}", layer, source, country))
                .or_default() += bytes;
        }
    }

    /// Current value of `pages_crawled` for a label pair.
    pub fn pages_crawled(&self, source: &str, country: &str) -> u64 {
        self.inner
            .lock()
            .ok()
            .and_then(|c| c.pages_crawled.get(&label(source, country)).copied())
            .unwrap_or(0)
    }

    /// Current value of `fetch_errors` for a label pair.
    pub fn fetch_errors(&self, source: &str, country: &str) -> u64 {
        self.inner
            .lock()
            .ok()
            .and_then(|c| c.fetch_errors.get(&label(source, country)).copied())
            .unwrap_or(0)
    }

    /// Copy out all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let counters = self
            .inner
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default();
        MetricsSnapshot {
            pages_crawled: counters.pages_crawled,
            fetch_errors: counters.fetch_errors,
            bytes_written: counters.bytes_written,
        }
    }
}
