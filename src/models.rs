//! Data models for crawled pages and assembled articles.
//!
//! - [`Article`]: the curated record produced by the result assembler
//! - [`PageRaw`]: metadata describing a raw page object persisted to the
//!   storage layer
//!
//! Both are plain serde types; ownership passes to the caller/pipeline
//! after construction and they are never mutated afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A normalized article candidate built from one fetched page.
///
/// Built exactly once per successful fetch+parse. The `country`,
/// `language`, and `source` tags are stamped verbatim from the caller; the
/// `content_hash` fingerprints the extracted title and text and is the
/// dedup key across crawls.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Article {
    /// The URL the page was fetched from.
    pub url: String,
    /// Extracted title, when the page had one.
    pub title: Option<String>,
    /// Extracted visible text, when any was found.
    pub text: Option<String>,
    /// Bylines, when known. Populated by richer extractors; empty here.
    #[serde(default)]
    pub authors: Vec<String>,
    /// Publication timestamp, when known.
    pub published_at: Option<DateTime<Utc>>,
    /// Country code of the source (e.g. "MZ").
    pub country: String,
    /// Language tag of the source, when configured.
    pub language: Option<String>,
    /// Source name from the catalog (or a caller-chosen tag).
    pub source: String,
    /// SHA-256 fingerprint over extracted title + text.
    pub content_hash: String,
}

/// Metadata for a raw page object written to the storage raw layer.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PageRaw {
    /// The URL the page was fetched from.
    pub url: String,
    /// When the fetch completed.
    pub fetched_at: DateTime<Utc>,
    /// Final HTTP status code.
    pub status: u16,
    /// Response headers of the final response.
    pub headers: HashMap<String, String>,
    /// Fingerprint of the raw body text.
    pub content_hash: String,
    /// Object key the raw bytes were written under.
    pub storage_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_article_round_trips_through_json() {
        let article = Article {
            url: "https://example.com/x".into(),
            title: Some("T".into()),
            text: None,
            authors: Vec::new(),
            published_at: None,
            country: "MZ".into(),
            language: Some("pt".into()),
            source: "example".into(),
            content_hash: "00".repeat(32),
        };
        let json = serde_json::to_string(&article).unwrap();
        let back: Article = serde_json::from_str(&json).unwrap();
        assert_eq!(back.url, article.url);
        assert_eq!(back.title, article.title);
        assert_eq!(back.country, "MZ");
        assert_eq!(back.content_hash.len(), 64);
    }
}
