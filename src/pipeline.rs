//! Result assembly: fetched page to curated [`Article`].
//!
//! [`to_article`] runs the content extractor, fingerprints the extracted
//! title and text, and stamps the caller's source tags verbatim. Batches
//! are deduplicated by fingerprint before curated output, so pages whose
//! content is byte-identical collapse to one record.

use chrono::NaiveDate;
use itertools::Itertools;

use crate::dedup::content_hash;
use crate::models::Article;
use crate::parse::extract;
use crate::storage::{Storage, StorageError};

/// Build an article candidate from one fetched page.
///
/// The fingerprint covers `"{title}\n{text}"` with missing components
/// treated as empty strings, so it is well-defined even for pages with no
/// extractable content. `country`, `language`, and `source` are copied
/// verbatim.
pub fn to_article(
    url: &str,
    html: &str,
    country: &str,
    language: Option<&str>,
    source: &str,
) -> Article {
    let parsed = extract(html);
    let fingerprint = content_hash(&format!(
        "{}\n{}",
        parsed.title.as_deref().unwrap_or(""),
        parsed.text.as_deref().unwrap_or("")
    ));

    Article {
        url: url.to_string(),
        title: parsed.title,
        text: parsed.text,
        authors: Vec::new(),
        published_at: None,
        country: country.to_string(),
        language: language.map(str::to_string),
        source: source.to_string(),
        content_hash: fingerprint,
    }
}

/// Drop articles whose content fingerprint was already seen, keeping the
/// first occurrence.
pub fn dedup_by_fingerprint(articles: Vec<Article>) -> Vec<Article> {
    articles
        .into_iter()
        .unique_by(|a| a.content_hash.clone())
        .collect()
}

/// Curated-layer path for a country and crawl date.
pub fn curated_path(country: &str, dt: NaiveDate) -> String {
    format!(
        "curated/articles/{}/dt={}/data.jsonl",
        country,
        dt.format("%Y-%m-%d")
    )
}

/// Write a curated article batch through the storage collaborator.
///
/// Storage failures (including `Unavailable` from the no-op backend) are
/// returned for the caller to catch and log; they never abort a crawl.
pub async fn write_curated_articles(
    storage: &dyn Storage,
    records: &[Article],
    country: &str,
    dt: NaiveDate,
) -> Result<(), StorageError> {
    storage
        .write_batch(&curated_path(country, dt), records)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_article_stamps_tags_verbatim() {
        let html = "<html><head><title>A</title></head><body><p>B</p></body></html>";
        let article = to_article("https://example.com/x", html, "MZ", Some("pt"), "src");
        assert_eq!(article.url, "https://example.com/x");
        assert_eq!(article.title.as_deref(), Some("A"));
        assert_eq!(article.text.as_deref(), Some("B"));
        assert_eq!(article.country, "MZ");
        assert_eq!(article.language.as_deref(), Some("pt"));
        assert_eq!(article.source, "src");
        assert_eq!(article.content_hash, content_hash("A\nB"));
    }

    #[test]
    fn test_fingerprint_with_missing_text_uses_empty_string() {
        let article = to_article(
            "https://example.com/x",
            "<html><title>X</title></html>",
            "",
            None,
            "cli",
        );
        assert_eq!(article.title.as_deref(), Some("X"));
        assert_eq!(article.text, None);
        assert_eq!(article.content_hash, content_hash("X\n"));
    }

    #[test]
    fn test_fingerprint_defined_for_empty_page() {
        let article = to_article("https://example.com/x", "", "", None, "cli");
        assert_eq!(article.content_hash, content_hash("\n"));
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let a = to_article("https://example.com/1", "<title>Same</title>", "", None, "s");
        let b = to_article("https://example.com/2", "<title>Same</title>", "", None, "s");
        let c = to_article("https://example.com/3", "<title>Other</title>", "", None, "s");

        let unique = dedup_by_fingerprint(vec![a, b, c]);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].url, "https://example.com/1");
        assert_eq!(unique[1].url, "https://example.com/3");
    }

    #[test]
    fn test_curated_path_layout() {
        let dt = NaiveDate::from_ymd_opt(2025, 8, 16).unwrap();
        assert_eq!(
            curated_path("MZ", dt),
            "curated/articles/MZ/dt=2025-08-16/data.jsonl"
        );
    }
}
