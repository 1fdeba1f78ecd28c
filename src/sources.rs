//! YAML source catalog: which sites to crawl, and how they are tagged.
//!
//! The catalog is a list of entries like:
//!
//! ```yaml
//! sources:
//!   - name: example-news
//!     country: MZ
//!     language: pt
//!     max_pages: 50
//!     base_urls:
//!       - https://example.com/news
//! ```
//!
//! `schedule` holds an optional 5-field cron string for external schedulers;
//! this crate only carries it through.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;

/// One configured crawl source.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceEntry {
    pub name: String,
    pub country: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub base_urls: Vec<String>,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    #[serde(default)]
    pub schedule: Option<String>,
}

fn default_max_pages() -> usize {
    50
}

/// The full catalog.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SourceCatalog {
    #[serde(default)]
    pub sources: Vec<SourceEntry>,
}

/// Catalog loading failures.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse catalog: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl SourceCatalog {
    /// Parse a catalog from YAML text.
    pub fn from_yaml(raw: &str) -> Result<Self, CatalogError> {
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Load a catalog from a YAML file.
    pub async fn load(path: &str) -> Result<Self, CatalogError> {
        let raw = fs::read_to_string(path).await?;
        Self::from_yaml(&raw)
    }

    /// Look up the entry for a (name, country) pair.
    pub fn find(&self, name: &str, country: &str) -> Option<&SourceEntry> {
        self.sources
            .iter()
            .find(|s| s.name == name && s.country == country)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
sources:
  - name: example-news
    country: MZ
    language: pt
    base_urls:
      - https://example.com/news
      - https://example.com/politics
  - name: example-news
    country: AO
    schedule: "0 * * * *"
"#;

    #[test]
    fn test_parse_and_lookup() {
        let catalog = SourceCatalog::from_yaml(SAMPLE).unwrap();
        assert_eq!(catalog.sources.len(), 2);

        let mz = catalog.find("example-news", "MZ").unwrap();
        assert_eq!(mz.language.as_deref(), Some("pt"));
        assert_eq!(mz.base_urls.len(), 2);
        assert_eq!(mz.max_pages, 50);

        let ao = catalog.find("example-news", "AO").unwrap();
        assert_eq!(ao.schedule.as_deref(), Some("0 * * * *"));
        assert!(catalog.find("example-news", "ZA").is_none());
    }

    #[test]
    fn test_empty_catalog() {
        let catalog = SourceCatalog::from_yaml("{}").unwrap();
        assert!(catalog.sources.is_empty());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sources.yaml");
        std::fs::write(&path, SAMPLE).unwrap();

        let catalog = SourceCatalog::load(path.to_str().unwrap()).await.unwrap();
        assert!(catalog.find("example-news", "MZ").is_some());
    }
}
