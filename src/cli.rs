//! Command-line interface definitions.
//!
//! Two modes mirror the two ways the crawler is driven:
//! - `urls`: fetch explicit URLs once, ad hoc
//! - `run`: crawl a configured source from the YAML catalog, optionally
//!   persisting raw pages and curated article batches

use clap::{Parser, Subcommand};

/// Command-line arguments for the crawler.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch specific URLs
    Urls {
        /// One or more URLs to fetch
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Run a configured source from the sources catalog
    Run {
        /// Source name from the catalog
        #[arg(long)]
        source: String,

        /// Country code (e.g. MZ)
        #[arg(long)]
        country: String,

        /// Max pages to crawl from the source's base URLs
        #[arg(long, default_value_t = 50)]
        max_pages: usize,

        /// Write raw HTML to the storage backend
        #[arg(long)]
        write_raw: bool,

        /// Path to the sources catalog
        #[arg(long, env = "SOURCES_CONFIG", default_value = "config/sources.yaml")]
        catalog: String,

        /// Root directory for the storage backend; storage is disabled
        /// when unset
        #[arg(long, env = "STORAGE_ROOT")]
        storage_dir: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_subcommand() {
        let cli = Cli::parse_from(["polite_crawler", "urls", "https://example.com/a"]);
        match cli.command {
            Command::Urls { urls } => assert_eq!(urls, vec!["https://example.com/a"]),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_run_subcommand_defaults() {
        let cli = Cli::parse_from([
            "polite_crawler",
            "run",
            "--source",
            "example-news",
            "--country",
            "MZ",
        ]);
        match cli.command {
            Command::Run {
                source,
                country,
                max_pages,
                write_raw,
                catalog,
                ..
            } => {
                assert_eq!(source, "example-news");
                assert_eq!(country, "MZ");
                assert_eq!(max_pages, 50);
                assert!(!write_raw);
                assert_eq!(catalog, "config/sources.yaml");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_run_subcommand_flags() {
        let cli = Cli::parse_from([
            "polite_crawler",
            "run",
            "--source",
            "example-news",
            "--country",
            "MZ",
            "--max-pages",
            "10",
            "--write-raw",
            "--storage-dir",
            "/tmp/crawl",
        ]);
        match cli.command {
            Command::Run {
                max_pages,
                write_raw,
                storage_dir,
                ..
            } => {
                assert_eq!(max_pages, 10);
                assert!(write_raw);
                assert_eq!(storage_dir.as_deref(), Some("/tmp/crawl"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
