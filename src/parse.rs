//! Title and visible-text extraction from HTML.
//!
//! This is the content-extraction collaborator consumed by the result
//! assembler. It is deliberately simple: the first non-empty `<title>` and
//! the whitespace-joined visible body text, with script and style content
//! skipped. Heavier readability heuristics plug in behind the same
//! [`Extracted`] shape.

use once_cell::sync::Lazy;
use scraper::{Html, Selector};

static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("title").expect("static selector"));
static BODY_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("body").expect("static selector"));
static SKIP_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("script, style, noscript").expect("static selector"));

/// Extracted page content. Both fields are `None` when nothing usable was
/// found.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extracted {
    pub title: Option<String>,
    pub text: Option<String>,
}

/// Extract the title and visible text from an HTML document.
///
/// Never fails: malformed HTML is parsed permissively, and a document with
/// no title or no visible text simply yields `None` for those fields.
pub fn extract(html: &str) -> Extracted {
    let document = Html::parse_document(html);

    let title = document
        .select(&TITLE_SELECTOR)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .find(|t| !t.is_empty());

    // Collect text under <body>, skipping script/style/noscript subtrees.
    let skipped: Vec<_> = document.select(&SKIP_SELECTOR).map(|el| el.id()).collect();
    let mut parts: Vec<String> = Vec::new();
    for body in document.select(&BODY_SELECTOR) {
        for node in body.descendants() {
            if let Some(text) = node.value().as_text() {
                let inside_skipped = node
                    .ancestors()
                    .any(|a| skipped.contains(&a.id()));
                if inside_skipped {
                    continue;
                }
                let piece = text.trim();
                if !piece.is_empty() {
                    parts.push(piece.to_string());
                }
            }
        }
    }

    let text = {
        let joined = parts.join(" ");
        let joined = joined.trim();
        if joined.is_empty() {
            None
        } else {
            Some(joined.to_string())
        }
    };

    Extracted { title, text }
}
