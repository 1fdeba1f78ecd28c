//! URL canonicalization and content fingerprinting for cross-run dedup.
//!
//! Two pages are considered the same when their canonical URLs match, and a
//! page is considered unchanged when its content fingerprint matches. Both
//! operations are pure and deterministic so they can be compared across
//! processes and crawl runs.
//!
//! # Canonical Form
//!
//! `https://Example.COM/Path/?utm_source=x&b=2&a=1` canonicalizes to
//! `https://example.com/Path?a=1&b=2`: lowercased scheme and host, one
//! trailing path slash removed, tracking parameters dropped, remaining
//! query pairs sorted, fragment discarded.

use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use url::Url;

/// Query parameter names that identify campaigns/clicks rather than content.
static TRACKING_PARAMS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["utm_source", "utm_medium", "utm_campaign", "gclid", "fbclid"]
        .into_iter()
        .collect()
});

/// Reduce a URL to its canonical string form.
///
/// Lowercases the scheme and host, strips a single trailing slash from the
/// path, removes known tracking query parameters, sorts the remaining query
/// pairs lexicographically, and drops any fragment. Blank query values are
/// preserved (`?q=` stays `?q=`).
///
/// Never fails: input that does not parse as an absolute URL with a host is
/// returned trimmed but otherwise untouched, as a best-effort key.
///
/// # Arguments
///
/// * `url` - The URL to canonicalize
///
/// # Returns
///
/// The canonical string. Two URLs differing only by tracking parameters,
/// query order, or host letter case produce identical output.
pub fn canonical(url: &str) -> String {
    let parsed = match Url::parse(url.trim()) {
        Ok(u) => u,
        Err(_) => return url.trim().to_string(),
    };
    let host = match parsed.host_str() {
        Some(h) => h,
        None => return url.trim().to_string(),
    };

    let path = parsed.path();
    let path = path.strip_suffix('/').unwrap_or(path);

    let mut pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| !TRACKING_PARAMS.contains(k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    pairs.sort();

    let query = pairs
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    let mut out = format!("{}://{}", parsed.scheme(), host);
    if let Some(port) = parsed.port() {
        out.push_str(&format!(":{}", port));
    }
    out.push_str(path);
    if !query.is_empty() {
        out.push('?');
        out.push_str(&query);
    }
    out
}

/// Compute a SHA-256 fingerprint of the given text.
///
/// The digest is taken over the UTF-8 bytes and rendered as 64 lowercase
/// hex characters. Stable across platforms and process restarts; used for
/// dedup, not security.
pub fn content_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}
