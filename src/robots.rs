//! Robots-exclusion politeness gate.
//!
//! Before any page fetch, the crawler asks this module whether the site's
//! published `robots.txt` permits the request. Rules are fetched once per
//! host, parsed into an immutable [`RobotsRules`] record, and held in a
//! bounded least-recently-used cache; a host's rules are only re-fetched
//! after eviction.
//!
//! # Fail-Open Contract
//!
//! [`RobotsGate::is_allowed`] never surfaces an error. If `robots.txt`
//! cannot be fetched or parsed, or the URL itself has no usable host, the
//! gate logs a warning and permits the fetch. Blocking a crawl on an
//! unreadable policy file would punish sites for transient failures.
//!
//! # Matching Semantics
//!
//! Standard robots-exclusion matching: the rule group belonging to the most
//! specific `User-agent` token wins, `*` in patterns matches any run of
//! characters, a trailing `$` anchors at end of path, and between `Allow`
//! and `Disallow` the longest matching pattern takes precedence with
//! `Allow` winning ties.

use lru::LruCache;
use regex::Regex;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};
use url::Url;

/// Hosts whose rules are kept before least-recently-used eviction kicks in.
const ROBOTS_CACHE_CAPACITY: usize = 1024;

/// One compiled `Allow`/`Disallow` line.
#[derive(Debug)]
struct RobotsRule {
    allow: bool,
    /// Original pattern text; its length decides match precedence.
    pattern: String,
    matcher: Regex,
}

/// Rules attached to one or more `User-agent` tokens.
#[derive(Debug)]
struct RuleGroup {
    agents: Vec<String>,
    rules: Vec<RobotsRule>,
}

/// Parsed, immutable robots rules for a single host.
///
/// Created once per host (or once per eviction) and shared behind an `Arc`;
/// never mutated afterwards, so concurrent readers need no coordination.
#[derive(Debug)]
pub struct RobotsRules {
    groups: Vec<RuleGroup>,
}

impl RobotsRules {
    /// Parse `robots.txt` content.
    ///
    /// Unknown directives and malformed lines are skipped. Consecutive
    /// `User-agent` lines share one rule group, per the common convention.
    pub fn parse(content: &str) -> Self {
        let mut groups: Vec<RuleGroup> = Vec::new();
        let mut open_agent_list = false;

        for line in content.lines() {
            // Strip inline comments, then surrounding whitespace.
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let Some((directive, value)) = line.split_once(':') else {
                continue;
            };
            let directive = directive.trim().to_ascii_lowercase();
            let value = value.trim();

            match directive.as_str() {
                "user-agent" => {
                    let token = value.to_ascii_lowercase();
                    if open_agent_list {
                        if let Some(group) = groups.last_mut() {
                            group.agents.push(token);
                            continue;
                        }
                    }
                    groups.push(RuleGroup {
                        agents: vec![token],
                        rules: Vec::new(),
                    });
                    open_agent_list = true;
                }
                "allow" | "disallow" => {
                    open_agent_list = false;
                    // An empty Disallow means "allow everything": no rule.
                    if value.is_empty() {
                        continue;
                    }
                    let Some(group) = groups.last_mut() else {
                        continue;
                    };
                    if let Some(matcher) = compile_pattern(value) {
                        group.rules.push(RobotsRule {
                            allow: directive == "allow",
                            pattern: value.to_string(),
                            matcher,
                        });
                    }
                }
                _ => {
                    open_agent_list = false;
                }
            }
        }

        Self { groups }
    }

    /// A permissive record, used when robots.txt cannot be obtained.
    pub fn allow_all() -> Self {
        Self { groups: Vec::new() }
    }

    /// Evaluate permission for `agent` to fetch `target` (path plus
    /// optional `?query`).
    ///
    /// With no applicable group or no matching rule the answer is allowed.
    pub fn is_allowed(&self, agent: &str, target: &str) -> bool {
        let Some(group) = self.group_for(agent) else {
            return true;
        };

        let mut verdict = true;
        let mut best_len = 0usize;
        for rule in &group.rules {
            if !rule.matcher.is_match(target) {
                continue;
            }
            let len = rule.pattern.len();
            // Longest pattern wins; Allow wins ties.
            if len > best_len || (len == best_len && rule.allow) {
                best_len = len;
                verdict = rule.allow;
            }
        }
        verdict
    }

    /// Pick the group whose agent token most specifically matches `agent`,
    /// falling back to the `*` group.
    fn group_for(&self, agent: &str) -> Option<&RuleGroup> {
        let agent_lower = agent.to_ascii_lowercase();
        let mut best: Option<(&RuleGroup, usize)> = None;
        let mut wildcard: Option<&RuleGroup> = None;

        for group in &self.groups {
            for token in &group.agents {
                if token == "*" {
                    wildcard.get_or_insert(group);
                } else if agent_lower.contains(token.as_str()) {
                    let specific = token.len();
                    if best.map(|(_, len)| specific > len).unwrap_or(true) {
                        best = Some((group, specific));
                    }
                }
            }
        }

        best.map(|(g, _)| g).or(wildcard)
    }
}

/// Compile a robots pattern into an anchored regex: `*` matches any run of
/// characters and a trailing `$` anchors at end of target.
fn compile_pattern(pattern: &str) -> Option<Regex> {
    let (body, anchored) = match pattern.strip_suffix('$') {
        Some(body) => (body, true),
        None => (pattern, false),
    };

    let mut re = String::with_capacity(body.len() + 4);
    re.push('^');
    let mut first = true;
    for part in body.split('*') {
        if !first {
            re.push_str(".*");
        }
        first = false;
        re.push_str(&regex::escape(part));
    }
    if anchored {
        re.push('$');
    }

    match Regex::new(&re) {
        Ok(matcher) => Some(matcher),
        Err(e) => {
            debug!(pattern, error = %e, "Skipping uncompilable robots pattern");
            None
        }
    }
}

/// Per-host robots cache and permission oracle.
///
/// Shares the crawler's `reqwest::Client` (and therefore its connection
/// pool) for the `robots.txt` fetches. Safe for concurrent use: the cache
/// lock is only held for lookups and insertions, never across an await,
/// and cached records are immutable.
pub struct RobotsGate {
    client: reqwest::Client,
    cache: Mutex<LruCache<String, Arc<RobotsRules>>>,
}

impl RobotsGate {
    /// Create a gate with the default cache capacity (1024 hosts).
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_capacity(client, ROBOTS_CACHE_CAPACITY)
    }

    /// Create a gate with an explicit cache capacity.
    pub fn with_capacity(client: reqwest::Client, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity.max(1) is non-zero");
        Self {
            client,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Decide whether `agent` may fetch `url`.
    ///
    /// Never fails: any internal error resolves to `true` with a logged
    /// warning (see the module docs on the fail-open contract).
    pub async fn is_allowed(&self, url: &str, agent: &str) -> bool {
        let parsed = match Url::parse(url) {
            Ok(u) => u,
            Err(e) => {
                warn!(%url, error = %e, "Unparseable URL; failing open");
                return true;
            }
        };
        let Some(host) = parsed.host_str() else {
            warn!(%url, "URL has no host; failing open");
            return true;
        };
        // Keep the port in the cache key so odd-port hosts get their own
        // record, matching how the rules themselves are addressed.
        let authority = match parsed.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        let rules = self.rules_for(&authority).await;

        let mut target = parsed.path().to_string();
        if let Some(q) = parsed.query() {
            target.push('?');
            target.push_str(q);
        }
        rules.is_allowed(agent, &target)
    }

    /// Insert a pre-parsed record for a host, bypassing the network fetch.
    ///
    /// Useful for warm starts and for tests that must not touch the network.
    pub fn seed(&self, authority: &str, rules: RobotsRules) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(authority.to_string(), Arc::new(rules));
        }
    }

    /// Number of hosts currently cached.
    pub fn cached_hosts(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    async fn rules_for(&self, authority: &str) -> Arc<RobotsRules> {
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(rules) = cache.get(authority) {
                return rules.clone();
            }
        }

        let rules = Arc::new(self.fetch_rules(authority).await);

        // Concurrent fetchers for the same host may race here; last write
        // wins and both records are equivalent, so the race is harmless.
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(authority.to_string(), rules.clone());
        }
        rules
    }

    async fn fetch_rules(&self, authority: &str) -> RobotsRules {
        let robots_url = format!("https://{}/robots.txt", authority);
        match self.client.get(&robots_url).send().await {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(body) => {
                    debug!(%robots_url, bytes = body.len(), "Fetched robots.txt");
                    RobotsRules::parse(&body)
                }
                Err(e) => {
                    warn!(%robots_url, error = %e, "Failed reading robots.txt body; failing open");
                    RobotsRules::allow_all()
                }
            },
            Ok(resp) => {
                debug!(%robots_url, status = resp.status().as_u16(), "Non-success robots.txt response; treating as permissive");
                RobotsRules::allow_all()
            }
            Err(e) => {
                warn!(%robots_url, error = %e, "robots.txt unreachable; failing open");
                RobotsRules::allow_all()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> RobotsGate {
        RobotsGate::new(reqwest::Client::new())
    }

    #[test]
    fn test_longest_match_precedence() {
        let rules = RobotsRules::parse(
            "User-agent: *\nDisallow: /private/\nAllow: /private/public/\n",
        );
        assert!(!rules.is_allowed("bot", "/private/secret"));
        assert!(rules.is_allowed("bot", "/private/public/page.html"));
        assert!(rules.is_allowed("bot", "/open/page.html"));
    }

    #[test]
    fn test_wildcard_and_end_anchor() {
        let rules = RobotsRules::parse("User-agent: *\nDisallow: /*.pdf$\n");
        assert!(!rules.is_allowed("bot", "/docs/manual.pdf"));
        assert!(rules.is_allowed("bot", "/docs/manual.pdf?download=1"));
        assert!(rules.is_allowed("bot", "/docs/manual.html"));
    }

    #[test]
    fn test_specific_agent_group_wins_over_wildcard() {
        let rules = RobotsRules::parse(
            "User-agent: *\nDisallow: /\n\nUser-agent: politecrawler\nDisallow: /admin/\n",
        );
        // The specific group applies to our agent: only /admin/ is blocked.
        assert!(rules.is_allowed("politecrawler/0.1", "/news"));
        assert!(!rules.is_allowed("politecrawler/0.1", "/admin/users"));
        // Unrelated agents fall back to the wildcard group.
        assert!(!rules.is_allowed("otherbot", "/news"));
    }

    #[test]
    fn test_empty_disallow_allows_everything() {
        let rules = RobotsRules::parse("User-agent: *\nDisallow:\n");
        assert!(rules.is_allowed("bot", "/anything"));
    }

    #[test]
    fn test_allow_wins_length_ties() {
        let rules = RobotsRules::parse("User-agent: *\nDisallow: /a/\nAllow: /a/\n");
        assert!(rules.is_allowed("bot", "/a/x"));
    }

    #[tokio::test]
    async fn test_fail_open_on_hostless_url() {
        assert!(gate().is_allowed("mailto:someone@example.org", "bot").await);
        assert!(gate().is_allowed("not a url", "bot").await);
    }

    #[tokio::test]
    async fn test_fail_open_when_robots_unreachable() {
        // Port 9 (discard) is closed in practice; the robots fetch fails
        // with a connect error and the gate must still permit the URL.
        let g = gate();
        assert!(g.is_allowed("https://127.0.0.1:9/page", "bot").await);
        // The permissive record is cached like any other.
        assert_eq!(g.cached_hosts(), 1);
    }

    #[tokio::test]
    async fn test_seeded_rules_are_enforced() {
        let g = gate();
        g.seed(
            "example.com",
            RobotsRules::parse("User-agent: *\nDisallow: /private/\n"),
        );
        assert!(!g.is_allowed("https://example.com/private/x", "bot").await);
        assert!(g.is_allowed("https://example.com/public/x", "bot").await);
    }

    #[tokio::test]
    async fn test_cache_evicts_least_recently_used() {
        let g = RobotsGate::with_capacity(reqwest::Client::new(), 2);
        g.seed("a.example", RobotsRules::allow_all());
        g.seed("b.example", RobotsRules::allow_all());
        g.seed("c.example", RobotsRules::allow_all());
        assert_eq!(g.cached_hosts(), 2);
    }
}
