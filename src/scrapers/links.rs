//! Homepage link discovery.
//!
//! Collects article links from the lidovky.cz homepage. A link counts as an
//! article when, after resolving against the homepage URL and dropping the
//! fragment, it points at an allowed host and its path goes deeper than one
//! of the article section prefixes:
//!
//! ```text
//! https://www.lidovky.cz/domov/vlada-schvalila-rozpocet.A251104_123456_ln_domov_abc   article
//! https://www.lidovky.cz/domov/                                                       section page
//! https://www.lidovky.cz/autori/jan-novak                                             other
//! https://www.idnes.cz/domov/...                                                      other host
//! ```

use crate::config::RulesFile;
use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::{debug, info, instrument};
use url::Url;

static ANCHORS: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

/// Extracts candidate article URLs from the homepage.
#[derive(Debug, Clone)]
pub struct LinkDiscoverer {
    base: Url,
    allowed_hosts: Vec<String>,
    prefixes: Vec<String>,
}

impl LinkDiscoverer {
    pub fn new(base: Url, rules: &RulesFile) -> Self {
        Self {
            base,
            allowed_hosts: rules.allowed_hosts.clone(),
            prefixes: rules.article_path_prefixes.clone(),
        }
    }

    /// Absolute article URLs in first-seen document order, without
    /// duplicates, at most `limit` of them (`0` means no cap).
    ///
    /// A homepage without matching links yields an empty list.
    #[instrument(level = "info", skip_all, fields(limit = limit))]
    pub fn discover_links(&self, html: &str, limit: usize) -> Vec<String> {
        let document = Html::parse_document(html);
        let cap = if limit == 0 { usize::MAX } else { limit };

        let links: Vec<String> = document
            .select(&ANCHORS)
            .filter_map(|a| a.value().attr("href"))
            .filter_map(|href| self.normalize(href))
            .filter(|url| self.is_article(url))
            .map(String::from)
            .unique()
            .take(cap)
            .collect();

        info!(count = links.len(), source = %self.base, "Discovered article URLs");
        debug!(urls = ?links, "lidovky URLs");
        links
    }

    /// Resolve `href` against the homepage, keep it only on an allowed
    /// host, and strip the fragment.
    pub fn normalize(&self, href: &str) -> Option<Url> {
        let href = href.trim();
        if href.is_empty() {
            return None;
        }
        let mut url = self.base.join(href).ok()?;
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        let host = url.host_str()?;
        if !self.allowed_hosts.iter().any(|h| h.eq_ignore_ascii_case(host)) {
            return None;
        }
        url.set_fragment(None);
        Some(url)
    }

    /// Whether the path lies strictly below an article section prefix.
    pub fn is_article(&self, url: &Url) -> bool {
        let path = url.path();
        self.prefixes
            .iter()
            .any(|p| path.starts_with(p.as_str()) && path.len() > p.len())
    }
}
