//! Run configuration and the extraction-rule file.
//!
//! [`HarvestConfig`] holds everything a run needs, resolved from the CLI.
//! [`RulesFile`] is the structural filter that tells the scrapers where to
//! look on a page. Its defaults match the current lidovky.cz markup; a YAML
//! file passed with `--config` overrides only the keys it names:
//!
//! ```yaml
//! body_containers:
//!   - 'div.opener + div.bbtext'
//!   - article
//! excluded:
//!   - nav
//!   - '.related-articles'
//! min_paragraph_len: 30
//! ```

use crate::cli::Cli;
use crate::errors::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, instrument};
use url::Url;

/// Homepage the harvest starts from.
pub const HOMEPAGE: &str = "https://www.lidovky.cz/";

/// User-Agent sent with every request unless overridden.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; LidovkyProjectBot/1.0; +https://example.org/bot-info)";

/// Fully resolved settings for one harvest run.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub base_dir: PathBuf,
    pub homepage: Url,
    /// Maximum number of article URLs per run; `0` disables the cap.
    pub limit: usize,
    /// Pause before every outbound request.
    pub delay: Duration,
    pub user_agent: String,
    pub request_timeout: Duration,
    pub single_file: bool,
    pub rules: RulesFile,
}

impl HarvestConfig {
    /// Resolve CLI arguments, loading the rule file when one is given.
    #[instrument(level = "info", skip_all)]
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let rules = match &cli.config {
            Some(path) => RulesFile::load(path)?,
            None => RulesFile::default(),
        };
        Ok(Self {
            base_dir: cli.base_dir.clone(),
            homepage: Url::parse(HOMEPAGE)?,
            limit: cli.limit,
            delay: delay_from_secs(cli.sleep)?,
            user_agent: cli
                .user_agent
                .clone()
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            request_timeout: timeout_from_secs(cli.timeout)?,
            single_file: cli.single_file,
            rules,
        })
    }
}

/// Convert a `--sleep` value into a [`Duration`].
pub fn delay_from_secs(secs: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(secs).map_err(|_| ConfigError::InvalidDelay(secs))
}

/// Convert a `--timeout` value into a [`Duration`]; zero is rejected.
pub fn timeout_from_secs(secs: u64) -> Result<Duration, ConfigError> {
    if secs == 0 {
        return Err(ConfigError::InvalidTimeout);
    }
    Ok(Duration::from_secs(secs))
}

/// A place on the page to read a value from.
///
/// In YAML either a bare selector or a `{ selector, attr }` map. Without
/// `attr` the value is the element's text, except for `<meta>` elements,
/// whose `content` attribute is read.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ProbeSpec {
    Selector(String),
    Attr { selector: String, attr: String },
}

impl ProbeSpec {
    fn attr(selector: &str, attr: &str) -> Self {
        ProbeSpec::Attr {
            selector: selector.to_string(),
            attr: attr.to_string(),
        }
    }

    fn text(selector: &str) -> Self {
        ProbeSpec::Selector(selector.to_string())
    }
}

/// Structural filter for link discovery and article extraction.
///
/// Probe lists are tried in order; the first non-empty value wins.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RulesFile {
    /// Hosts whose links count as the source site.
    pub allowed_hosts: Vec<String>,
    /// Path prefixes of article sections. A link must continue past the
    /// prefix; the bare section page itself is navigation.
    pub article_path_prefixes: Vec<String>,
    pub title: Vec<ProbeSpec>,
    /// Structured date carriers, parsed as ISO-8601-like timestamps.
    pub date: Vec<ProbeSpec>,
    /// Elements holding a human-readable Czech date such as `4. 11. 2025 12:34`.
    pub date_text: Vec<String>,
    pub author: Vec<ProbeSpec>,
    /// Byline used when no author element is present.
    pub default_author: String,
    pub description: Vec<ProbeSpec>,
    /// Tag links; their texts are taken in document order.
    pub tags: Vec<String>,
    /// Comma-separated keyword lists appended after tag links.
    pub keywords: Vec<ProbeSpec>,
    /// Candidate article containers; the first one present is used.
    pub body_containers: Vec<String>,
    /// Paragraph selector inside the container.
    pub paragraph: String,
    /// Paragraphs inside any of these are boilerplate.
    pub excluded: Vec<String>,
    /// Shorter paragraphs (in characters) are dropped as captions or teasers.
    pub min_paragraph_len: usize,
    /// Case-insensitive prefixes marking boilerplate paragraphs.
    pub boilerplate_prefixes: Vec<String>,
    /// Snippet length in characters before the ellipsis.
    pub snippet_len: usize,
}

impl Default for RulesFile {
    fn default() -> Self {
        Self {
            allowed_hosts: vec!["www.lidovky.cz".into(), "lidovky.cz".into()],
            article_path_prefixes: [
                "/domov/",
                "/zahranici/",
                "/byznys/",
                "/kultura/",
                "/sport/",
                "/magazin/",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            title: vec![
                ProbeSpec::text("h1"),
                ProbeSpec::attr(r#"meta[property="og:title"]"#, "content"),
                ProbeSpec::text("title"),
            ],
            date: vec![
                ProbeSpec::attr(r#"meta[property="article:published_time"]"#, "content"),
                ProbeSpec::attr("time[datetime]", "datetime"),
                ProbeSpec::attr(r#"meta[name="pubdate"]"#, "content"),
                ProbeSpec::attr(r#"meta[itemprop="datePublished"]"#, "content"),
            ],
            date_text: vec![".time".into(), "time".into()],
            author: vec![
                ProbeSpec::attr(r#"meta[name="author"]"#, "content"),
                ProbeSpec::text(r#"[itemprop="author"]"#),
                ProbeSpec::text(r#"a[rel="author"]"#),
                ProbeSpec::text(r#"[class*="author"]"#),
            ],
            default_author: "Redakce".into(),
            description: vec![
                ProbeSpec::attr(r#"meta[name="description"]"#, "content"),
                ProbeSpec::attr(r#"meta[property="og:description"]"#, "content"),
            ],
            tags: vec![r#"a[rel~="tag"]"#.into(), ".tags a".into()],
            keywords: vec![ProbeSpec::attr(r#"meta[name="keywords"]"#, "content")],
            body_containers: vec![
                r#"div[itemprop="articleBody"]"#.into(),
                "div.article-body".into(),
                "div#article".into(),
                "article".into(),
                "main article".into(),
            ],
            paragraph: "p".into(),
            excluded: vec![
                "nav".into(),
                "aside".into(),
                "figure".into(),
                "figcaption".into(),
                ".related".into(),
                ".reklama".into(),
            ],
            min_paragraph_len: 40,
            boilerplate_prefixes: vec!["foto".into(), "autor:".into(), "reklama".into()],
            snippet_len: 400,
        }
    }
}

impl RulesFile {
    /// Load a YAML rule file; missing keys keep their defaults.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let rules = Self::from_yaml(&text).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded extraction rules");
        Ok(rules)
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }
}
