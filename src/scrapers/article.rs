//! lidovky.cz article parser.
//!
//! Turns the HTML of one article page into an [`ArticleRecord`]. Every field
//! comes from its own [`FieldRule`]; a field the page lacks gets its
//! placeholder and never blocks the others:
//!
//! | Field | Fallback |
//! |-------|----------|
//! | `title` | `"Untitled"` |
//! | `date` | capture time |
//! | `author` | configured default (`"Redakce"`) |
//! | `tags` | empty |
//! | `full_content` | empty |
//! | `content_snippet` | meta description, else empty |
//!
//! Only a document with no content at all is a [`ParseError`].

use super::rules::{
    AuthorRule, BodyRule, DateRule, DescriptionRule, FieldRule, PageContext, TagsRule, TitleRule,
};
use crate::config::RulesFile;
use crate::errors::{ConfigError, ParseError};
use crate::models::{ArticleRecord, SOURCE, UNTITLED};
use crate::utils::truncate_chars;
use chrono::{DateTime, FixedOffset};
use scraper::{Html, Node};
use tracing::{debug, instrument};

/// Separator between paragraphs in `full_content`.
pub const PARAGRAPH_SEPARATOR: &str = "\n";

/// Article page parser built from a [`RulesFile`].
#[derive(Debug, Clone)]
pub struct ArticleParser {
    title: TitleRule,
    date: DateRule,
    author: AuthorRule,
    tags: TagsRule,
    body: BodyRule,
    description: DescriptionRule,
    default_author: String,
    snippet_len: usize,
}

impl ArticleParser {
    pub fn new(rules: &RulesFile) -> Result<Self, ConfigError> {
        Ok(Self {
            title: TitleRule::new(rules)?,
            date: DateRule::new(rules)?,
            author: AuthorRule::new(rules)?,
            tags: TagsRule::new(rules)?,
            body: BodyRule::new(rules)?,
            description: DescriptionRule::new(rules)?,
            default_author: rules.default_author.clone(),
            snippet_len: rules.snippet_len,
        })
    }

    /// Parse one article page fetched from `url` at `fetched_at`.
    ///
    /// # Errors
    ///
    /// [`ParseError`] when the input holds no markup or text at all.
    #[instrument(level = "debug", skip_all, fields(%url))]
    pub fn parse(
        &self,
        html: &str,
        url: &str,
        fetched_at: DateTime<FixedOffset>,
    ) -> Result<ArticleRecord, ParseError> {
        if html.trim().is_empty() {
            return Err(ParseError {
                url: url.to_string(),
                reason: "empty document".to_string(),
            });
        }
        let document = Html::parse_document(html);
        if !has_content(&document) {
            return Err(ParseError {
                url: url.to_string(),
                reason: "document has no elements or text".to_string(),
            });
        }

        let page = PageContext { url, fetched_at };

        let title = self.title.extract(&document, &page);
        let date = self.date.extract(&document, &page);
        let author = self.author.extract(&document, &page);
        let tags = self.tags.extract(&document, &page).unwrap_or_default();
        let paragraphs = self.body.extract(&document, &page).unwrap_or_default();

        debug!(
            url = page.url,
            has_title = title.is_some(),
            has_date = date.is_some(),
            has_author = author.is_some(),
            paragraphs = paragraphs.len(),
            tags = tags.len(),
            "Extracted article fields"
        );

        let full_content = paragraphs.join(PARAGRAPH_SEPARATOR);
        let content_snippet = if full_content.is_empty() {
            self.description.extract(&document, &page).unwrap_or_default()
        } else {
            truncate_chars(&full_content, self.snippet_len)
        };

        Ok(ArticleRecord {
            title: title.unwrap_or_else(|| UNTITLED.to_string()),
            url: url.to_string(),
            date: date.unwrap_or(fetched_at),
            author: author.unwrap_or_else(|| self.default_author.clone()),
            source: SOURCE.to_string(),
            content_snippet,
            full_content,
            tags,
        })
    }
}

/// Whether the parsed tree holds anything beyond the implicit
/// `html`/`head`/`body` skeleton.
fn has_content(document: &Html) -> bool {
    document
        .root_element()
        .descendants()
        .any(|node| match node.value() {
            Node::Element(el) => !matches!(el.name(), "html" | "head" | "body"),
            Node::Text(text) => !text.trim().is_empty(),
            _ => false,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://www.lidovky.cz/domov/vlada-schvalila-rozpocet.A251104_123456_ln_domov_abc";

    fn fetched_at() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2025-11-05T08:00:00+01:00").unwrap()
    }

    fn parser() -> ArticleParser {
        ArticleParser::new(&RulesFile::default()).unwrap()
    }

    const FULL_PAGE: &str = r#"<!DOCTYPE html>
<html lang="cs">
<head>
  <title>Vláda schválila rozpočet - Lidovky.cz</title>
  <meta property="article:published_time" content="2025-11-04T12:34:56+01:00">
  <meta name="author" content="Jan Novák">
  <meta name="description" content="Popis z meta tagu.">
  <meta name="keywords" content="rozpočet, vláda">
</head>
<body>
  <nav><a href="/domov/">Domov</a><p>Navigační text, který je dlouhý, ale patří do menu webu.</p></nav>
  <h1>Vláda schválila rozpočet</h1>
  <div itemprop="articleBody">
    <p>Vláda ve středu schválila návrh státního rozpočtu na příští rok se schodkem.</p>
    <p>Ministr financí uvedl, že deficit se podaří v dalších letech postupně snižovat.</p>
  </div>
  <div class="tags"><a href="/tema/politika">politika</a><a href="/tema/rozpocet">rozpočet</a></div>
</body>
</html>"#;

    #[test]
    fn test_parse_full_page() {
        let record = parser().parse(FULL_PAGE, URL, fetched_at()).unwrap();
        assert_eq!(record.title, "Vláda schválila rozpočet");
        assert_eq!(record.url, URL);
        assert_eq!(record.date.to_rfc3339(), "2025-11-04T12:34:56+01:00");
        assert_eq!(record.author, "Jan Novák");
        assert_eq!(record.source, "lidovky.cz");
        assert_eq!(
            record.full_content,
            "Vláda ve středu schválila návrh státního rozpočtu na příští rok se schodkem.\n\
             Ministr financí uvedl, že deficit se podaří v dalších letech postupně snižovat."
        );
        assert_eq!(record.content_snippet, record.full_content);
        assert_eq!(record.tags, vec!["politika", "rozpočet", "vláda"]);
    }

    #[test]
    fn test_missing_author_uses_default() {
        let html = FULL_PAGE.replace(r#"<meta name="author" content="Jan Novák">"#, "");
        let record = parser().parse(&html, URL, fetched_at()).unwrap();
        assert_eq!(record.author, "Redakce");
    }

    #[test]
    fn test_bare_fragment_uses_all_fallbacks() {
        let record = parser().parse("<div><span>x</span></div>", URL, fetched_at()).unwrap();
        assert_eq!(record.title, UNTITLED);
        assert_eq!(record.date, fetched_at());
        assert_eq!(record.author, "Redakce");
        assert_eq!(record.full_content, "");
        assert_eq!(record.content_snippet, "");
        assert!(record.tags.is_empty());
    }

    #[test]
    fn test_snippet_truncated_with_ellipsis() {
        let long = "Dlouhý odstavec textu bez konce. ".repeat(30);
        let html = format!("<article><h1>T</h1><p>{long}</p></article>");
        let record = parser().parse(&html, URL, fetched_at()).unwrap();
        assert!(record.full_content.chars().count() > 400);
        assert!(record.content_snippet.ends_with('…'));
        assert!(record.content_snippet.chars().count() <= 401);
        assert!(record.full_content.starts_with(record.content_snippet.trim_end_matches('…')));
    }

    #[test]
    fn test_snippet_from_description_when_body_empty() {
        let html = r#"<head><meta name="description" content="Jen popis."></head><body><h1>T</h1></body>"#;
        let record = parser().parse(html, URL, fetched_at()).unwrap();
        assert_eq!(record.full_content, "");
        assert_eq!(record.content_snippet, "Jen popis.");
    }

    #[test]
    fn test_empty_input_is_parse_error() {
        let err = parser().parse("  \n ", URL, fetched_at()).unwrap_err();
        assert_eq!(err.url, URL);
        assert!(parser().parse("<html><head></head><body> </body></html>", URL, fetched_at()).is_err());
    }

    #[test]
    fn test_custom_default_author() {
        let rules = RulesFile {
            default_author: "Redakce Lidovky.cz".to_string(),
            ..RulesFile::default()
        };
        let parser = ArticleParser::new(&rules).unwrap();
        let record = parser.parse("<h1>T</h1>", URL, fetched_at()).unwrap();
        assert_eq!(record.author, "Redakce Lidovky.cz");
    }

    #[test]
    fn test_invalid_rule_selector_rejected() {
        let rules = RulesFile {
            excluded: vec!["[[nope".to_string()],
            ..RulesFile::default()
        };
        assert!(matches!(
            ArticleParser::new(&rules),
            Err(ConfigError::Selector { .. })
        ));
    }
}
