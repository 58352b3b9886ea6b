//! Per-field extraction rules.
//!
//! Each article field has its own rule type implementing [`FieldRule`], so a
//! markup change on the site means touching one rule and its tests. A rule
//! returns `None` when the page has nothing usable for its field; the
//! [`ArticleParser`](super::article::ArticleParser) applies the fallback.
//!
//! Rules are compiled once from a [`RulesFile`]; an invalid selector is a
//! [`ConfigError`] at startup rather than a per-page failure.

use crate::config::{ProbeSpec, RulesFile};
use crate::errors::ConfigError;
use crate::utils::clean_text;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

static LD_JSON: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).unwrap());

/// `4. 11. 2025 12:34`, `4.11.2025`, `4. listopadu 2025, 12:34`
static CZECH_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(\d{1,2})\.\s*(?:(\d{1,2})\.|(\p{L}+))\s*(\d{4})(?:[\s,]+(?:v\s+)?(\d{1,2}):(\d{2}))?",
    )
    .unwrap()
});

/// What a rule knows about the page besides its markup.
#[derive(Debug, Clone, Copy)]
pub struct PageContext<'a> {
    pub url: &'a str,
    /// Capture time; its offset is assumed for dates printed without one.
    pub fetched_at: DateTime<FixedOffset>,
}

/// Extraction of a single article field.
pub trait FieldRule {
    type Output;

    fn extract(&self, document: &Html, page: &PageContext<'_>) -> Option<Self::Output>;
}

/// Compile a CSS selector, keeping the offending text in the error.
pub fn compile_selector(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector).map_err(|e| ConfigError::Selector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

fn compile_all(selectors: &[String]) -> Result<Vec<Selector>, ConfigError> {
    selectors.iter().map(|s| compile_selector(s)).collect()
}

/// A compiled [`ProbeSpec`].
#[derive(Debug, Clone)]
pub struct Probe {
    selector: Selector,
    attr: Option<String>,
}

impl Probe {
    pub fn compile(spec: &ProbeSpec) -> Result<Self, ConfigError> {
        let (selector, attr) = match spec {
            ProbeSpec::Selector(s) => (s, None),
            ProbeSpec::Attr { selector, attr } => (selector, Some(attr.clone())),
        };
        Ok(Self {
            selector: compile_selector(selector)?,
            attr,
        })
    }

    fn compile_all(specs: &[ProbeSpec]) -> Result<Vec<Self>, ConfigError> {
        specs.iter().map(Self::compile).collect()
    }

    fn value_of(&self, element: ElementRef<'_>) -> Option<String> {
        let raw = match &self.attr {
            Some(attr) => element.value().attr(attr)?.to_string(),
            None if element.value().name() == "meta" => element.value().attr("content")?.to_string(),
            None => element.text().collect::<String>(),
        };
        let cleaned = clean_text(&raw);
        (!cleaned.is_empty()).then_some(cleaned)
    }

    /// Non-empty values of every matching element, in document order.
    pub fn values<'a>(&'a self, document: &'a Html) -> impl Iterator<Item = String> + 'a {
        document
            .select(&self.selector)
            .filter_map(move |el| self.value_of(el))
    }
}

/// First non-empty value over a list of probes.
fn first_value(probes: &[Probe], document: &Html) -> Option<String> {
    probes.iter().find_map(|p| p.values(document).next())
}

/// Headline: `<h1>`, then `og:title`, then `<title>` by default.
#[derive(Debug, Clone)]
pub struct TitleRule {
    probes: Vec<Probe>,
}

impl TitleRule {
    pub fn new(rules: &RulesFile) -> Result<Self, ConfigError> {
        Ok(Self {
            probes: Probe::compile_all(&rules.title)?,
        })
    }
}

impl FieldRule for TitleRule {
    type Output = String;

    fn extract(&self, document: &Html, _page: &PageContext<'_>) -> Option<String> {
        first_value(&self.probes, document)
    }
}

/// Byline from meta tags and author elements, then JSON-LD `author`.
#[derive(Debug, Clone)]
pub struct AuthorRule {
    probes: Vec<Probe>,
}

impl AuthorRule {
    pub fn new(rules: &RulesFile) -> Result<Self, ConfigError> {
        Ok(Self {
            probes: Probe::compile_all(&rules.author)?,
        })
    }
}

impl FieldRule for AuthorRule {
    type Output = String;

    fn extract(&self, document: &Html, _page: &PageContext<'_>) -> Option<String> {
        first_value(&self.probes, document).or_else(|| {
            let names: Vec<String> = json_ld_objects(document)
                .iter()
                .flat_map(|obj| obj.get("author").map(ld_names).unwrap_or_default())
                .unique()
                .collect();
            (!names.is_empty()).then(|| names.join(", "))
        })
    }
}

/// Publication timestamp.
///
/// Tried in order: structured probes, JSON-LD `datePublished`, textual date
/// elements. A candidate that does not parse falls through to the next.
#[derive(Debug, Clone)]
pub struct DateRule {
    probes: Vec<Probe>,
    text: Vec<Selector>,
}

impl DateRule {
    pub fn new(rules: &RulesFile) -> Result<Self, ConfigError> {
        Ok(Self {
            probes: Probe::compile_all(&rules.date)?,
            text: compile_all(&rules.date_text)?,
        })
    }
}

impl FieldRule for DateRule {
    type Output = DateTime<FixedOffset>;

    fn extract(&self, document: &Html, page: &PageContext<'_>) -> Option<Self::Output> {
        let offset = *page.fetched_at.offset();

        let structured = self
            .probes
            .iter()
            .flat_map(|p| p.values(document))
            .find_map(|raw| parse_timestamp(&raw, offset));
        if structured.is_some() {
            return structured;
        }

        let from_ld = json_ld_objects(document).iter().find_map(|obj| {
            obj.get("datePublished")
                .and_then(Value::as_str)
                .and_then(|raw| parse_timestamp(raw, offset))
        });
        if from_ld.is_some() {
            return from_ld;
        }

        self.text.iter().find_map(|sel| {
            document.select(sel).find_map(|el| {
                let text = clean_text(&el.text().collect::<String>());
                parse_czech_date(&text, offset).or_else(|| parse_timestamp(&text, offset))
            })
        })
    }
}

/// Tag link texts in document order, then meta keywords, without duplicates.
#[derive(Debug, Clone)]
pub struct TagsRule {
    links: Vec<Selector>,
    keywords: Vec<Probe>,
}

impl TagsRule {
    pub fn new(rules: &RulesFile) -> Result<Self, ConfigError> {
        Ok(Self {
            links: compile_all(&rules.tags)?,
            keywords: Probe::compile_all(&rules.keywords)?,
        })
    }
}

impl FieldRule for TagsRule {
    type Output = Vec<String>;

    fn extract(&self, document: &Html, _page: &PageContext<'_>) -> Option<Vec<String>> {
        // One combined selection keeps document order across selectors.
        let linked = document
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(|el| self.links.iter().any(|s| s.matches(el)))
            .map(|el| clean_text(&el.text().collect::<String>()));

        let keywords = self.keywords.iter().flat_map(|p| p.values(document)).flat_map(|list| {
            list.split(',')
                .map(|k| k.trim().to_string())
                .collect::<Vec<_>>()
        });

        let tags: Vec<String> = linked
            .chain(keywords)
            .filter(|t| !t.is_empty())
            .unique()
            .collect();
        (!tags.is_empty()).then_some(tags)
    }
}

/// Meta description, used for the snippet when the body is empty.
#[derive(Debug, Clone)]
pub struct DescriptionRule {
    probes: Vec<Probe>,
}

impl DescriptionRule {
    pub fn new(rules: &RulesFile) -> Result<Self, ConfigError> {
        Ok(Self {
            probes: Probe::compile_all(&rules.description)?,
        })
    }
}

impl FieldRule for DescriptionRule {
    type Output = String;

    fn extract(&self, document: &Html, _page: &PageContext<'_>) -> Option<String> {
        first_value(&self.probes, document)
    }
}

/// Body paragraphs from the main article container.
///
/// The first container present outside excluded blocks scopes the search
/// (the whole document when none is). Paragraphs inside excluded boilerplate, shorter than the
/// minimum, or starting with a boilerplate prefix are dropped; repeated
/// paragraphs keep their first occurrence.
#[derive(Debug, Clone)]
pub struct BodyRule {
    containers: Vec<Selector>,
    paragraph: Selector,
    excluded: Vec<Selector>,
    min_len: usize,
    prefixes: Vec<String>,
}

impl BodyRule {
    pub fn new(rules: &RulesFile) -> Result<Self, ConfigError> {
        Ok(Self {
            containers: compile_all(&rules.body_containers)?,
            paragraph: compile_selector(&rules.paragraph)?,
            excluded: compile_all(&rules.excluded)?,
            min_len: rules.min_paragraph_len,
            prefixes: rules
                .boilerplate_prefixes
                .iter()
                .map(|p| p.to_lowercase())
                .collect(),
        })
    }

    fn in_boilerplate(&self, paragraph: ElementRef<'_>, scope: ElementRef<'_>) -> bool {
        std::iter::once(paragraph)
            .chain(
                paragraph
                    .ancestors()
                    .filter_map(ElementRef::wrap)
                    .take_while(|a| a.id() != scope.id()),
            )
            .any(|el| self.excluded.iter().any(|s| s.matches(&el)))
    }

    fn in_excluded_block(&self, container: ElementRef<'_>) -> bool {
        std::iter::once(container)
            .chain(container.ancestors().filter_map(ElementRef::wrap))
            .any(|el| self.excluded.iter().any(|s| s.matches(&el)))
    }

    fn keeps(&self, text: &str) -> bool {
        if text.chars().count() < self.min_len {
            return false;
        }
        let lower = text.to_lowercase();
        !self.prefixes.iter().any(|p| lower.starts_with(p.as_str()))
    }
}

impl FieldRule for BodyRule {
    type Output = Vec<String>;

    fn extract(&self, document: &Html, _page: &PageContext<'_>) -> Option<Vec<String>> {
        let scope = self
            .containers
            .iter()
            .find_map(|sel| document.select(sel).find(|c| !self.in_excluded_block(*c)))
            .unwrap_or_else(|| document.root_element());

        let paragraphs: Vec<String> = scope
            .select(&self.paragraph)
            .filter(|p| !self.in_boilerplate(*p, scope))
            .map(|p| clean_text(&p.text().collect::<String>()))
            .filter(|t| self.keeps(t))
            .unique()
            .collect();
        (!paragraphs.is_empty()).then_some(paragraphs)
    }
}

/// Parse an ISO-8601-like timestamp.
///
/// Accepts RFC 3339, `%z` offsets without a colon, and naive date/time or
/// date-only values, which are placed in `offset`.
pub fn parse_timestamp(raw: &str, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt);
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%dT%H:%M%z", "%Y-%m-%d %H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return offset.from_local_datetime(&naive).single();
        }
    }
    let day = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    offset.from_local_datetime(&day.and_hms_opt(0, 0, 0)?).single()
}

fn czech_month(name: &str) -> Option<u32> {
    let month = match name.to_lowercase().as_str() {
        "ledna" | "leden" => 1,
        "února" | "únor" => 2,
        "března" | "březen" => 3,
        "dubna" | "duben" => 4,
        "května" | "květen" => 5,
        "června" | "červen" => 6,
        "července" | "červenec" => 7,
        "srpna" | "srpen" => 8,
        "září" => 9,
        "října" | "říjen" => 10,
        "listopadu" | "listopad" => 11,
        "prosince" | "prosinec" => 12,
        _ => return None,
    };
    Some(month)
}

/// Parse a Czech textual date found anywhere in `text`, e.g.
/// `aktualizováno 4. listopadu 2025 12:34`. A missing time means midnight.
pub fn parse_czech_date(text: &str, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    let caps = CZECH_DATE.captures(text)?;
    let day: u32 = caps.get(1)?.as_str().parse().ok()?;
    let month = match (caps.get(2), caps.get(3)) {
        (Some(num), _) => num.as_str().parse().ok()?,
        (None, Some(name)) => czech_month(name.as_str())?,
        (None, None) => return None,
    };
    let year: i32 = caps.get(4)?.as_str().parse().ok()?;
    let (hour, minute) = match (caps.get(5), caps.get(6)) {
        (Some(h), Some(m)) => (h.as_str().parse().ok()?, m.as_str().parse().ok()?),
        _ => (0, 0),
    };
    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, 0)?;
    offset.from_local_datetime(&naive).single()
}

/// All JSON-LD objects on the page, with arrays and `@graph` flattened.
fn json_ld_objects(document: &Html) -> Vec<Value> {
    let mut out = Vec::new();
    for script in document.select(&LD_JSON) {
        let text = script.text().collect::<String>();
        if let Ok(value) = serde_json::from_str::<Value>(text.trim()) {
            flatten_ld(value, &mut out);
        }
    }
    out
}

fn flatten_ld(value: Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => items.into_iter().for_each(|v| flatten_ld(v, out)),
        Value::Object(mut map) => {
            if let Some(graph) = map.remove("@graph") {
                flatten_ld(graph, out);
            }
            out.push(Value::Object(map));
        }
        _ => {}
    }
}

/// Names from a JSON-LD `author` value: a string, an object with `name`, or
/// an array of either.
fn ld_names(author: &Value) -> Vec<String> {
    match author {
        Value::Array(arr) => arr.iter().flat_map(ld_names).collect(),
        Value::Object(obj) => obj
            .get("name")
            .and_then(Value::as_str)
            .map(clean_text)
            .filter(|n| !n.is_empty())
            .into_iter()
            .collect(),
        Value::String(s) => {
            let name = clean_text(s);
            if name.is_empty() { vec![] } else { vec![name] }
        }
        _ => vec![],
    }
}
