//! Data models for harvested articles and run bookkeeping.
//!
//! - [`ArticleRecord`]: one parsed article, the unit of persistence
//! - [`RunSummary`]: per-run counters logged when the harvest finishes

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Constant `source` value stamped on every record.
pub const SOURCE: &str = "lidovky.cz";

/// Placeholder title used when the page has no title-like element.
pub const UNTITLED: &str = "Untitled";

/// A single article as stored on disk.
///
/// Field order is the on-disk key order; serde serializes struct fields in
/// declaration order.
///
/// # JSON Schema
///
/// ```text
/// {
///     "title": "...",
///     "url": "https://www.lidovky.cz/domov/...",
///     "date": "2025-11-04T12:34:56+01:00",
///     "author": "...",
///     "source": "lidovky.cz",
///     "content_snippet": "...",
///     "full_content": "...",
///     "tags": ["...", "..."]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ArticleRecord {
    /// Headline, or [`UNTITLED`].
    pub title: String,
    /// Absolute article URL; the deduplication key.
    pub url: String,
    /// Publication time as declared by the page, else the capture time.
    pub date: DateTime<FixedOffset>,
    /// Byline, or the configured editorial default.
    pub author: String,
    /// Always [`SOURCE`].
    pub source: String,
    /// Truncated body text.
    pub content_snippet: String,
    /// All body paragraphs joined by `\n`. May be empty.
    pub full_content: String,
    /// Tag and category labels in document order.
    pub tags: Vec<String>,
}

/// Counters describing the outcome of one harvest run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Candidate URLs returned by link discovery (after the limit).
    pub discovered: usize,
    /// Records written to new files.
    pub written: usize,
    /// Records whose file already existed.
    pub skipped: usize,
    pub fetch_failed: usize,
    pub parse_failed: usize,
    pub storage_failed: usize,
    /// Aggregate file written in single-file mode.
    pub aggregate: Option<PathBuf>,
}

impl RunSummary {
    /// True when writes were attempted and every one of them failed.
    pub fn all_writes_failed(&self) -> bool {
        self.storage_failed > 0 && self.written == 0 && self.skipped == 0
    }
}
