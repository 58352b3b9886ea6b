//! Text helpers and file system checks shared across the pipeline.
//!
//! - Whitespace cleanup for extracted text
//! - Char-safe truncation for snippets and log lines
//! - Writable-directory probe for the base directory

use once_cell::sync::Lazy;
use regex::Regex;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Marker appended to truncated snippets.
pub const ELLIPSIS: char = '…';

/// Collapse every whitespace run (including newlines and NBSP) to one space
/// and trim both ends.
pub fn clean_text(s: &str) -> String {
    WHITESPACE.replace_all(s, " ").trim().to_string()
}

/// Keep at most `max` characters of `s`, appending [`ELLIPSIS`] when
/// something was cut.
///
/// Counts characters, not bytes, so Czech diacritics never split.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_chars("krátký", 10), "krátký");
/// assert_eq!(truncate_chars("dlouhý text", 6), "dlouhý…");
/// ```
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => {
            let mut out = s[..cut].trim_end().to_string();
            out.push(ELLIPSIS);
            out
        }
    }
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` characters with an ellipsis and
/// a count of the dropped characters appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    let total = s.chars().count();
    if total <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max).collect();
        format!("{}…(+{} chars)", kept, total - max)
    }
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if it doesn't exist, then performs a write test
/// by creating and immediately deleting a probe file.
///
/// # Errors
///
/// Returns an error if:
/// - The directory cannot be created
/// - The directory is not writable (permission denied, read-only filesystem, etc.)
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> std::io::Result<()> {
    fs::create_dir_all(path).await?;
    let probe_path = path.join("..__probe_write__");
    stdfs::File::create(&probe_path)?;
    let _ = stdfs::remove_file(&probe_path);
    info!("Base directory is writable");
    Ok(())
}
