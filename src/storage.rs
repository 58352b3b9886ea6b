//! Date-partitioned JSON storage for harvested articles.
//!
//! # Output Structure
//!
//! ```text
//! <base_dir>/
//! └── data/
//!     └── lidovky/
//!         └── 2025/
//!             └── 11/
//!                 ├── lidovky-20251104-ab12cd34.json
//!                 ├── lidovky-20251104-0f9e8d7c.json
//!                 └── lidovky-aggregate-20251104-130501.json   (--single-file)
//! ```
//!
//! The partition comes from the article's own publication date, in the
//! offset the page declared it with. Files are only ever created, never
//! rewritten: each write goes to a temporary file in the target directory
//! which is then linked into place without clobbering, so readers never
//! observe a half-written document.

use crate::errors::StorageError;
use crate::models::ArticleRecord;
use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, instrument};

/// Filename prefix and directory name of the source.
pub const SOURCE_SLUG: &str = "lidovky";

/// Result of a write attempt that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// A new file was created.
    Written,
    /// The target already existed and was left untouched.
    AlreadyExists,
}

/// Computes article paths under a base directory and writes records there.
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    /// Storage rooted at `<base_dir>/data/lidovky`.
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            root: base_dir.as_ref().join("data").join(SOURCE_SLUG),
        }
    }

    /// The `data/lidovky` directory all partitions live under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Partition directory `<root>/<YYYY>/<MM>` for a timestamp.
    pub fn partition_dir(&self, date: &DateTime<FixedOffset>) -> PathBuf {
        self.root
            .join(date.format("%Y").to_string())
            .join(date.format("%m").to_string())
    }

    /// Full path `<root>/<YYYY>/<MM>/lidovky-<YYYYMMDD>-<id>.json`.
    pub fn path_for(&self, date: &DateTime<FixedOffset>, id: &str) -> PathBuf {
        let filename = format!("{}-{}-{}.json", SOURCE_SLUG, date.format("%Y%m%d"), id);
        self.partition_dir(date).join(filename)
    }

    /// Whether a file is already present at `path`.
    ///
    /// An unreadable location counts as absent; the following write then
    /// reports the underlying problem.
    pub async fn exists(&self, path: &Path) -> bool {
        fs::try_exists(path).await.unwrap_or(false)
    }

    /// Write one record to `path`, creating the partition directories.
    ///
    /// Returns [`WriteOutcome::AlreadyExists`] instead of overwriting when
    /// the file appeared in the meantime.
    #[instrument(level = "debug", skip_all, fields(path = %path.display()))]
    pub async fn write(
        &self,
        path: &Path,
        record: &ArticleRecord,
    ) -> Result<WriteOutcome, StorageError> {
        write_json_atomic(path, record).await
    }

    /// Write every record of the run as one JSON array into the partition of
    /// `now`, named `lidovky-aggregate-<YYYYMMDD>-<HHMMSS>.json`.
    ///
    /// Returns `Ok(None)` without touching the disk when `records` is empty.
    #[instrument(level = "info", skip_all, fields(count = records.len()))]
    pub async fn write_aggregate(
        &self,
        now: &DateTime<FixedOffset>,
        records: &[ArticleRecord],
    ) -> Result<Option<PathBuf>, StorageError> {
        if records.is_empty() {
            return Ok(None);
        }
        let filename = format!(
            "{}-aggregate-{}-{}.json",
            SOURCE_SLUG,
            now.format("%Y%m%d"),
            now.format("%H%M%S")
        );
        let path = self.partition_dir(now).join(filename);
        match write_json_atomic(&path, records).await? {
            WriteOutcome::Written => Ok(Some(path)),
            WriteOutcome::AlreadyExists => Err(StorageError::io(
                &path,
                io::Error::new(io::ErrorKind::AlreadyExists, "aggregate file already exists"),
            )),
        }
    }
}

/// Serialize as 4-space indented UTF-8 JSON.
fn to_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, StorageError> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    buf.push(b'\n');
    Ok(buf)
}

async fn write_json_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<WriteOutcome, StorageError> {
    let parent = path
        .parent()
        .ok_or_else(|| {
            StorageError::io(
                path,
                io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"),
            )
        })?
        .to_path_buf();
    fs::create_dir_all(&parent)
        .await
        .map_err(|e| StorageError::io(&parent, e))?;

    let data = to_json_bytes(value)?;
    let target = path.to_path_buf();

    let outcome = tokio::task::spawn_blocking(move || persist_new(&parent, &target, &data))
        .await
        .map_err(|e| StorageError::io(path, io::Error::other(e)))??;
    debug!(?outcome, "Persisted JSON");
    Ok(outcome)
}

fn persist_new(dir: &Path, target: &Path, data: &[u8]) -> Result<WriteOutcome, StorageError> {
    let mut tmp = tempfile::Builder::new()
        .prefix(".lidovky-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| StorageError::io(dir, e))?;
    tmp.write_all(data)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| StorageError::io(tmp.path(), e))?;

    match tmp.persist_noclobber(target) {
        Ok(_) => Ok(WriteOutcome::Written),
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(WriteOutcome::AlreadyExists),
        Err(e) => Err(StorageError::io(target, e.error)),
    }
}
