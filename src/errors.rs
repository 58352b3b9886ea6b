//! Error types for the harvest pipeline.
//!
//! Each stage of a run has its own error type so the orchestrator can decide
//! per stage whether a failure is recovered (skip the article and continue)
//! or fatal (end the run):
//!
//! | Error | Raised by | Recovery |
//! |-------|-----------|----------|
//! | [`FetchError`] | [`crate::fetch`] | Per article: logged and skipped. Fatal for the homepage. |
//! | [`ParseError`] | [`crate::scrapers::article`] | Per article: logged, no record written. |
//! | [`StorageError`] | [`crate::storage`] | Per article: logged, run continues. |
//! | [`ConfigError`] | [`crate::config`] | Fatal at startup. |
//!
//! [`HarvestError`] collects the fatal cases.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure to obtain a page body from the source site.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The HTTP client itself could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Network error, timeout or an unreadable body.
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status.
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },
}

/// The article HTML is unusable beyond recovery.
#[derive(Debug, Error)]
#[error("cannot parse {url}: {reason}")]
pub struct ParseError {
    pub url: String,
    pub reason: String,
}

/// Directory creation, file write or serialization failure.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Invalid run configuration or extraction-rule file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read rule file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid rule file {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid CSS selector `{selector}`: {message}")]
    Selector { selector: String, message: String },

    #[error("request delay must be a finite, non-negative number of seconds (got {0})")]
    InvalidDelay(f64),

    #[error("request timeout must be at least one second")]
    InvalidTimeout,

    #[error("invalid homepage URL: {0}")]
    Homepage(#[from] url::ParseError),
}

/// An error that ends a harvest run before or at the homepage.
///
/// Article-level [`ParseError`]s and [`StorageError`]s never get here; the
/// orchestrator recovers them.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
