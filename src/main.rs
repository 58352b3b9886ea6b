//! # Lidovky Harvest
//!
//! Collects articles from the lidovky.cz homepage and stores each one as a
//! JSON document in a date-partitioned directory tree. Meant to be started
//! hourly by cron or another scheduler; already stored articles are detected
//! on disk and skipped, so repeated runs are idempotent.
//!
//! ## Usage
//!
//! ```sh
//! lidovky_harvest /srv/harvest --limit 40 --sleep 1.0
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture:
//! 1. **Discovery**: Fetch the homepage and pick article links
//! 2. **Fetching**: Download each article, one request at a time with a pause before each
//! 3. **Extraction**: Parse title, date, author, tags and body text
//! 4. **Output**: Write `data/lidovky/<YYYY>/<MM>/lidovky-<YYYYMMDD>-<hash8>.json` unless present

use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod errors;
mod fetch;
mod harvest;
mod identity;
mod models;
mod scrapers;
mod storage;
mod utils;

use cli::Cli;
use config::HarvestConfig;
use errors::HarvestError;
use fetch::HttpFetcher;
use harvest::Harvester;
use utils::ensure_writable_dir;

fn build_harvester(config: &HarvestConfig) -> Result<Harvester<HttpFetcher>, HarvestError> {
    let fetcher = HttpFetcher::new(&config.user_agent, config.request_timeout)?;
    Ok(Harvester::new(config, fetcher)?)
}

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("lidovky_harvest starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let config = match HarvestConfig::from_cli(&args) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };

    // Storage failures are handled per article; this only makes an
    // unwritable base directory visible up front.
    if let Err(e) = ensure_writable_dir(&config.base_dir).await {
        warn!(
            path = %config.base_dir.display(),
            error = %e,
            "Base directory is not writable; article writes will fail"
        );
    }

    let harvester = match build_harvester(&config) {
        Ok(harvester) => harvester,
        Err(e) => {
            error!(error = %e, "Failed to set up harvester");
            return Err(e.into());
        }
    };

    let summary = match harvester.run().await {
        Ok(summary) => summary,
        Err(e) => {
            error!(error = %e, "Harvest aborted");
            return Err(e.into());
        }
    };

    info!(
        discovered = summary.discovered,
        written = summary.written,
        skipped = summary.skipped,
        fetch_failed = summary.fetch_failed,
        parse_failed = summary.parse_failed,
        storage_failed = summary.storage_failed,
        aggregate = ?summary.aggregate,
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "Harvest finished"
    );
    if summary.all_writes_failed() {
        error!(
            path = %harvester.storage().root().display(),
            failures = summary.storage_failed,
            "Every write failed; check the base directory"
        );
    }

    Ok(())
}
