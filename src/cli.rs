//! Command-line interface definitions for the lidovky.cz harvester.
//!
//! The numeric options can also be provided via environment variables, so a
//! scheduler entry only needs the base directory.

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for one harvest run.
///
/// # Examples
///
/// ```sh
/// # Hourly cron entry
/// lidovky_harvest /srv/harvest
///
/// # Fewer articles, slower pace
/// lidovky_harvest /srv/harvest --limit 10 --sleep 2.5
///
/// # One aggregate file per run with custom extraction rules
/// lidovky_harvest /srv/harvest --single-file -c rules.yaml
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Root directory; articles go to <BASE_DIR>/data/lidovky/<YYYY>/<MM>/
    pub base_dir: PathBuf,

    /// Maximum number of homepage links to process (0 = no limit)
    #[arg(short, long, env = "LIDOVKY_LIMIT", default_value_t = 40)]
    pub limit: usize,

    /// Pause in seconds before every HTTP request
    #[arg(short, long, env = "LIDOVKY_SLEEP", default_value_t = 1.0)]
    pub sleep: f64,

    /// Store all articles of the run in one aggregate JSON file
    #[arg(long)]
    pub single_file: bool,

    /// Optional YAML file overriding the extraction rules
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// User-Agent header sent to the site
    #[arg(long, env = "LIDOVKY_USER_AGENT")]
    pub user_agent: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 20)]
    pub timeout: u64,
}
