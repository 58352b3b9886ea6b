//! Harvest orchestration.
//!
//! One run walks the pipeline strictly sequentially:
//!
//! ```text
//! homepage ─fetch─▶ LinkDiscoverer ─▶ for each URL:
//!     fetch ─▶ ArticleParser ─▶ path from (date, id) ─▶ exists? skip : write
//! ```
//!
//! Existence is checked *after* parsing because the partition depends on the
//! publication date the page declares. An already stored article therefore
//! still costs one request, but nothing is ever written twice.
//!
//! Failures of a single article (fetch, parse, storage) are logged and
//! counted in the [`RunSummary`]; only an unreachable homepage ends the run.

use crate::config::HarvestConfig;
use crate::errors::{ConfigError, HarvestError};
use crate::fetch::{PageFetcher, Throttled};
use crate::identity::compute_id;
use crate::models::{ArticleRecord, RunSummary};
use crate::scrapers::article::ArticleParser;
use crate::scrapers::links::LinkDiscoverer;
use crate::storage::{Storage, WriteOutcome};
use crate::utils::truncate_for_log;
use chrono::{DateTime, FixedOffset, Local};
use tracing::{error, info, instrument, warn};
use url::Url;

/// Source of the current time.
pub type Clock = fn() -> DateTime<FixedOffset>;

/// Local wall-clock time with its current UTC offset.
pub fn local_now() -> DateTime<FixedOffset> {
    Local::now().fixed_offset()
}

/// Drives one harvest run over a [`PageFetcher`].
#[derive(Debug)]
pub struct Harvester<F> {
    fetcher: Throttled<F>,
    homepage: Url,
    discoverer: LinkDiscoverer,
    parser: ArticleParser,
    storage: Storage,
    limit: usize,
    single_file: bool,
    clock: Clock,
}

impl<F: PageFetcher> Harvester<F> {
    /// Assemble a harvester from a resolved configuration.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Selector`] if a rule in the configuration does not
    /// compile.
    pub fn new(config: &HarvestConfig, fetcher: F) -> Result<Self, ConfigError> {
        Ok(Self {
            fetcher: Throttled::new(fetcher, config.delay),
            homepage: config.homepage.clone(),
            discoverer: LinkDiscoverer::new(config.homepage.clone(), &config.rules),
            parser: ArticleParser::new(&config.rules)?,
            storage: Storage::new(&config.base_dir),
            limit: config.limit,
            single_file: config.single_file,
            clock: local_now,
        })
    }

    /// Replace the clock used for capture timestamps and aggregate names.
    #[cfg(test)]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Run the pipeline once.
    ///
    /// # Errors
    ///
    /// Only when the homepage cannot be fetched. Everything after discovery
    /// is recovered per article and reported in the returned summary.
    #[instrument(level = "info", skip_all, fields(homepage = %self.homepage))]
    pub async fn run(&self) -> Result<RunSummary, HarvestError> {
        info!(delay = ?self.fetcher.delay(), limit = self.limit, single_file = self.single_file, "Harvest starting");
        let homepage_html = self.fetcher.fetch(self.homepage.as_str()).await?;
        let links = self.discoverer.discover_links(&homepage_html, self.limit);

        let mut summary = RunSummary {
            discovered: links.len(),
            ..Default::default()
        };
        let mut collected = Vec::new();

        for (i, url) in links.iter().enumerate() {
            info!(index = i + 1, total = links.len(), %url, "Processing article");
            let Some(record) = self.fetch_and_parse(url, &mut summary).await else {
                continue;
            };
            if self.single_file {
                collected.push(record);
            } else {
                self.store(&record, &mut summary).await;
            }
        }

        if self.single_file {
            match self.storage.write_aggregate(&(self.clock)(), &collected).await {
                Ok(Some(path)) => {
                    info!(path = %path.display(), count = collected.len(), "Wrote aggregate JSON");
                    summary.written = collected.len();
                    summary.aggregate = Some(path);
                }
                Ok(None) => warn!("No articles to store in the aggregate file"),
                Err(e) => {
                    error!(error = %e, "Failed to write aggregate JSON");
                    summary.storage_failed += 1;
                }
            }
        }

        Ok(summary)
    }

    async fn fetch_and_parse(&self, url: &str, summary: &mut RunSummary) -> Option<ArticleRecord> {
        let html = match self.fetcher.fetch(url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(%url, error = %e, "Article fetch failed; skipping");
                summary.fetch_failed += 1;
                return None;
            }
        };
        let fetched_at = (self.clock)();

        match self.parser.parse(&html, url, fetched_at) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(
                    %url,
                    error = %e,
                    body_preview = %truncate_for_log(&html, 120),
                    "Article parse failed; skipping"
                );
                summary.parse_failed += 1;
                None
            }
        }
    }

    async fn store(&self, record: &ArticleRecord, summary: &mut RunSummary) {
        let id = compute_id(&record.url);
        let path = self.storage.path_for(&record.date, &id);

        if self.storage.exists(&path).await {
            info!(path = %path.display(), "Already stored; skipping duplicate");
            summary.skipped += 1;
            return;
        }

        match self.storage.write(&path, record).await {
            Ok(WriteOutcome::Written) => {
                info!(path = %path.display(), title = %truncate_for_log(&record.title, 80), "Stored article");
                summary.written += 1;
            }
            Ok(WriteOutcome::AlreadyExists) => {
                info!(path = %path.display(), "Already stored; skipping duplicate");
                summary.skipped += 1;
            }
            Err(e) => {
                error!(url = %record.url, error = %e, "Failed to store article");
                summary.storage_failed += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HOMEPAGE, RulesFile};
    use crate::errors::FetchError;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Serves canned pages; unknown URLs answer HTTP 404.
    #[derive(Default)]
    struct StubFetcher {
        pages: HashMap<String, Result<String, u16>>,
        requests: Mutex<Vec<String>>,
    }

    impl StubFetcher {
        fn page(mut self, url: &str, html: &str) -> Self {
            self.pages.insert(url.to_string(), Ok(html.to_string()));
            self
        }

        fn failing(mut self, url: &str, status: u16) -> Self {
            self.pages.insert(url.to_string(), Err(status));
            self
        }
    }

    impl PageFetcher for StubFetcher {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            self.requests.lock().unwrap().push(url.to_string());
            match self.pages.get(url) {
                Some(Ok(html)) => Ok(html.clone()),
                Some(Err(status)) => Err(FetchError::Status {
                    url: url.to_string(),
                    status: *status,
                }),
                None => Err(FetchError::Status {
                    url: url.to_string(),
                    status: 404,
                }),
            }
        }
    }

    fn fixed_now() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2025-11-05T13:05:01+01:00").unwrap()
    }

    fn config(base_dir: &Path) -> HarvestConfig {
        HarvestConfig {
            base_dir: base_dir.to_path_buf(),
            homepage: Url::parse(HOMEPAGE).unwrap(),
            limit: 40,
            delay: Duration::ZERO,
            user_agent: "test".to_string(),
            request_timeout: Duration::from_secs(1),
            single_file: false,
            rules: RulesFile::default(),
        }
    }

    fn article_url(n: usize) -> String {
        format!("https://www.lidovky.cz/domov/clanek-{n}.A25110{n}_100000_ln_domov_x")
    }

    fn homepage(urls: &[String]) -> String {
        let anchors: String = urls
            .iter()
            .map(|u| format!(r#"<a href="{}">odkaz</a>"#, u.trim_start_matches("https://www.lidovky.cz")))
            .collect();
        format!("<html><body><nav><a href=\"/domov/\">Domov</a></nav>{anchors}</body></html>")
    }

    fn article_html(n: usize) -> String {
        format!(
            r#"<html><head>
            <meta property="article:published_time" content="2025-11-0{n}T09:00:00+01:00">
            </head><body><h1>Článek číslo {n}</h1>
            <article><p>Text článku číslo {n}, který je dostatečně dlouhý pro uložení.</p></article>
            </body></html>"#
        )
    }

    fn stub_with_articles(n: usize) -> (StubFetcher, Vec<String>) {
        let urls: Vec<String> = (1..=n).map(article_url).collect();
        let mut stub = StubFetcher::default().page(HOMEPAGE, &homepage(&urls));
        for (i, url) in urls.iter().enumerate() {
            stub = stub.page(url, &article_html(i + 1));
        }
        (stub, urls)
    }

    fn json_files(root: &Path) -> Vec<PathBuf> {
        let mut out = Vec::new();
        let mut stack = vec![root.to_path_buf()];
        while let Some(dir) = stack.pop() {
            let Ok(entries) = std::fs::read_dir(&dir) else { continue };
            for entry in entries {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    stack.push(path);
                } else {
                    out.push(path);
                }
            }
        }
        out.sort();
        out
    }

    #[tokio::test]
    async fn test_run_writes_one_file_per_article() {
        let tmp = tempfile::tempdir().unwrap();
        let (stub, urls) = stub_with_articles(3);
        let harvester = Harvester::new(&config(tmp.path()), stub).unwrap().with_clock(fixed_now);

        let summary = harvester.run().await.unwrap();
        assert_eq!(summary.discovered, 3);
        assert_eq!(summary.written, 3);
        assert_eq!(summary.skipped, 0);

        let expected = harvester
            .storage()
            .root()
            .join("2025/11")
            .join(format!("lidovky-20251101-{}.json", compute_id(&urls[0])));
        assert!(expected.is_file(), "{}", expected.display());
        assert_eq!(json_files(tmp.path()).len(), 3);

        // Homepage first, then every article in discovery order.
        let requests = harvester.fetcher_requests();
        assert_eq!(requests[0], HOMEPAGE);
        assert_eq!(&requests[1..], &urls[..]);
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();

        let (stub, _) = stub_with_articles(3);
        let first = Harvester::new(&config(tmp.path()), stub).unwrap().with_clock(fixed_now);
        first.run().await.unwrap();
        let files_before = json_files(tmp.path());
        let contents_before: Vec<String> = files_before
            .iter()
            .map(|p| std::fs::read_to_string(p).unwrap())
            .collect();

        let (stub, _) = stub_with_articles(3);
        let second = Harvester::new(&config(tmp.path()), stub).unwrap().with_clock(fixed_now);
        let summary = second.run().await.unwrap();

        assert_eq!(summary.written, 0);
        assert_eq!(summary.skipped, 3);
        let files_after = json_files(tmp.path());
        assert_eq!(files_after, files_before);
        let contents_after: Vec<String> = files_after
            .iter()
            .map(|p| std::fs::read_to_string(p).unwrap())
            .collect();
        assert_eq!(contents_after, contents_before);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_isolated() {
        let tmp = tempfile::tempdir().unwrap();
        let (stub, urls) = stub_with_articles(3);
        let stub = stub.failing(&urls[1], 503);
        let harvester = Harvester::new(&config(tmp.path()), stub).unwrap().with_clock(fixed_now);

        let summary = harvester.run().await.unwrap();
        assert_eq!(summary.written, 2);
        assert_eq!(summary.fetch_failed, 1);

        let storage = harvester.storage();
        for (n, url) in [(1, &urls[0]), (3, &urls[2])] {
            let date = DateTime::parse_from_rfc3339(&format!("2025-11-0{n}T09:00:00+01:00")).unwrap();
            assert!(storage.path_for(&date, &compute_id(url)).is_file());
        }
        let date = DateTime::parse_from_rfc3339("2025-11-02T09:00:00+01:00").unwrap();
        assert!(!storage.path_for(&date, &compute_id(&urls[1])).exists());
        assert_eq!(harvester.fetcher_requests().len(), 4);
    }

    #[tokio::test]
    async fn test_unparseable_article_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let (stub, urls) = stub_with_articles(2);
        let stub = stub.page(&urls[0], "   ");
        let harvester = Harvester::new(&config(tmp.path()), stub).unwrap().with_clock(fixed_now);

        let summary = harvester.run().await.unwrap();
        assert_eq!(summary.parse_failed, 1);
        assert_eq!(summary.written, 1);
        assert_eq!(json_files(tmp.path()).len(), 1);
    }

    #[tokio::test]
    async fn test_homepage_failure_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let stub = StubFetcher::default().failing(HOMEPAGE, 500);
        let harvester = Harvester::new(&config(tmp.path()), stub).unwrap();

        let err = harvester.run().await.unwrap_err();
        assert!(matches!(err, HarvestError::Fetch(FetchError::Status { status: 500, .. })));
        assert!(json_files(tmp.path()).is_empty());
    }

    #[tokio::test]
    async fn test_empty_homepage_is_not_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let stub = StubFetcher::default().page(HOMEPAGE, "<html><body><p>Údržba</p></body></html>");
        let harvester = Harvester::new(&config(tmp.path()), stub).unwrap();

        let summary = harvester.run().await.unwrap();
        assert_eq!(summary, RunSummary::default());
    }

    #[tokio::test]
    async fn test_missing_date_falls_back_to_capture_time() {
        let tmp = tempfile::tempdir().unwrap();
        let url = article_url(7);
        let stub = StubFetcher::default()
            .page(HOMEPAGE, &homepage(std::slice::from_ref(&url)))
            .page(&url, "<html><body><h1>Bez data</h1></body></html>");
        let harvester = Harvester::new(&config(tmp.path()), stub).unwrap().with_clock(fixed_now);

        harvester.run().await.unwrap();
        let path = harvester.storage().path_for(&fixed_now(), &compute_id(&url));
        let record: ArticleRecord =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(record.date, fixed_now());
        assert_eq!(record.author, "Redakce");
        assert_eq!(record.full_content, "");
    }

    #[tokio::test]
    async fn test_written_files_match_schema() {
        let tmp = tempfile::tempdir().unwrap();
        let (stub, _) = stub_with_articles(2);
        let harvester = Harvester::new(&config(tmp.path()), stub).unwrap().with_clock(fixed_now);
        harvester.run().await.unwrap();

        let files = json_files(tmp.path());
        assert_eq!(files.len(), 2);
        for path in files {
            let value: serde_json::Value =
                serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
            let obj = value.as_object().unwrap();
            let mut keys: Vec<&str> = obj.keys().map(String::as_str).collect();
            keys.sort();
            assert_eq!(
                keys,
                vec!["author", "content_snippet", "date", "full_content", "source", "tags", "title", "url"]
            );
            for key in ["title", "url", "date", "author", "source", "content_snippet", "full_content"] {
                assert!(obj[key].is_string(), "{key} in {}", path.display());
            }
            assert!(obj["tags"].as_array().unwrap().iter().all(|t| t.is_string()));
            assert!(DateTime::parse_from_rfc3339(obj["date"].as_str().unwrap()).is_ok());
            assert_eq!(obj["source"], "lidovky.cz");
        }
    }

    #[tokio::test]
    async fn test_storage_failures_do_not_abort_run() {
        let tmp = tempfile::tempdir().unwrap();
        // A regular file where the `data` directory should go.
        std::fs::write(tmp.path().join("data"), b"not a directory").unwrap();
        let (stub, urls) = stub_with_articles(3);
        let harvester = Harvester::new(&config(tmp.path()), stub).unwrap().with_clock(fixed_now);

        let summary = harvester.run().await.unwrap();
        assert_eq!(summary.discovered, 3);
        assert_eq!(summary.written, 0);
        assert_eq!(summary.storage_failed, 3);
        assert!(summary.all_writes_failed());

        let requests = harvester.fetcher_requests();
        assert_eq!(requests[0], HOMEPAGE);
        assert_eq!(&requests[1..], &urls[..]);
    }

    #[tokio::test]
    async fn test_single_file_mode_writes_aggregate() {
        let tmp = tempfile::tempdir().unwrap();
        let (stub, urls) = stub_with_articles(3);
        let mut cfg = config(tmp.path());
        cfg.single_file = true;
        let harvester = Harvester::new(&cfg, stub).unwrap().with_clock(fixed_now);

        let summary = harvester.run().await.unwrap();
        let path = summary.aggregate.unwrap();
        assert!(path.ends_with("data/lidovky/2025/11/lidovky-aggregate-20251105-130501.json"));
        assert_eq!(summary.written, 3);
        assert_eq!(json_files(tmp.path()), vec![path.clone()]);

        let records: Vec<ArticleRecord> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let stored: Vec<&str> = records.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(stored, urls.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_limit_bounds_requests() {
        let tmp = tempfile::tempdir().unwrap();
        let (stub, _) = stub_with_articles(5);
        let mut cfg = config(tmp.path());
        cfg.limit = 2;
        let harvester = Harvester::new(&cfg, stub).unwrap().with_clock(fixed_now);

        let summary = harvester.run().await.unwrap();
        assert_eq!(summary.discovered, 2);
        assert_eq!(harvester.fetcher_requests().len(), 3);
    }

    impl Harvester<StubFetcher> {
        fn fetcher_requests(&self) -> Vec<String> {
            self.fetcher.inner().requests.lock().unwrap().clone()
        }
    }
}
