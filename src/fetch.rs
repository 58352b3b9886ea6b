//! Page fetching with a fixed pause between requests.
//!
//! # Architecture
//!
//! - [`PageFetcher`]: core trait, one HTTP GET returning the body as text
//! - [`HttpFetcher`]: the `reqwest` implementation
//! - [`Throttled`]: decorator that sleeps before every delegated request
//!
//! The harvester only ever talks to a [`Throttled`] fetcher, so the homepage
//! request and every article request are spaced by the configured delay.
//! Requests are issued one at a time; there is no retry within a run.

use crate::errors::FetchError;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

/// Fetch the body of a page as text.
pub trait PageFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// HTTP fetcher backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a client sending `user_agent` and giving up after `timeout`.
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client })
    }
}

impl PageFetcher for HttpFetcher {
    #[instrument(level = "info", skip_all, fields(%url))]
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let t0 = Instant::now();
        let transport = |source| FetchError::Transport {
            url: url.to_string(),
            source,
        };

        let response = self.client.get(url).send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Non-success HTTP status");
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.text().await.map_err(transport)?;

        debug!(
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched page"
        );
        Ok(body)
    }
}

/// Wrapper that pauses for a fixed delay before each request of the inner
/// [`PageFetcher`].
pub struct Throttled<F> {
    inner: F,
    delay: Duration,
}

impl<F> Throttled<F> {
    pub fn new(inner: F, delay: Duration) -> Self {
        Self { inner, delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    #[cfg(test)]
    pub fn inner(&self) -> &F {
        &self.inner
    }
}

impl<F> fmt::Debug for Throttled<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Throttled")
            .field("delay", &self.delay)
            .finish()
    }
}

impl<F: PageFetcher> PageFetcher for Throttled<F> {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        if !self.delay.is_zero() {
            debug!(delay = ?self.delay, "Waiting before request");
            sleep(self.delay).await;
        }
        self.inner.fetch(url).await
    }
}
