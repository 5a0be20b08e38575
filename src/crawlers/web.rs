use crate::config::Config;
use crate::crawlers::Fetcher;
use crate::error::{FetchError, SessionError};
use crate::filter::UrlFilter;
use crate::parsers::{ExtractOptions, MIN_CONTENT_CHARS, Parser};
use crate::results::PageData;
use crate::session::{PageLease, SessionManager, is_session_lost};
use fantoccini::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep, timeout};
use url::Url;

/// Extra time allowed past the browser's own page-load timeout before giving up
const NAVIGATION_GRACE: Duration = Duration::from_secs(5);

/// Reports document readiness and how many resources the page has requested so far
const READY_SCRIPT: &str =
    "return [document.readyState, performance.getEntriesByType('resource').length];";

/// How long to wait for a loaded page to stop requesting resources
#[derive(Debug, Clone, Copy)]
struct SettleOptions {
    /// Give up waiting after this long and extract whatever rendered
    max_wait: Duration,
    /// Resource count must stay unchanged this long
    quiet_period: Duration,
    poll_interval: Duration,
}

impl Default for SettleOptions {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_secs(5),
            quiet_period: Duration::from_millis(500),
            poll_interval: Duration::from_millis(250),
        }
    }
}

/// Fetches pages in tabs of the shared browser session
pub struct PageFetcher {
    sessions: Arc<SessionManager>,
    parser: Parser,
    page_timeout: Duration,
    settle: SettleOptions,
}

impl PageFetcher {
    pub fn new(sessions: Arc<SessionManager>, parser: Parser, page_timeout: Duration) -> Self {
        Self {
            sessions,
            parser,
            page_timeout,
            settle: SettleOptions::default(),
        }
    }

    /// Fetcher with the default link filter and the configured link cap
    pub fn from_config(sessions: Arc<SessionManager>, config: &Config) -> Self {
        let options = ExtractOptions {
            max_links: config.max_links_per_page,
            min_content_chars: MIN_CONTENT_CHARS,
        };
        let parser = Parser::new(Arc::new(UrlFilter::default()), options);
        Self::new(sessions, parser, config.page_timeout())
    }

    /// Navigate the leased tab, wait for it to settle and extract it
    async fn visit(&self, lease: &PageLease, url: &Url) -> Result<PageData, FetchError> {
        let client = lease.client();

        match timeout(self.page_timeout + NAVIGATION_GRACE, client.goto(url.as_str())).await {
            Ok(result) => result?,
            Err(_) => return Err(FetchError::Timeout(self.page_timeout)),
        }

        self.wait_for_network_idle(client, url).await?;

        // Links resolve against where the page ended up after redirects
        let location = client.current_url().await?;
        let html = client.source().await?;
        let parsed = self.parser.parse(&html, &location);

        Ok(PageData::new(
            url.to_string(),
            parsed.title,
            parsed.description,
            parsed.content,
            parsed.links,
        ))
    }

    /// Poll until the document is complete and its resource count stops changing
    ///
    /// Running out of time is not an error. Only a lost session aborts the visit.
    async fn wait_for_network_idle(&self, client: &Client, url: &Url) -> Result<(), FetchError> {
        let deadline = Instant::now() + self.settle.max_wait;
        let mut last_count = None;
        let mut quiet_since = Instant::now();

        loop {
            let readiness = match client.execute(READY_SCRIPT, Vec::new()).await {
                Ok(value) => value,
                Err(e) if is_session_lost(&e) => return Err(e.into()),
                Err(e) => {
                    ::log::debug!("Readiness check failed on {}: {}", url, e);
                    return Ok(());
                }
            };

            let now = Instant::now();
            let (complete, resources) = ready_state(&readiness);
            if last_count != Some(resources) {
                last_count = Some(resources);
                quiet_since = now;
            }

            if complete && now.duration_since(quiet_since) >= self.settle.quiet_period {
                return Ok(());
            }
            if now >= deadline {
                ::log::debug!(
                    "{} still loading after {:?}, extracting anyway",
                    url,
                    self.settle.max_wait
                );
                return Ok(());
            }

            sleep(self.settle.poll_interval).await;
        }
    }
}

impl Fetcher for PageFetcher {
    async fn prepare(&self) -> Result<(), SessionError> {
        self.sessions.ensure_ready().await
    }

    async fn fetch(&self, url: &Url) -> PageData {
        let started = std::time::Instant::now();
        ::log::debug!("FETCH: {}", url);

        let lease = match self.sessions.acquire().await {
            Ok(lease) => lease,
            Err(e) => {
                ::log::warn!("No browser tab for {}: {}", url, e);
                return PageData::failed(url.as_str(), e.to_string());
            }
        };
        let generation = lease.generation();

        let outcome = self.visit(&lease, url).await;
        lease.release().await;

        match outcome {
            Ok(page) => {
                ::log::debug!(
                    "Fetched {} in {:.2} seconds ({} links)",
                    url,
                    started.elapsed().as_secs_f64(),
                    page.links.len()
                );
                page
            }
            Err(e) => {
                if let FetchError::Command(cmd) = &e {
                    self.sessions.report_failure(generation, cmd).await;
                }
                ::log::warn!("Failed to fetch {}: {}", url, e);
                PageData::failed(url.as_str(), e.to_string())
            }
        }
    }
}

/// Reads `[readyState, resourceCount]` as returned by the readiness script
fn ready_state(value: &Value) -> (bool, u64) {
    let Some(items) = value.as_array() else {
        return (false, 0);
    };
    let complete = items.first().and_then(Value::as_str) == Some("complete");
    let resources = items.get(1).and_then(Value::as_u64).unwrap_or(0);
    (complete, resources)
}
