//! Web search provider producing traversal seeds

use crate::config::Config;
use crate::error::SearchError;
use crate::parsers::text::collapse_whitespace;
use crate::results::SeedResult;
use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use scraper::Html;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Anything that can turn a query into ranked result URLs
pub trait SearchProvider: Send + Sync {
    /// Up to `count` results, best first
    fn search(
        &self,
        query: &str,
        count: usize,
    ) -> impl Future<Output = Result<Vec<SeedResult>, SearchError>> + Send;
}

/// Brave web search API client
#[derive(Debug, Clone)]
pub struct BraveSearch {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct BraveResponse {
    #[serde(default)]
    web: Option<BraveWeb>,
}

#[derive(Debug, Deserialize)]
struct BraveWeb {
    #[serde(default)]
    results: Vec<BraveResult>,
}

#[derive(Debug, Deserialize)]
struct BraveResult {
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
}

impl BraveSearch {
    pub fn new(api_key: impl Into<String>, endpoint: impl Into<String>, max_results: usize) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                ::log::warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });

        Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            max_results: max_results.max(1),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.api_key.clone(),
            config.search_endpoint.clone(),
            config.max_results,
        )
    }
}

impl SearchProvider for BraveSearch {
    async fn search(&self, query: &str, count: usize) -> Result<Vec<SeedResult>, SearchError> {
        let count = count.clamp(1, self.max_results);
        let count_param = count.to_string();
        ::log::info!("Searching for {:?} ({} results)", query, count);

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query), ("count", count_param.as_str())])
            .header(ACCEPT, "application/json")
            .header("X-Subscription-Token", &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SearchError::Unauthorized(status));
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(SearchError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Status { status, body });
        }

        let body: BraveResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Decode(e.to_string()))?;

        let results: Vec<SeedResult> = body
            .web
            .map(|web| web.results)
            .unwrap_or_default()
            .into_iter()
            .take(count)
            .map(|result| SeedResult {
                url: result.url,
                title: clean_snippet(&result.title),
                description: clean_snippet(&result.description),
            })
            .collect();

        ::log::debug!("Search returned {} results", results.len());
        Ok(results)
    }
}

/// Snippets carry highlight markup and HTML entities; keep only the text
fn clean_snippet(raw: &str) -> String {
    let fragment = Html::parse_fragment(raw);
    let text: String = fragment.root_element().text().collect();
    collapse_whitespace(&text)
}
