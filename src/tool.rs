//! The `deep-search` tool: search, traverse the hits, report

use crate::config::Config;
use crate::crawlers::{Fetcher, TraversalLimits, traverse};
use crate::error::DeepSearchError;
use crate::report::{DEFAULT_MAX_CONTENT_CHARS, ReportFormatter};
use crate::results::{PageData, SeedResult};
use crate::search::SearchProvider;
use crate::utils::clamp_count;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use url::Url;

/// Name the tool is exposed under
pub const TOOL_NAME: &str = "deep-search";

/// What the tool does, as shown to callers choosing a tool
pub const TOOL_DESCRIPTION: &str = "Search the web, then open the top results in a headless \
    browser and follow their links to the requested depth. Returns the readable text of every \
    visited page.";

pub const DEFAULT_RESULTS: usize = 3;
pub const DEFAULT_DEPTH: usize = 1;

/// Arguments accepted by the tool
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeepSearchArgs {
    pub query: String,
    /// Number of search results to visit
    #[serde(default)]
    pub results: Option<i64>,
    /// Link hops to follow, seeds included
    #[serde(default)]
    pub depth: Option<i64>,
}

/// Text handed back to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub text: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }
}

/// Upper bounds applied to every request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeepSearchSettings {
    pub max_results: usize,
    pub max_depth: usize,
    pub max_content_chars: usize,
    pub total_timeout: Option<Duration>,
}

impl Default for DeepSearchSettings {
    fn default() -> Self {
        Self {
            max_results: 10,
            max_depth: 3,
            max_content_chars: DEFAULT_MAX_CONTENT_CHARS,
            total_timeout: None,
        }
    }
}

impl DeepSearchSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_results: config.max_results,
            max_depth: config.max_depth,
            max_content_chars: config.max_content_chars,
            total_timeout: config.total_timeout(),
        }
    }
}

/// A validated request with its limits resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPlan {
    pub query: String,
    pub results: usize,
    pub depth: usize,
    pub max_pages: usize,
}

/// Everything a request gathered before formatting
#[derive(Debug, Clone)]
pub struct Gathered {
    pub plan: SearchPlan,
    pub seeds: Vec<SeedResult>,
    pub pages: Vec<PageData>,
}

/// Deep search over a search provider and a page fetcher
pub struct DeepSearch<S, F> {
    search: S,
    fetcher: F,
    settings: DeepSearchSettings,
}

impl<S: SearchProvider, F: Fetcher> DeepSearch<S, F> {
    pub fn new(search: S, fetcher: F) -> Self {
        Self {
            search,
            fetcher,
            settings: DeepSearchSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: DeepSearchSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Name, description and input schema, as advertised to callers
    pub fn descriptor(&self) -> Value {
        json!({
            "name": TOOL_NAME,
            "description": TOOL_DESCRIPTION,
            "inputSchema": self.input_schema(),
        })
    }

    /// JSON schema of the accepted arguments
    pub fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What to search for"
                },
                "results": {
                    "type": "integer",
                    "description": "Number of search results to visit",
                    "minimum": 1,
                    "maximum": self.settings.max_results,
                    "default": DEFAULT_RESULTS
                },
                "depth": {
                    "type": "integer",
                    "description": "How many levels of links to follow, the results themselves being level 1",
                    "minimum": 1,
                    "maximum": self.settings.max_depth,
                    "default": DEFAULT_DEPTH
                }
            },
            "required": ["query"]
        })
    }

    /// Validate arguments and resolve the request's limits
    pub fn plan(&self, args: &DeepSearchArgs) -> Result<SearchPlan, DeepSearchError> {
        let query = args.query.trim();
        if query.is_empty() {
            return Err(DeepSearchError::InvalidArguments(
                "query must not be empty".to_string(),
            ));
        }

        let results = clamp_count(args.results, DEFAULT_RESULTS, self.settings.max_results);
        let depth = clamp_count(args.depth, DEFAULT_DEPTH, self.settings.max_depth);

        Ok(SearchPlan {
            query: query.to_string(),
            results,
            depth,
            max_pages: results * depth,
        })
    }

    /// Search, then traverse the hits
    pub async fn gather(&self, args: &DeepSearchArgs) -> Result<Gathered, DeepSearchError> {
        let plan = self.plan(args)?;
        ::log::info!(
            "Deep search for {:?}: {} results, depth {}, up to {} pages",
            plan.query,
            plan.results,
            plan.depth,
            plan.max_pages
        );

        let seeds = self.search.search(&plan.query, plan.results).await?;
        let urls = seed_urls(&seeds);

        if urls.is_empty() {
            ::log::info!("No usable search results for {:?}", plan.query);
            return Ok(Gathered {
                plan,
                seeds,
                pages: Vec::new(),
            });
        }

        self.fetcher.prepare().await?;

        let limits = TraversalLimits::new(plan.depth, plan.max_pages)
            .with_deadline(self.settings.total_timeout);
        let pages = traverse(&self.fetcher, &urls, limits).await;

        Ok(Gathered { plan, seeds, pages })
    }

    /// Run a request to completion and render the report
    pub async fn run(&self, args: &DeepSearchArgs) -> Result<String, DeepSearchError> {
        let gathered = self.gather(args).await?;
        let formatter = ReportFormatter::new(self.settings.max_content_chars);
        Ok(formatter.format(&gathered.plan.query, &gathered.pages))
    }

    /// Tool entry point; failures come back as error text, never as `Err`
    pub async fn call(&self, arguments: Value) -> ToolOutput {
        let args: DeepSearchArgs = match serde_json::from_value(arguments) {
            Ok(args) => args,
            Err(e) => return ToolOutput::error(format!("Invalid arguments: {}", e)),
        };

        match self.run(&args).await {
            Ok(report) => ToolOutput::success(report),
            Err(e) => {
                ::log::error!("Deep search for {:?} failed: {}", args.query, e);
                ToolOutput::error(format!("Deep search failed: {}", e))
            }
        }
    }
}

/// Seed URLs in rank order; results without a usable web URL are dropped
fn seed_urls(seeds: &[SeedResult]) -> Vec<Url> {
    seeds
        .iter()
        .filter_map(|seed| match Url::parse(&seed.url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Some(url),
            Ok(url) => {
                ::log::warn!("Ignoring search result with unsupported scheme: {}", url);
                None
            }
            Err(e) => {
                ::log::warn!("Ignoring unparsable search result URL {:?}: {}", seed.url, e);
                None
            }
        })
        .collect()
}
