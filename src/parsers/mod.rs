pub mod html;
pub mod text;


use crate::filter::UrlFilter;
use crate::results::PageLink;
use std::sync::Arc;
use url::Url;

/// Minimum normalized length for a semantic container to count as main content
pub const MIN_CONTENT_CHARS: usize = 100;

/// Default cap on the number of links kept from one page
pub const DEFAULT_MAX_LINKS: usize = 50;

/// Tunables for content extraction
#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions {
    /// Links beyond this many are dropped
    pub max_links: usize,
    /// Threshold a selector match must exceed to be chosen
    pub min_content_chars: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            max_links: DEFAULT_MAX_LINKS,
            min_content_chars: MIN_CONTENT_CHARS,
        }
    }
}

/// Result of extracting a rendered document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseResult {
    pub title: String,
    pub description: String,
    /// Main content text
    pub content: String,
    /// Filtered, deduplicated outbound links
    pub links: Vec<PageLink>,
}

/// Extracts pages with a fixed link filter and options
#[derive(Debug, Clone)]
pub struct Parser {
    filter: Arc<UrlFilter>,
    options: ExtractOptions,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new(Arc::new(UrlFilter::default()), ExtractOptions::default())
    }
}

impl Parser {
    pub fn new(filter: Arc<UrlFilter>, options: ExtractOptions) -> Self {
        Self { filter, options }
    }

    /// Parse serialized HTML located at `base_url`
    pub fn parse(&self, content: &str, base_url: &Url) -> ParseResult {
        html::parse(content, base_url, &self.filter, &self.options)
    }
}
