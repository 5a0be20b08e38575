use serde::{Deserialize, Serialize};

/// Title given to pages that could not be loaded
pub const FAILED_PAGE_TITLE: &str = "Error loading page";

/// One hit returned by the search provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedResult {
    pub url: String,
    pub title: String,
    pub description: String,
}

/// An outbound link found on a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLink {
    /// Absolute URL, fragment removed
    pub url: String,

    /// Visible anchor text, whitespace-normalized
    pub text: String,
}

/// Represents a visited page with its extracted content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageData {
    /// URL that was requested
    pub url: String,

    /// Declared document title (empty when the page has none)
    pub title: String,

    /// Meta or Open Graph description (empty when absent)
    pub description: String,

    /// Main content text
    pub content: String,

    /// Links discovered on the page, in document order
    pub links: Vec<PageLink>,

    /// Why the page could not be visited, if it failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PageData {
    /// Create a page that was visited successfully
    pub fn new(
        url: String,
        title: String,
        description: String,
        content: String,
        links: Vec<PageLink>,
    ) -> Self {
        Self {
            url,
            title,
            description,
            content,
            links,
            error: None,
        }
    }

    /// Create the placeholder recorded for a page that failed to load
    pub fn failed(url: impl Into<String>, error: impl Into<String>) -> Self {
        let mut error = error.into();
        if error.trim().is_empty() {
            error = "unknown error".to_string();
        }
        Self {
            url: url.into(),
            title: FAILED_PAGE_TITLE.to_string(),
            description: String::new(),
            content: String::new(),
            links: Vec::new(),
            error: Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
