pub mod config;
pub mod crawlers;
pub mod error;
pub mod filter;
pub mod parsers;
pub mod report;
pub mod results;
pub mod search;
pub mod session;
pub mod tool;
pub mod utils;

// Re-export commonly used types for convenience
pub use config::Config;
pub use error::{ConfigError, DeepSearchError, SearchError, SessionError};
pub use results::{PageData, PageLink, SeedResult};
pub use tool::{DeepSearch, DeepSearchArgs, ToolOutput};

use crawlers::PageFetcher;
use search::BraveSearch;
use session::SessionManager;
use std::sync::Arc;
use tool::DeepSearchSettings;

/// The production tool: Brave search feeding the shared browser session
pub type BrowserDeepSearch = DeepSearch<BraveSearch, PageFetcher>;

/// A ready-to-use tool and the session manager that must be shut down with it
pub struct Service {
    pub tool: BrowserDeepSearch,
    pub sessions: Arc<SessionManager>,
}

impl Service {
    /// Wire search, session and fetcher from configuration
    ///
    /// Nothing is launched until the first request.
    pub fn from_config(config: &Config) -> Self {
        let sessions = Arc::new(SessionManager::new(config.browser()));
        let fetcher = PageFetcher::from_config(Arc::clone(&sessions), config);
        let tool = DeepSearch::new(BraveSearch::from_config(config), fetcher)
            .with_settings(DeepSearchSettings::from_config(config));

        Self { tool, sessions }
    }

    /// Close the browser session
    pub async fn shutdown(&self) {
        self.sessions.shutdown().await;
    }
}
