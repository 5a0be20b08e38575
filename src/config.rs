use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

/// Environment variable carrying the search API key
pub const ENV_API_KEY: &str = "BRAVE_API_KEY";
/// Environment variable toggling headless rendering
pub const ENV_HEADLESS: &str = "HEADLESS";
/// Environment variable with the page timeout in milliseconds
pub const ENV_PAGE_TIMEOUT: &str = "PAGE_TIMEOUT";
/// Environment variable toggling debug logging
pub const ENV_DEBUG: &str = "DEBUG";
/// Environment variable overriding the WebDriver endpoint
pub const ENV_WEBDRIVER_URL: &str = "WEBDRIVER_URL";
/// Environment variable overriding the search endpoint
pub const ENV_SEARCH_ENDPOINT: &str = "SEARCH_ENDPOINT";

/// Runtime configuration for the deep search service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// API key for the search provider
    #[serde(default)]
    pub api_key: String,

    /// Whether the browser runs without a window
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Navigation timeout per page, in milliseconds
    #[serde(default = "default_page_timeout_ms")]
    pub page_timeout_ms: u64,

    /// Enables debug-level logging
    #[serde(default)]
    pub debug: bool,

    /// URL of the WebDriver server that hosts the browser
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// Search provider endpoint
    #[serde(default = "default_search_endpoint")]
    pub search_endpoint: String,

    /// Upper bound for the number of search results requested
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Upper bound for the link-following depth
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Maximum number of outbound links kept per page
    #[serde(default = "default_max_links_per_page")]
    pub max_links_per_page: usize,

    /// Characters of main text shown per page in the report
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,

    /// Optional wall-clock budget for one traversal, in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_timeout_secs: Option<u64>,

    /// Client identification string sent by the browser
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Settings the session manager needs to launch and drive the browser
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    pub webdriver_url: String,
    pub fallback_urls: Vec<String>,
    pub headless: bool,
    pub page_timeout: Duration,
    pub user_agent: String,
}

fn default_headless() -> bool {
    true
}

fn default_page_timeout_ms() -> u64 {
    30_000
}

/// Default value for webdriver_url
fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_search_endpoint() -> String {
    "https://api.search.brave.com/res/v1/web/search".to_string()
}

fn default_max_results() -> usize {
    10
}

fn default_max_depth() -> usize {
    3
}

fn default_max_links_per_page() -> usize {
    50
}

fn default_max_content_chars() -> usize {
    2000
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            headless: default_headless(),
            page_timeout_ms: default_page_timeout_ms(),
            debug: false,
            webdriver_url: default_webdriver_url(),
            search_endpoint: default_search_endpoint(),
            max_results: default_max_results(),
            max_depth: default_max_depth(),
            max_links_per_page: default_max_links_per_page(),
            max_content_chars: default_max_content_chars(),
            total_timeout_secs: None,
            user_agent: default_user_agent(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, then apply environment overrides
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let mut config: Self = serde_json::from_str(&contents)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Build configuration purely from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_env(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay every recognised variable that `lookup` provides
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(ENV_API_KEY) {
            self.api_key = key.trim().to_string();
        }
        if let Some(value) = lookup(ENV_HEADLESS) {
            self.headless = parse_bool(ENV_HEADLESS, &value)?;
        }
        if let Some(value) = lookup(ENV_PAGE_TIMEOUT) {
            self.page_timeout_ms = value.trim().parse().map_err(|_| ConfigError::Invalid {
                key: ENV_PAGE_TIMEOUT,
                value: value.clone(),
            })?;
        }
        if let Some(value) = lookup(ENV_DEBUG) {
            self.debug = parse_bool(ENV_DEBUG, &value)?;
        }
        if let Some(url) = lookup(ENV_WEBDRIVER_URL) {
            if !url.trim().is_empty() {
                self.webdriver_url = url.trim().to_string();
            }
        }
        if let Some(endpoint) = lookup(ENV_SEARCH_ENDPOINT) {
            if !endpoint.trim().is_empty() {
                self.search_endpoint = endpoint.trim().to_string();
            }
        }
        Ok(())
    }

    /// Check the invariants startup depends on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::Missing(ENV_API_KEY));
        }
        if self.page_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                key: ENV_PAGE_TIMEOUT,
                value: self.page_timeout_ms.to_string(),
            });
        }
        if self.max_results == 0 {
            return Err(ConfigError::Invalid {
                key: "max_results",
                value: self.max_results.to_string(),
            });
        }
        if self.max_depth == 0 {
            return Err(ConfigError::Invalid {
                key: "max_depth",
                value: self.max_depth.to_string(),
            });
        }
        Ok(())
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_millis(self.page_timeout_ms)
    }

    pub fn total_timeout(&self) -> Option<Duration> {
        self.total_timeout_secs.map(Duration::from_secs)
    }

    /// Settings handed to the session manager
    pub fn browser(&self) -> BrowserConfig {
        BrowserConfig {
            webdriver_url: self.webdriver_url.clone(),
            fallback_urls: vec!["http://localhost:9515".to_string()],
            headless: self.headless,
            page_timeout: self.page_timeout(),
            user_agent: self.user_agent.clone(),
        }
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_from_env() {
        let config = Config::from_lookup(lookup(&[(ENV_API_KEY, "secret")])).unwrap();
        assert_eq!(config.api_key, "secret");
        assert!(config.headless);
        assert_eq!(config.page_timeout_ms, 30_000);
        assert!(!config.debug);
        assert_eq!(config.webdriver_url, "http://localhost:4444");
        assert_eq!(config.max_results, 10);
        assert_eq!(config.max_depth, 3);
    }

    #[test]
    fn test_missing_api_key_is_fatal() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(ENV_API_KEY)));

        let err = Config::from_lookup(lookup(&[(ENV_API_KEY, "   ")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::from_lookup(lookup(&[
            (ENV_API_KEY, "k"),
            (ENV_HEADLESS, "false"),
            (ENV_PAGE_TIMEOUT, "5000"),
            (ENV_DEBUG, "YES"),
            (ENV_WEBDRIVER_URL, "http://127.0.0.1:9515"),
        ]))
        .unwrap();
        assert!(!config.headless);
        assert_eq!(config.page_timeout(), Duration::from_secs(5));
        assert!(config.debug);
        assert_eq!(config.webdriver_url, "http://127.0.0.1:9515");
        assert_eq!(config.browser().webdriver_url, "http://127.0.0.1:9515");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = Config::from_lookup(lookup(&[(ENV_API_KEY, "k"), (ENV_HEADLESS, "maybe")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: ENV_HEADLESS, .. }));

        let err = Config::from_lookup(lookup(&[(ENV_API_KEY, "k"), (ENV_PAGE_TIMEOUT, "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: ENV_PAGE_TIMEOUT, .. }));

        let err = Config::from_lookup(lookup(&[(ENV_API_KEY, "k"), (ENV_PAGE_TIMEOUT, "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_json_defaults() {
        let config: Config = serde_json::from_str(r#"{"api_key": "abc", "max_depth": 2}"#).unwrap();
        assert_eq!(config.api_key, "abc");
        assert_eq!(config.max_depth, 2);
        assert_eq!(config.max_links_per_page, 50);
        assert!(config.total_timeout().is_none());
    }
}
