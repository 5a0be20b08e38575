//! Error types shared across the crate

use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting is absent or blank
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    /// A setting is present but cannot be interpreted
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },

    /// The configuration file could not be read
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid JSON for `Config`
    #[error("failed to parse config file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors surfaced by the upstream search provider
#[derive(Debug, Error)]
pub enum SearchError {
    /// The provider rejected the API key
    #[error("search provider rejected the API key (HTTP {0})")]
    Unauthorized(reqwest::StatusCode),

    /// The provider is throttling requests
    #[error("search provider rate limit exceeded")]
    RateLimited,

    /// Any other non-success response
    #[error("search provider returned HTTP {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    /// The request never produced a response
    #[error("search request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body did not have the expected shape
    #[error("could not decode search response: {0}")]
    Decode(String),
}

/// Errors raised by the rendering session manager
#[derive(Debug, Error)]
pub enum SessionError {
    /// No WebDriver endpoint accepted a new session
    #[error("failed to launch browser session: {0}")]
    Launch(#[from] fantoccini::error::NewSessionError),

    /// A WebDriver command failed while managing the session
    #[error("browser command failed: {0}")]
    Command(#[from] fantoccini::error::CmdError),

    /// The manager was shut down and accepts no more acquisitions
    #[error("browser session manager has been shut down")]
    Closed,
}

/// Failure while visiting a single page
///
/// Never leaves the page fetcher: it is rendered into the page's `error` field.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("{0}")]
    Command(#[from] fantoccini::error::CmdError),

    #[error("navigation timed out after {0:?}")]
    Timeout(Duration),
}

/// Request-level failures of a deep search
#[derive(Debug, Error)]
pub enum DeepSearchError {
    /// The tool arguments were rejected before any work started
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Session(#[from] SessionError),
}
