//! Shared browser session management
//!
//! One WebDriver session (one browser process) is shared by every page fetch
//! in the process. It is launched lazily on first use, reused until it is shut
//! down or found to be disconnected, and relaunched on the next acquisition
//! after a disconnect.
//!
//! Each fetch leases its own tab. A WebDriver session has a single focused
//! browsing context, so a lease holds the focus lock until it is released.

use crate::config::BrowserConfig;
use crate::error::SessionError;
use fantoccini::error::CmdError;
use fantoccini::wd::WindowHandle;
use fantoccini::{Client, ClientBuilder};
use serde_json::{Map, Value, json};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Fixed browser startup flags
const BROWSER_ARGS: &[&str] = &[
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--disable-extensions",
    "--disable-notifications",
    "--disable-popup-blocking",
    "--disable-background-networking",
    "--disable-blink-features=AutomationControlled",
    "--no-first-run",
    "--no-default-browser-check",
    "--mute-audio",
    "--window-size=1920,1080",
];

/// Error message fragments that mean the browser session is gone
const LOST_SESSION_MARKERS: &[&str] = &[
    "invalid session id",
    "unable to find session",
    "session deleted",
    "session not created",
    "no such session",
    "chrome not reachable",
    "not connected to devtools",
    "connection refused",
    "webdriver session has been closed",
];

/// Lifecycle of the shared session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing launched yet, or shut down
    Absent,
    /// A launch is in flight
    Initializing,
    /// A session is cached and handed out
    Ready,
    /// The cached session was lost; the next acquisition relaunches
    Disconnected,
}

#[derive(Clone)]
struct Session {
    client: Client,
    /// Window the session started with; kept open so the session survives tab closes
    home: WindowHandle,
    generation: u64,
}

/// Owns the process-wide browser session
pub struct SessionManager {
    config: BrowserConfig,
    session: Mutex<Option<Session>>,
    focus: Arc<Mutex<()>>,
    state: StdMutex<SessionState>,
    generation: AtomicU64,
    closed: AtomicBool,
}

impl SessionManager {
    /// Create a manager; nothing is launched until the first acquisition
    pub fn new(config: BrowserConfig) -> Self {
        Self {
            config,
            session: Mutex::new(None),
            focus: Arc::new(Mutex::new(())),
            state: StdMutex::new(SessionState::Absent),
            generation: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, state: SessionState) {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = state;
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(SessionError::Closed)
        } else {
            Ok(())
        }
    }

    /// WebDriver capabilities used for every launch
    pub fn capabilities(&self) -> Map<String, Value> {
        let mut args: Vec<String> = BROWSER_ARGS.iter().map(|arg| arg.to_string()).collect();
        args.push(format!("--user-agent={}", self.config.user_agent));
        if self.config.headless {
            args.push("--headless=new".to_string());
        }

        let timeout_ms = u64::try_from(self.config.page_timeout.as_millis()).unwrap_or(u64::MAX);

        let mut caps = Map::new();
        caps.insert("browserName".to_string(), json!("chrome"));
        caps.insert("pageLoadStrategy".to_string(), json!("normal"));
        caps.insert(
            "timeouts".to_string(),
            json!({ "pageLoad": timeout_ms, "script": timeout_ms }),
        );
        caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));
        caps
    }

    /// Launch the session if needed without opening a tab
    pub async fn ensure_ready(&self) -> Result<(), SessionError> {
        self.session().await.map(|_| ())
    }

    /// Cached session, launching one if none exists
    ///
    /// The slot lock is held across the launch, so callers arriving meanwhile
    /// wait and then receive the session that launch produced.
    async fn session(&self) -> Result<Session, SessionError> {
        let mut slot = self.session.lock().await;
        if let Some(session) = slot.as_ref() {
            return Ok(session.clone());
        }

        self.ensure_open()?;
        self.set_state(SessionState::Initializing);

        match self.launch().await {
            Ok(session) => {
                *slot = Some(session.clone());
                self.set_state(SessionState::Ready);
                Ok(session)
            }
            Err(e) => {
                ::log::error!("Failed to launch browser session: {}", e);
                self.set_state(SessionState::Absent);
                Err(e)
            }
        }
    }

    async fn launch(&self) -> Result<Session, SessionError> {
        let capabilities = self.capabilities();
        let fallbacks = self
            .config
            .fallback_urls
            .iter()
            .filter(|url| **url != self.config.webdriver_url);

        let mut last_error = None;
        for url in std::iter::once(&self.config.webdriver_url).chain(fallbacks) {
            ::log::info!("Launching browser session via WebDriver at {}", url);

            let mut builder = ClientBuilder::native();
            builder.capabilities(capabilities.clone());
            let client = match builder.connect(url).await {
                Ok(client) => client,
                Err(e) => {
                    ::log::warn!("WebDriver at {} refused a new session: {}", url, e);
                    last_error = Some(e);
                    continue;
                }
            };

            let home = match client.window().await {
                Ok(handle) => handle,
                Err(e) => {
                    if let Err(close_err) = client.close().await {
                        ::log::debug!("Closing half-started session failed: {}", close_err);
                    }
                    return Err(e.into());
                }
            };

            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            ::log::info!("Browser session {} ready at {}", generation, url);
            return Ok(Session {
                client,
                home,
                generation,
            });
        }

        match last_error {
            Some(e) => Err(SessionError::Launch(e)),
            None => Err(SessionError::Closed),
        }
    }

    /// Lease a fresh tab in the shared session
    pub async fn acquire(&self) -> Result<PageLease, SessionError> {
        self.ensure_open()?;
        let focus = Arc::clone(&self.focus).lock_owned().await;
        let session = self.healthy_session().await?;

        let tab = match session.client.new_window(true).await {
            Ok(tab) => tab,
            Err(e) => {
                self.report_failure(session.generation, &e).await;
                return Err(e.into());
            }
        };
        if let Err(e) = session.client.switch_to_window(tab.handle.clone()).await {
            close_tab(&session.client, &tab.handle, &session.home).await;
            self.report_failure(session.generation, &e).await;
            return Err(e.into());
        }

        Ok(PageLease {
            client: session.client,
            tab: tab.handle,
            home: session.home,
            generation: session.generation,
            focus: Some(focus),
        })
    }

    /// Cached session after a liveness check; relaunches once if it is dead
    ///
    /// Must be called with the focus lock held.
    async fn healthy_session(&self) -> Result<Session, SessionError> {
        let session = self.session().await?;
        match session.client.switch_to_window(session.home.clone()).await {
            Ok(()) => Ok(session),
            Err(e) if is_session_lost(&e) => {
                ::log::warn!("Browser session {} is gone ({}), relaunching", session.generation, e);
                self.mark_disconnected(session.generation).await;
                self.session().await
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Inspect a failed command and drop the session if it was lost
    pub async fn report_failure(&self, generation: u64, error: &CmdError) {
        if is_session_lost(error) {
            self.mark_disconnected(generation).await;
        }
    }

    /// Forget the session of the given generation so the next acquisition relaunches
    ///
    /// A newer session launched meanwhile is left alone.
    pub async fn mark_disconnected(&self, generation: u64) {
        let mut slot = self.session.lock().await;
        if slot.as_ref().is_some_and(|s| s.generation == generation) {
            ::log::warn!("Browser session {} disconnected", generation);
            *slot = None;
            self.set_state(SessionState::Disconnected);
        }
    }

    /// Close the browser and refuse further acquisitions
    ///
    /// Safe to call more than once.
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let session = self.session.lock().await.take();
        if let Some(session) = session {
            ::log::info!("Shutting down browser session {}", session.generation);
            if let Err(e) = session.client.close().await {
                ::log::warn!("Failed to close browser session cleanly: {}", e);
            }
        }
        self.set_state(SessionState::Absent);
    }
}

/// Exclusive use of one tab in the shared session
///
/// Call [`PageLease::release`] when done. A lease that is dropped instead
/// closes its tab on a background task and keeps the focus lock until then.
pub struct PageLease {
    client: Client,
    tab: WindowHandle,
    home: WindowHandle,
    generation: u64,
    focus: Option<OwnedMutexGuard<()>>,
}

impl PageLease {
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Generation of the session this tab belongs to
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Close the tab and return focus to the session's home window
    pub async fn release(mut self) {
        let focus = self.focus.take();
        close_tab(&self.client, &self.tab, &self.home).await;
        drop(focus);
    }
}

impl Drop for PageLease {
    fn drop(&mut self) {
        let Some(focus) = self.focus.take() else {
            return;
        };

        ::log::warn!("Page lease dropped without release, closing tab in background");
        let client = self.client.clone();
        let tab = self.tab.clone();
        let home = self.home.clone();
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                close_tab(&client, &tab, &home).await;
                drop(focus);
            });
        }
    }
}

/// Close `tab`, then focus `home`
///
/// Closing acts on the focused window, so nothing is closed unless `tab` could be focused.
async fn close_tab(client: &Client, tab: &WindowHandle, home: &WindowHandle) {
    match client.switch_to_window(tab.clone()).await {
        Ok(()) => {
            if let Err(e) = client.close_window().await {
                ::log::warn!("Failed to close tab: {}", e);
            }
        }
        Err(e) => ::log::warn!("Could not focus tab to close it: {}", e),
    }
    if let Err(e) = client.switch_to_window(home.clone()).await {
        ::log::debug!("Could not return to home window: {}", e);
    }
}

/// Whether a WebDriver failure means the session itself is gone
pub fn is_session_lost(error: &CmdError) -> bool {
    is_session_lost_message(&error.to_string())
}

pub fn is_session_lost_message(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    LOST_SESSION_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
}


#[cfg(test)]
mod tests {
    use super::test_support::{self, error_reply};
    use super::*;
    use mockito::Matcher;
    use std::time::Duration;

    fn browser_config(webdriver_url: &str, headless: bool) -> BrowserConfig {
        BrowserConfig {
            webdriver_url: webdriver_url.to_string(),
            fallback_urls: Vec::new(),
            headless,
            page_timeout: Duration::from_secs(30),
            user_agent: "TestAgent/1.0".to_string(),
        }
    }

    fn chrome_args(caps: &Map<String, Value>) -> Vec<String> {
        caps["goog:chromeOptions"]["args"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_capabilities() {
        let manager = SessionManager::new(browser_config("http://localhost:4444", true));
        let caps = manager.capabilities();

        assert_eq!(caps["browserName"], "chrome");
        assert_eq!(caps["timeouts"]["pageLoad"], 30_000);
        assert_eq!(caps["timeouts"]["script"], 30_000);

        let args = chrome_args(&caps);
        assert!(args.contains(&"--no-sandbox".to_string()));
        assert!(args.contains(&"--headless=new".to_string()));
        assert!(args.contains(&"--user-agent=TestAgent/1.0".to_string()));
    }

    #[test]
    fn test_headful_capabilities() {
        let manager = SessionManager::new(browser_config("http://localhost:4444", false));
        let args = chrome_args(&manager.capabilities());
        assert!(!args.iter().any(|a| a.starts_with("--headless")));
    }

    #[test]
    fn test_lost_session_detection() {
        assert!(is_session_lost_message(
            "webdriver returned error: invalid session id"
        ));
        assert!(is_session_lost_message("Unable to find session with ID abc"));
        assert!(is_session_lost_message("chrome not reachable"));
        assert!(!is_session_lost_message(
            "timeout: Timed out receiving message from renderer"
        ));
        assert!(!is_session_lost_message("no such element"));
        assert!(is_session_lost_message(
            "disconnected: not connected to DevTools"
        ));
        assert!(!is_session_lost_message(
            "unknown error: net::ERR_INTERNET_DISCONNECTED"
        ));
    }

    #[tokio::test]
    async fn test_starts_absent() {
        let manager = SessionManager::new(browser_config("http://127.0.0.1:1", true));
        assert_eq!(manager.state(), SessionState::Absent);
    }

    #[tokio::test]
    async fn test_launch_failure_returns_to_absent() {
        let manager = SessionManager::new(browser_config("http://127.0.0.1:1", true));

        let err = manager.ensure_ready().await.unwrap_err();
        assert!(matches!(err, SessionError::Launch(_)));
        assert_eq!(manager.state(), SessionState::Absent);

        // No retry loop, but a later acquisition tries again
        let err = manager.acquire().await.err().unwrap();
        assert!(matches!(err, SessionError::Launch(_)));
    }

    #[tokio::test]
    async fn test_shutdown_refuses_new_work() {
        let manager = SessionManager::new(browser_config("http://127.0.0.1:1", true));
        manager.shutdown().await;
        manager.shutdown().await;

        assert_eq!(manager.state(), SessionState::Absent);
        assert!(matches!(manager.ensure_ready().await, Err(SessionError::Closed)));
        assert!(matches!(manager.acquire().await, Err(SessionError::Closed)));
    }

    #[tokio::test]
    async fn test_mark_disconnected_without_session_is_noop() {
        let manager = SessionManager::new(browser_config("http://127.0.0.1:1", true));
        manager.mark_disconnected(7).await;
        assert_eq!(manager.state(), SessionState::Absent);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_launch() {
        let mut server = mockito::Server::new_async().await;
        let launches = test_support::new_session(&mut server, 2).await;
        test_support::home_window(&mut server).await;

        let manager = Arc::new(SessionManager::new(browser_config(&server.url(), true)));
        let callers: Vec<_> = (0..6)
            .map(|_| {
                let manager = Arc::clone(&manager);
                tokio::spawn(async move { manager.ensure_ready().await })
            })
            .collect();
        for caller in callers {
            caller.await.unwrap().unwrap();
        }

        assert_eq!(manager.state(), SessionState::Ready);
        assert_eq!(manager.generation.load(Ordering::SeqCst), 1);

        // A stale generation leaves the live session alone
        manager.mark_disconnected(0).await;
        assert_eq!(manager.state(), SessionState::Ready);

        manager.mark_disconnected(1).await;
        assert_eq!(manager.state(), SessionState::Disconnected);

        manager.ensure_ready().await.unwrap();
        manager.ensure_ready().await.unwrap();
        assert_eq!(manager.state(), SessionState::Ready);
        assert_eq!(manager.generation.load(Ordering::SeqCst), 2);

        launches.assert_async().await;
    }

    #[tokio::test]
    async fn test_tab_closed_when_switching_to_it_fails() {
        let mut server = mockito::Server::new_async().await;
        test_support::new_session(&mut server, 1).await;
        test_support::home_window(&mut server).await;
        test_support::new_tab(&mut server, "tab-1").await;

        // First attempt to focus the new tab fails, the retry while closing succeeds
        let refused = server
            .mock("POST", "/session/abc/window")
            .match_body(Matcher::PartialJson(serde_json::json!({ "handle": "tab-1" })))
            .with_status(404)
            .with_header("content-type", "application/json")
            .with_body(error_reply("no such window", "no such window: target window already closed"))
            .expect(1)
            .create_async()
            .await;
        test_support::switch_window(&mut server).await;
        let closed = test_support::close_window(&mut server, 1).await;

        let manager = SessionManager::new(browser_config(&server.url(), true));
        let err = manager.acquire().await.err().unwrap();

        assert!(matches!(err, SessionError::Command(_)));
        refused.assert_async().await;
        closed.assert_async().await;
        // A missing window does not take the session down
        assert_eq!(manager.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_release_closes_tab_and_frees_focus() {
        let mut server = mockito::Server::new_async().await;
        test_support::new_session(&mut server, 1).await;
        test_support::home_window(&mut server).await;
        test_support::new_tab(&mut server, "tab-1").await;
        test_support::switch_window(&mut server).await;
        let closed = test_support::close_window(&mut server, 2).await;

        let manager = SessionManager::new(browser_config(&server.url(), true));
        let lease = manager.acquire().await.unwrap();
        assert_eq!(lease.generation(), 1);
        lease.release().await;

        // Focus was handed back, so a second lease does not wait forever
        let lease = tokio::time::timeout(Duration::from_secs(5), manager.acquire())
            .await
            .unwrap()
            .unwrap();
        lease.release().await;

        closed.assert_async().await;
    }
}
