//! Chrome page driver over the DevTools protocol.
//!
//! Either launches a local Chrome/Chromium or attaches to a remote one via
//! its DevTools URL. Each session gets its own browser (or, when remote, its
//! own tab) and nothing is shared between sessions.

#[cfg(feature = "browser")]
use std::time::Duration;

use async_trait::async_trait;

#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig, Element, Page};
#[cfg(feature = "browser")]
use futures::StreamExt;
#[cfg(feature = "browser")]
use tokio::task::JoinHandle;
#[cfg(feature = "browser")]
use tokio::time::Instant;
#[cfg(feature = "browser")]
use tracing::{debug, info, warn};

#[cfg(feature = "browser")]
use super::stealth::{stealth_scripts, STEALTH_ARGS};
use super::{PageSession, SessionLauncher, WaitOutcome};
use crate::config::BrowserSettings;
use crate::error::DriverError;

/// How long a fully loaded page may go without the selector before it is
/// reported as missing.
#[cfg(feature = "browser")]
const SELECTOR_SETTLE: Duration = Duration::from_secs(10);

#[cfg(feature = "browser")]
const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[cfg(feature = "browser")]
const READY_STATE_SCRIPT: &str = "document.readyState";

/// Launches Chrome sessions.
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    settings: BrowserSettings,
    language: String,
}

impl ChromeLauncher {
    pub fn new(settings: BrowserSettings) -> Self {
        Self {
            settings,
            language: "en".to_string(),
        }
    }

    /// UI language reported to pages by the stealth layer.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn settings(&self) -> &BrowserSettings {
        &self.settings
    }
}

#[cfg(feature = "browser")]
impl ChromeLauncher {
    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &'static [&'static str] = &[
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/opt/google/chrome/google-chrome",
    ];

    const CHROME_COMMANDS: &'static [&'static str] = &[
        "google-chrome",
        "google-chrome-stable",
        "chromium",
        "chromium-browser",
    ];

    fn find_chrome(&self) -> Result<std::path::PathBuf, DriverError> {
        if let Some(ref path) = self.settings.chrome_path {
            return Ok(path.clone());
        }

        for path in Self::CHROME_PATHS {
            let p = std::path::Path::new(path);
            if p.exists() {
                debug!("Found Chrome at: {}", path);
                return Ok(p.to_path_buf());
            }
        }

        for cmd in Self::CHROME_COMMANDS {
            if let Ok(path) = which::which(cmd) {
                debug!("Found Chrome in PATH: {}", path.display());
                return Ok(path);
            }
        }

        Err(DriverError::Launch(
            "Chrome/Chromium not found; install it or set BROWSER_URL to a remote instance"
                .to_string(),
        ))
    }

    async fn launch_local(&self) -> Result<(Browser, HandlerTask), DriverError> {
        info!("Launching browser (headless={})", self.settings.headless);

        let chrome_path = self.find_chrome()?;
        let mut builder = BrowserConfig::builder().chrome_executable(chrome_path);

        // with_head means NOT headless
        if !self.settings.headless {
            builder = builder.with_head();
        }

        if let Some(ref proxy) = self.settings.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }

        if self.settings.stealth {
            for arg in STEALTH_ARGS {
                builder = builder.arg(*arg);
            }
        }

        for arg in &self.settings.chrome_args {
            builder = builder.arg(arg);
        }

        let config = builder
            .build()
            .map_err(|e| DriverError::Launch(format!("invalid browser config: {}", e)))?;

        let (browser, handler) = Browser::launch(config)
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;

        Ok((browser, HandlerTask::spawn(handler)))
    }

    async fn connect_remote(&self, url: &str) -> Result<(Browser, HandlerTask), DriverError> {
        info!("Connecting to remote browser at {}", url);

        let http_url = url
            .replace("ws://", "http://")
            .replace("wss://", "https://");
        let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

        let resp: serde_json::Value = reqwest::Client::new()
            .get(&version_url)
            .send()
            .await
            .map_err(|e| DriverError::Launch(format!("remote browser unreachable: {}", e)))?
            .json()
            .await
            .map_err(|e| DriverError::Launch(format!("bad browser version info: {}", e)))?;

        let ws_url = resp
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                DriverError::Launch("no webSocketDebuggerUrl in version info".to_string())
            })?;

        debug!("Connecting to WebSocket: {}", ws_url);

        let (browser, handler) = Browser::connect(ws_url)
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;

        Ok((browser, HandlerTask::spawn(handler)))
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl SessionLauncher for ChromeLauncher {
    type Session = ChromeSession;

    async fn launch(&self) -> Result<ChromeSession, DriverError> {
        let remote = self.settings.remote_url.clone();
        let (mut browser, handler) = match remote.as_deref() {
            Some(url) => self.connect_remote(url).await?,
            None => self.launch_local().await?,
        };

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                if remote.is_none() {
                    let _ = browser.close().await;
                }
                return Err(DriverError::Protocol(e.to_string()));
            }
        };

        let stealth = if self.settings.stealth {
            stealth_scripts(&self.language)
        } else {
            Vec::new()
        };

        Ok(ChromeSession {
            browser,
            page,
            _handler: handler,
            remote: remote.is_some(),
            stealth,
        })
    }
}

/// Drives the CDP event loop for one browser connection. Aborted on drop.
#[cfg(feature = "browser")]
struct HandlerTask(JoinHandle<()>);

#[cfg(feature = "browser")]
impl HandlerTask {
    fn spawn(mut handler: chromiumoxide::Handler) -> Self {
        Self(tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        }))
    }
}

#[cfg(feature = "browser")]
impl Drop for HandlerTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// One Chrome tab bound to a single scrape.
///
/// Dropping a session without calling [`PageSession::close`] still kills a
/// locally launched browser process.
#[cfg(feature = "browser")]
pub struct ChromeSession {
    browser: Browser,
    page: Page,
    _handler: HandlerTask,
    remote: bool,
    stealth: Vec<String>,
}

#[cfg(feature = "browser")]
fn protocol(e: chromiumoxide::error::CdpError) -> DriverError {
    DriverError::Protocol(e.to_string())
}

#[cfg(feature = "browser")]
impl ChromeSession {
    async fn ready_state(&self) -> Option<String> {
        self.page
            .evaluate(READY_STATE_SCRIPT.to_string())
            .await
            .ok()
            .and_then(|r| r.into_value::<String>().ok())
    }

    async fn wait_until_ready(&self, deadline: Instant) -> Result<(), DriverError> {
        loop {
            match self.ready_state().await.as_deref() {
                Some("complete") | Some("interactive") => return Ok(()),
                state => debug!("Page ready state: {:?}", state),
            }
            if Instant::now() >= deadline {
                return Err(DriverError::Timeout {
                    operation: "page load".to_string(),
                    after: Duration::ZERO,
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn apply_stealth(&self) {
        for script in &self.stealth {
            if let Err(e) = self.page.evaluate(script.clone()).await {
                debug!("Stealth script injection skipped: {}", e);
            }
        }
    }

    async fn scoped(&self, node: &Element, sub_selector: &str) -> Option<Element> {
        match node.find_element(sub_selector).await {
            Ok(el) => Some(el),
            Err(e) => {
                debug!(selector = sub_selector, "Sub-selector not found: {}", e);
                None
            }
        }
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl PageSession for ChromeSession {
    type Node = Element;

    async fn set_user_agent(&mut self, user_agent: &str) -> Result<(), DriverError> {
        self.page
            .execute(SetUserAgentOverrideParams::new(user_agent.to_string()))
            .await
            .map_err(protocol)?;
        Ok(())
    }

    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), DriverError> {
        info!("Navigating to {}", url);
        let deadline = Instant::now() + timeout;
        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(|e| DriverError::Navigation {
                url: url.to_string(),
                message: e,
            })?;

        let response = match tokio::time::timeout(timeout, self.page.execute(params)).await {
            Ok(result) => result.map_err(|e| DriverError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?,
            Err(_) => {
                return Err(DriverError::Timeout {
                    operation: "navigation".to_string(),
                    after: timeout,
                })
            }
        };

        if let Some(ref error_text) = response.result.error_text {
            return Err(DriverError::Navigation {
                url: url.to_string(),
                message: error_text.clone(),
            });
        }

        self.wait_until_ready(deadline)
            .await
            .map_err(|_| DriverError::Timeout {
                operation: "page load".to_string(),
                after: timeout,
            })?;

        self.apply_stealth().await;
        Ok(())
    }

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<WaitOutcome, DriverError> {
        debug!("Waiting for selector: {}", selector);
        let deadline = Instant::now() + timeout;
        let mut complete_since: Option<Instant> = None;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(WaitOutcome::TimedOut);
            }

            match tokio::time::timeout(remaining, self.page.find_element(selector)).await {
                Ok(Ok(_)) => return Ok(WaitOutcome::Found),
                Ok(Err(_)) => {}
                Err(_) => return Ok(WaitOutcome::TimedOut),
            }

            if self.ready_state().await.as_deref() == Some("complete") {
                let since = *complete_since.get_or_insert_with(Instant::now);
                if since.elapsed() >= SELECTOR_SETTLE {
                    return Ok(WaitOutcome::Missing);
                }
            } else {
                complete_since = None;
            }

            tokio::time::sleep(POLL_INTERVAL.min(remaining)).await;
        }
    }

    async fn query_all(&mut self, selector: &str) -> Result<Vec<Element>, DriverError> {
        match self.page.find_elements(selector).await {
            Ok(elements) => Ok(elements),
            Err(e) => {
                warn!(selector, "Query returned no elements: {}", e);
                Ok(Vec::new())
            }
        }
    }

    async fn extract_text(
        &mut self,
        node: &Element,
        sub_selector: &str,
    ) -> Result<Option<String>, DriverError> {
        let text = if sub_selector.is_empty() {
            node.inner_text().await.ok().flatten()
        } else {
            match self.scoped(node, sub_selector).await {
                Some(el) => el.inner_text().await.ok().flatten(),
                None => None,
            }
        };
        Ok(text)
    }

    async fn extract_attribute(
        &mut self,
        node: &Element,
        sub_selector: &str,
        attribute: &str,
    ) -> Result<Option<String>, DriverError> {
        let value = if sub_selector.is_empty() {
            node.attribute(attribute).await.ok().flatten()
        } else {
            match self.scoped(node, sub_selector).await {
                Some(el) => el.attribute(attribute).await.ok().flatten(),
                None => None,
            }
        };
        Ok(value)
    }

    async fn page_text(&mut self, selector: &str) -> Result<Option<String>, DriverError> {
        match self.page.find_element(selector).await {
            Ok(el) => Ok(el.inner_text().await.ok().flatten()),
            Err(_) => Ok(None),
        }
    }

    async fn close(mut self) -> Result<(), DriverError> {
        if self.remote {
            // Only the tab belongs to us on a shared browser.
            self.page.close().await.map_err(protocol)?;
            return Ok(());
        }

        self.browser.close().await.map_err(protocol)?;
        if let Err(e) = self.browser.wait().await {
            warn!("Browser process did not exit cleanly: {}", e);
        }
        debug!("Browser closed");
        Ok(())
    }
}

/// Placeholder session when browser support is not compiled in.
#[cfg(not(feature = "browser"))]
pub struct ChromeSession {
    _private: (),
}

#[cfg(not(feature = "browser"))]
fn not_compiled() -> DriverError {
    DriverError::Unavailable(
        "browser support not compiled; rebuild with --features browser".to_string(),
    )
}

#[cfg(not(feature = "browser"))]
#[async_trait]
impl SessionLauncher for ChromeLauncher {
    type Session = ChromeSession;

    async fn launch(&self) -> Result<ChromeSession, DriverError> {
        Err(not_compiled())
    }
}

#[cfg(not(feature = "browser"))]
#[async_trait]
impl PageSession for ChromeSession {
    type Node = ();

    async fn set_user_agent(&mut self, _user_agent: &str) -> Result<(), DriverError> {
        Err(not_compiled())
    }

    async fn navigate(&mut self, _url: &str, _timeout: std::time::Duration) -> Result<(), DriverError> {
        Err(not_compiled())
    }

    async fn wait_for_selector(
        &mut self,
        _selector: &str,
        _timeout: std::time::Duration,
    ) -> Result<WaitOutcome, DriverError> {
        Err(not_compiled())
    }

    async fn query_all(&mut self, _selector: &str) -> Result<Vec<()>, DriverError> {
        Err(not_compiled())
    }

    async fn extract_text(&mut self, _node: &(), _sub: &str) -> Result<Option<String>, DriverError> {
        Err(not_compiled())
    }

    async fn extract_attribute(
        &mut self,
        _node: &(),
        _sub: &str,
        _attribute: &str,
    ) -> Result<Option<String>, DriverError> {
        Err(not_compiled())
    }

    async fn page_text(&mut self, _selector: &str) -> Result<Option<String>, DriverError> {
        Err(not_compiled())
    }

    async fn close(self) -> Result<(), DriverError> {
        Ok(())
    }
}
