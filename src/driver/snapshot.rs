//! In-memory page driver over saved HTML.
//!
//! Serves pre-recorded search result pages instead of driving a browser.
//! Used for offline selector checks (`pricescout search --html`) and by the
//! test suite, which also uses it to simulate navigation failures and
//! selector timeouts.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::{PageSession, SessionLauncher, WaitOutcome};
use crate::error::DriverError;
use crate::normalize::clean_text;

/// How snapshot sessions respond.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SnapshotBehavior {
    /// Serve the configured pages.
    #[default]
    Serve,
    /// Fail to launch, as if the browser binary were missing.
    LaunchError(String),
    /// Fail every navigation with this message.
    NavigationError(String),
    /// Never find any selector within the budget.
    SelectorTimeout,
}

#[derive(Debug, Default)]
struct Counters {
    launched: AtomicUsize,
    closed: AtomicUsize,
    user_agents: Mutex<Vec<String>>,
}

/// Launches sessions that serve stored HTML.
#[derive(Debug, Clone, Default)]
pub struct SnapshotLauncher {
    default_page: Option<Arc<str>>,
    routes: Arc<Vec<(String, Arc<str>)>>,
    behavior: SnapshotBehavior,
    counters: Arc<Counters>,
}

impl SnapshotLauncher {
    /// Serve `html` for every URL.
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            default_page: Some(Arc::from(html.into())),
            ..Default::default()
        }
    }

    /// Serve `html` for URLs containing `url_fragment`. Routes are checked in
    /// insertion order before the default page.
    pub fn with_page(mut self, url_fragment: impl Into<String>, html: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.routes).push((url_fragment.into(), Arc::from(html.into())));
        self
    }

    pub fn with_behavior(mut self, behavior: SnapshotBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Sessions launched so far.
    pub fn launched(&self) -> usize {
        self.counters.launched.load(Ordering::SeqCst)
    }

    /// Sessions closed so far.
    pub fn closed(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }

    /// User agents applied by sessions, in the order they were set.
    pub fn user_agents(&self) -> Vec<String> {
        self.counters
            .user_agents
            .lock()
            .map(|agents| agents.clone())
            .unwrap_or_default()
    }

    /// Sessions launched but not yet closed.
    pub fn open_sessions(&self) -> usize {
        self.launched().saturating_sub(self.closed())
    }
}

#[async_trait]
impl SessionLauncher for SnapshotLauncher {
    type Session = SnapshotSession;

    async fn launch(&self) -> Result<SnapshotSession, DriverError> {
        if let SnapshotBehavior::LaunchError(ref message) = self.behavior {
            return Err(DriverError::Launch(message.clone()));
        }
        self.counters.launched.fetch_add(1, Ordering::SeqCst);
        Ok(SnapshotSession {
            launcher: self.clone(),
            current: None,
        })
    }
}

/// A session over one stored page. Nodes are the outer HTML of matched
/// elements.
#[derive(Debug)]
pub struct SnapshotSession {
    launcher: SnapshotLauncher,
    current: Option<Arc<str>>,
}

impl SnapshotSession {
    fn page(&self) -> Result<&str, DriverError> {
        self.current
            .as_deref()
            .ok_or_else(|| DriverError::Protocol("no page loaded".to_string()))
    }
}

fn parse_selector(selector: &str) -> Result<Selector, DriverError> {
    Selector::parse(selector).map_err(|_| DriverError::Selector(selector.to_string()))
}

/// Resolve `sub_selector` within `node`; empty means the node itself.
fn scoped<'a>(
    node: ElementRef<'a>,
    sub_selector: &str,
) -> Result<Option<ElementRef<'a>>, DriverError> {
    if sub_selector.is_empty() {
        return Ok(Some(node));
    }
    let selector = parse_selector(sub_selector)?;
    Ok(node.select(&selector).next())
}

/// Run `f` on the element a node string was captured from.
fn with_node<T>(
    node: &str,
    f: impl FnOnce(ElementRef<'_>) -> Result<Option<T>, DriverError>,
) -> Result<Option<T>, DriverError> {
    let fragment = Html::parse_fragment(node);
    match fragment.root_element().children().find_map(ElementRef::wrap) {
        Some(element) => f(element),
        None => Ok(None),
    }
}

fn element_text(element: ElementRef<'_>) -> Option<String> {
    let text: String = element.text().collect();
    clean_text(Some(&text))
}

#[async_trait]
impl PageSession for SnapshotSession {
    type Node = String;

    async fn set_user_agent(&mut self, user_agent: &str) -> Result<(), DriverError> {
        if let Ok(mut agents) = self.launcher.counters.user_agents.lock() {
            agents.push(user_agent.to_string());
        }
        Ok(())
    }

    async fn navigate(&mut self, url: &str, _timeout: Duration) -> Result<(), DriverError> {
        if let SnapshotBehavior::NavigationError(ref message) = self.launcher.behavior {
            return Err(DriverError::Navigation {
                url: url.to_string(),
                message: message.clone(),
            });
        }

        let page = self
            .launcher
            .routes
            .iter()
            .find(|(fragment, _)| url.contains(fragment.as_str()))
            .map(|(_, html)| html.clone())
            .or_else(|| self.launcher.default_page.clone());

        match page {
            Some(html) => {
                debug!(url, bytes = html.len(), "Serving snapshot page");
                self.current = Some(html);
                Ok(())
            }
            None => Err(DriverError::Navigation {
                url: url.to_string(),
                message: "no snapshot for url".to_string(),
            }),
        }
    }

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        _timeout: Duration,
    ) -> Result<WaitOutcome, DriverError> {
        if self.launcher.behavior == SnapshotBehavior::SelectorTimeout {
            return Ok(WaitOutcome::TimedOut);
        }
        let selector = parse_selector(selector)?;
        let document = Html::parse_document(self.page()?);
        let found = document.select(&selector).next().is_some();
        Ok(if found {
            WaitOutcome::Found
        } else {
            WaitOutcome::Missing
        })
    }

    async fn query_all(&mut self, selector: &str) -> Result<Vec<String>, DriverError> {
        let selector = parse_selector(selector)?;
        let document = Html::parse_document(self.page()?);
        let nodes = document.select(&selector).map(|el| el.html()).collect();
        Ok(nodes)
    }

    async fn extract_text(
        &mut self,
        node: &String,
        sub_selector: &str,
    ) -> Result<Option<String>, DriverError> {
        with_node(node, |element| {
            Ok(scoped(element, sub_selector)?.and_then(element_text))
        })
    }

    async fn extract_attribute(
        &mut self,
        node: &String,
        sub_selector: &str,
        attribute: &str,
    ) -> Result<Option<String>, DriverError> {
        with_node(node, |element| {
            Ok(scoped(element, sub_selector)?
                .and_then(|el| el.value().attr(attribute))
                .map(str::to_string))
        })
    }

    async fn page_text(&mut self, selector: &str) -> Result<Option<String>, DriverError> {
        let selector = parse_selector(selector)?;
        let document = Html::parse_document(self.page()?);
        let text = document.select(&selector).next().and_then(element_text);
        Ok(text)
    }

    async fn close(self) -> Result<(), DriverError> {
        self.launcher.counters.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <ul class="results">
            <li class="item" data-id="1">
              <a class="link" href="https://shop.example/1"><span class="title">First   thing</span></a>
              <span class="price">$1.00</span>
            </li>
            <li class="item" data-id="2">
              <span class="title">Second</span>
            </li>
          </ul>
          <h1 class="count">2 results</h1>
        </body></html>
    "#;

    async fn loaded(launcher: &SnapshotLauncher) -> SnapshotSession {
        let mut session = launcher.launch().await.unwrap();
        session
            .navigate("https://shop.example/search?q=x", Duration::from_secs(1))
            .await
            .unwrap();
        session
    }

    #[tokio::test]
    async fn test_query_and_extract() {
        let launcher = SnapshotLauncher::new(PAGE);
        let mut session = loaded(&launcher).await;

        let nodes = session.query_all("li.item").await.unwrap();
        assert_eq!(nodes.len(), 2);

        let title = session.extract_text(&nodes[0], ".title").await.unwrap();
        assert_eq!(title.as_deref(), Some("First thing"));

        let href = session
            .extract_attribute(&nodes[0], "a.link", "href")
            .await
            .unwrap();
        assert_eq!(href.as_deref(), Some("https://shop.example/1"));

        let own = session
            .extract_attribute(&nodes[1], "", "data-id")
            .await
            .unwrap();
        assert_eq!(own.as_deref(), Some("2"));

        let missing = session.extract_text(&nodes[1], ".price").await.unwrap();
        assert_eq!(missing, None);

        let count = session.page_text("h1.count").await.unwrap();
        assert_eq!(count.as_deref(), Some("2 results"));

        session.close().await.unwrap();
        assert_eq!(launcher.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_wait_outcomes() {
        let launcher = SnapshotLauncher::new(PAGE);
        let mut session = loaded(&launcher).await;
        let budget = Duration::from_secs(1);
        assert_eq!(
            session.wait_for_selector("ul.results", budget).await.unwrap(),
            WaitOutcome::Found
        );
        assert_eq!(
            session.wait_for_selector("#nope", budget).await.unwrap(),
            WaitOutcome::Missing
        );

        let launcher = SnapshotLauncher::new(PAGE).with_behavior(SnapshotBehavior::SelectorTimeout);
        let mut session = loaded(&launcher).await;
        assert_eq!(
            session.wait_for_selector("ul.results", budget).await.unwrap(),
            WaitOutcome::TimedOut
        );
    }

    #[tokio::test]
    async fn test_routes_and_failures() {
        let launcher = SnapshotLauncher::default().with_page("ebay", "<p>ebay</p>");
        let mut session = launcher.launch().await.unwrap();
        assert!(session
            .navigate("https://www.ebay.com/sch/i.html", Duration::from_secs(1))
            .await
            .is_ok());
        assert!(matches!(
            session
                .navigate("https://www.amazon.com/s", Duration::from_secs(1))
                .await,
            Err(DriverError::Navigation { .. })
        ));

        let launcher = SnapshotLauncher::new(PAGE)
            .with_behavior(SnapshotBehavior::LaunchError("no chrome".to_string()));
        assert!(matches!(
            launcher.launch().await,
            Err(DriverError::Launch(_))
        ));
        assert_eq!(launcher.launched(), 0);
    }

    #[tokio::test]
    async fn test_invalid_selector_is_an_error() {
        let launcher = SnapshotLauncher::new(PAGE);
        let mut session = loaded(&launcher).await;
        assert!(matches!(
            session.query_all("li[").await,
            Err(DriverError::Selector(_))
        ));
    }
}
