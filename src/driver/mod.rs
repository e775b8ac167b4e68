//! Page drivers for scraping search result pages.
//!
//! A [`SessionLauncher`] produces one [`PageSession`] per scrape. The session
//! owns the underlying browser (or in-memory document) and must be released
//! with [`PageSession::close`] when the scrape finishes. Chrome sessions also
//! tear the browser down on drop, so an early return or panic in the caller
//! still releases the process.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::DriverError;

mod chrome;
pub mod snapshot;
#[cfg_attr(not(feature = "browser"), allow(dead_code))]
mod stealth;

pub use chrome::{ChromeLauncher, ChromeSession};
pub use snapshot::{SnapshotBehavior, SnapshotLauncher, SnapshotSession};

/// Result of waiting for a selector.
///
/// Scrapers treat `Missing` as an empty result set and `TimedOut` as a
/// failed scrape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Found,
    /// The page settled but the selector never matched.
    Missing,
    /// The operation budget ran out first.
    TimedOut,
}

/// One browser tab (or equivalent) bound to a single scrape.
#[async_trait]
pub trait PageSession: Send + Sized {
    /// Handle to an element returned by [`PageSession::query_all`].
    type Node: Send + Sync;

    async fn set_user_agent(&mut self, user_agent: &str) -> Result<(), DriverError>;

    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), DriverError>;

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<WaitOutcome, DriverError>;

    async fn query_all(&mut self, selector: &str) -> Result<Vec<Self::Node>, DriverError>;

    /// Text of the first element matching `sub_selector` under `node`.
    /// An empty `sub_selector` means the node itself.
    async fn extract_text(
        &mut self,
        node: &Self::Node,
        sub_selector: &str,
    ) -> Result<Option<String>, DriverError>;

    /// Attribute of the first element matching `sub_selector` under `node`.
    /// An empty `sub_selector` means the node itself.
    async fn extract_attribute(
        &mut self,
        node: &Self::Node,
        sub_selector: &str,
        attribute: &str,
    ) -> Result<Option<String>, DriverError>;

    /// Text of the first element matching `selector` anywhere on the page.
    async fn page_text(&mut self, selector: &str) -> Result<Option<String>, DriverError>;

    /// Release the session and everything it launched.
    async fn close(self) -> Result<(), DriverError>;
}

/// Creates fresh, independent sessions. Sessions are never pooled or reused.
#[async_trait]
pub trait SessionLauncher: Send + Sync + 'static {
    type Session: PageSession + 'static;

    async fn launch(&self) -> Result<Self::Session, DriverError>;
}
