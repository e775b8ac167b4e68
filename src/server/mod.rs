//! HTTP API for marketplace product search.
//!
//! Every search endpoint answers with the same envelope
//! (`{success, total, itemSummaries, error}`). Scrape failures come back as
//! `success: false` with status 200; only invalid input is rejected with 422.

mod handlers;
mod routes;

pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::Settings;
use crate::driver::ChromeLauncher;
use crate::scrapers::ScraperRegistry;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ScraperRegistry>,
}

impl AppState {
    /// Chrome-backed scrapers for every marketplace, or the eBay Browse API
    /// for eBay when it is configured.
    pub fn new(settings: &Settings) -> Self {
        let launcher = ChromeLauncher::new(settings.browser.clone())
            .with_language(settings.scraper.aliexpress_lang.clone());
        Self::with_registry(ScraperRegistry::from_settings(settings, launcher))
    }

    pub fn with_registry(registry: ScraperRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }
}

/// Start the web server.
pub async fn serve(settings: &Settings, host: &str, port: u16) -> anyhow::Result<()> {
    let state = AppState::new(settings);
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
