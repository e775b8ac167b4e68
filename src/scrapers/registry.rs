//! Lookup of the scraper serving each marketplace.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use super::{EbayApiSearch, MarketplaceScraper};
use crate::config::{ScraperSettings, Settings};
use crate::driver::SessionLauncher;
use crate::models::{Marketplace, ScrapeResult};

/// Anything that can answer a product search for one marketplace.
#[async_trait]
pub trait ProductSearch: Send + Sync {
    fn marketplace(&self) -> Marketplace;

    async fn search(&self, keyword: &str, limit: usize) -> ScrapeResult;
}

#[async_trait]
impl<L: SessionLauncher> ProductSearch for MarketplaceScraper<L> {
    fn marketplace(&self) -> Marketplace {
        MarketplaceScraper::marketplace(self)
    }

    async fn search(&self, keyword: &str, limit: usize) -> ScrapeResult {
        self.scrape(keyword, limit).await
    }
}

/// Scrapers keyed by marketplace, built once at startup and shared read-only.
#[derive(Clone, Default)]
pub struct ScraperRegistry {
    scrapers: HashMap<Marketplace, Arc<dyn ProductSearch>>,
}

impl ScraperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One scraper per marketplace, all launching sessions from `launcher`.
    pub fn with_launcher<L>(settings: &ScraperSettings, launcher: L) -> Self
    where
        L: SessionLauncher + Clone,
    {
        let mut registry = Self::new();
        for marketplace in Marketplace::ALL {
            registry.register(Arc::new(MarketplaceScraper::new(
                marketplace,
                settings.clone(),
                launcher.clone(),
            )));
        }
        registry
    }

    /// Page scrapers for every marketplace, with eBay answered by the Browse
    /// API instead when its credentials are configured.
    pub fn from_settings<L>(settings: &Settings, launcher: L) -> Self
    where
        L: SessionLauncher + Clone,
    {
        let mut registry = Self::with_launcher(&settings.scraper, launcher);
        if settings.ebay_api.is_configured() {
            match EbayApiSearch::new(settings.ebay_api.clone(), settings.scraper.timeout()) {
                Ok(api) => {
                    info!("Using the eBay Browse API for eBay searches");
                    registry.register(Arc::new(api));
                }
                Err(e) => warn!("eBay Browse API unavailable, scraping pages instead: {}", e),
            }
        }
        registry
    }

    /// Add or replace the scraper for its marketplace.
    pub fn register(&mut self, scraper: Arc<dyn ProductSearch>) {
        self.scrapers.insert(scraper.marketplace(), scraper);
    }

    pub fn get(&self, marketplace: Marketplace) -> Option<Arc<dyn ProductSearch>> {
        self.scrapers.get(&marketplace).cloned()
    }

    /// Registered marketplaces in a stable order.
    pub fn marketplaces(&self) -> Vec<Marketplace> {
        Marketplace::ALL
            .into_iter()
            .filter(|m| self.scrapers.contains_key(m))
            .collect()
    }
}
