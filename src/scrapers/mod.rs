//! Marketplace search scrapers.
//!
//! [`MarketplaceScraper`] runs the search pipeline against any
//! [`SessionLauncher`](crate::driver::SessionLauncher); the per-site
//! selectors live in [`profile`]. [`EbayApiSearch`] answers eBay searches
//! from the Browse API when credentials are configured. [`bridge::run`] moves a scrape onto the
//! blocking pool so request handlers never drive a browser themselves.

pub mod bridge;
pub mod ebay_api;
mod marketplace;
pub mod profile;
mod registry;

pub use ebay_api::EbayApiSearch;
pub use marketplace::{parse_result_count, MarketplaceScraper, ScrapeStage};
pub use profile::SiteProfile;
pub use registry::{ProductSearch, ScraperRegistry};
