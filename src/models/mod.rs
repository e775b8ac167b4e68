//! Data models for product search.

mod item;
mod marketplace;
mod search;

pub use item::{ImageRef, Price, ScrapeResult, ScrapedItem};
pub use marketplace::Marketplace;
pub use search::{SearchRequest, SearchResponse, DEFAULT_LIMIT, MAX_LIMIT};
