//! pricescout - marketplace product search over headless-browser scraping.
//!
//! Searches eBay, AliExpress and Amazon by driving a browser through their
//! search result pages and normalizing every result into one item shape.

pub mod cli;
pub mod config;
pub mod currency;
pub mod driver;
pub mod error;
pub mod humanize;
pub mod models;
pub mod normalize;
pub mod scrapers;
pub mod server;
pub mod snapshot;
pub mod url_parser;
