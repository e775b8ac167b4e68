//! HTTP handlers.

mod api;
mod search;

pub use api::{health, parse_url};
pub use search::{marketplace_search, search};
