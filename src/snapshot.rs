//! Price snapshots derived from scraped items.
//!
//! A snapshot is the numeric, storage-ready view of one search result:
//! prices as numbers, the discount as a rate, the category as a path. Storing
//! snapshots is left to the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Marketplace, Price, ScrapeResult, ScrapedItem};
use crate::normalize::{parse_discount, parse_sales};

/// A price with a numeric value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub value: f64,
    pub currency: String,
}

impl PricePoint {
    fn from_price(price: Option<&Price>) -> Option<Self> {
        let price = price?;
        Some(Self {
            value: price.amount()?,
            currency: price.currency.clone(),
        })
    }
}

/// Current price, list price and discount of one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceInfo {
    pub current: PricePoint,
    pub original: Option<PricePoint>,
    /// Percentage off the original price, e.g. `30.0`.
    pub discount_rate: Option<f64>,
}

impl PriceInfo {
    /// The discount text wins. Otherwise the rate is computed from the
    /// original and current price when the original is higher.
    fn new(current: PricePoint, original: Option<PricePoint>, discount: Option<&str>) -> Self {
        let discount_rate = parse_discount(discount)
            .map(f64::from)
            .filter(|rate| *rate > 0.0)
            .or_else(|| {
                let original = original.as_ref()?;
                if original.value > current.value && original.value > 0.0 {
                    Some((original.value - current.value) / original.value * 100.0)
                } else {
                    None
                }
            });

        Self {
            current,
            original,
            discount_rate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSnapshot {
    pub item_id: Option<String>,
    pub title: Option<String>,
    pub keyword: String,
    pub platform: Marketplace,
    pub price: PriceInfo,
    pub reviews: Option<u64>,
    pub sales: Option<u64>,
    pub category: Vec<String>,
    pub image: Option<String>,
    pub item_web_url: Option<String>,
    pub crawled_at: DateTime<Utc>,
}

/// Split a `"A > B > C"` category path, dropping empty segments.
pub fn category_path(category: Option<&str>) -> Vec<String> {
    category
        .map(|c| {
            c.split(" > ")
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Exact count from text like `"1,234"`. Lower bounds are not exact.
fn exact_count(raw: Option<&str>) -> Option<u64> {
    parse_sales(raw)?.as_exact()
}

impl PriceSnapshot {
    /// Build a snapshot, or `None` if the item has no numeric price.
    pub fn from_item(item: &ScrapedItem, keyword: &str, marketplace: Marketplace) -> Option<Self> {
        let current = PricePoint::from_price(item.price.as_ref())?;
        let original = PricePoint::from_price(item.original_price.as_ref());
        let reviews = item
            .extra
            .get("reviews")
            .and_then(|v| match v {
                serde_json::Value::Number(n) => n.as_u64(),
                serde_json::Value::String(s) => exact_count(Some(s)),
                _ => None,
            });

        Some(Self {
            item_id: item.item_id.clone(),
            title: item.title.clone(),
            keyword: keyword.to_string(),
            platform: marketplace,
            price: PriceInfo::new(current, original, item.discount.as_deref()),
            reviews,
            sales: exact_count(item.sales.as_deref()),
            category: category_path(item.category.as_deref()),
            image: item.image.as_ref().map(|i| i.image_url.clone()),
            item_web_url: item.item_web_url.clone(),
            crawled_at: Utc::now(),
        })
    }
}

/// Snapshots for every priced item in a successful result.
pub fn snapshots_from_result(
    result: &ScrapeResult,
    keyword: &str,
    marketplace: Marketplace,
) -> Vec<PriceSnapshot> {
    result
        .items()
        .iter()
        .filter_map(|item| PriceSnapshot::from_item(item, keyword, marketplace))
        .collect()
}
