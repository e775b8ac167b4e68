//! Scraped item and per-invocation result types.

use serde::{Deserialize, Serialize};

/// A price as shown on the marketplace, normalized to a plain decimal string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    /// Decimal value without symbols or separators, e.g. `"1299.99"`.
    /// `None` when the raw text held no number.
    pub value: Option<String>,
    pub currency: String,
}

impl Price {
    pub fn new(value: impl Into<String>, currency: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            currency: currency.into(),
        }
    }

    /// Numeric value, if present and parseable.
    pub fn amount(&self) -> Option<f64> {
        self.value.as_deref().and_then(|v| v.parse::<f64>().ok())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    pub image_url: String,
}

/// One product extracted from a search results page.
///
/// Every field is optional: marketplace markup changes often and partial
/// extraction must not drop the whole item. Fields not modelled here (from
/// richer sources) are carried in `extra` and flattened into the JSON output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedItem {
    pub item_id: Option<String>,
    pub title: Option<String>,
    pub price: Option<Price>,
    pub original_price: Option<Price>,
    pub discount: Option<String>,
    pub rating: Option<String>,
    pub sales: Option<String>,
    pub condition: Option<String>,
    pub category: Option<String>,
    pub image: Option<ImageRef>,
    pub item_web_url: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ScrapedItem {
    /// True when neither a title nor a URL could be recovered.
    pub fn is_unidentifiable(&self) -> bool {
        self.title.is_none() && self.item_web_url.is_none()
    }
}

/// Outcome of a single scrape invocation.
///
/// Built only through [`ScrapeResult::success`] and [`ScrapeResult::failure`],
/// which keep `total >= items.len()` and guarantee a failed result carries an
/// error and no items.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScrapeResult {
    success: bool,
    items: Vec<ScrapedItem>,
    total: usize,
    error: Option<String>,
}

impl ScrapeResult {
    /// A completed scrape. `reported_total` is the site's own result count
    /// when one was found on the page.
    pub fn success(items: Vec<ScrapedItem>, reported_total: Option<usize>) -> Self {
        let total = reported_total.unwrap_or(0).max(items.len());
        Self {
            success: true,
            items,
            total,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        let mut error = error.into();
        if error.is_empty() {
            error = "unknown error".to_string();
        }
        Self {
            success: false,
            items: Vec::new(),
            total: 0,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn items(&self) -> &[ScrapedItem] {
        &self.items
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn into_items(self) -> Vec<ScrapedItem> {
        self.items
    }
}
