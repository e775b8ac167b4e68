//! Marketplace product URL parsing.
//!
//! Recognizes product page URLs from each supported marketplace, extracts the
//! marketplace's item identifier and builds a canonical URL for it.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::models::Marketplace;

/// eBay hosts and their region codes.
const EBAY_REGIONS: &[(&str, &str)] = &[
    ("ebay.com", "US"),
    ("ebay.co.uk", "UK"),
    ("ebay.de", "DE"),
    ("ebay.fr", "FR"),
    ("ebay.ca", "CA"),
    ("ebay.com.au", "AU"),
    ("ebay.it", "IT"),
    ("ebay.es", "ES"),
    ("ebay.nl", "NL"),
    ("ebay.be", "BE"),
    ("ebay.at", "AT"),
    ("ebay.ch", "CH"),
    ("ebay.ie", "IE"),
    ("ebay.pl", "PL"),
    ("ebay.ph", "PH"),
    ("ebay.com.sg", "SG"),
    ("ebay.com.my", "MY"),
    ("ebay.co.jp", "JP"),
];

/// Regions with their own canonical item host. Others fall back to ebay.com.
const EBAY_CANONICAL_HOSTS: &[(&str, &str)] = &[
    ("US", "www.ebay.com"),
    ("UK", "www.ebay.co.uk"),
    ("DE", "www.ebay.de"),
    ("FR", "www.ebay.fr"),
    ("CA", "www.ebay.ca"),
    ("AU", "www.ebay.com.au"),
    ("IT", "www.ebay.it"),
    ("ES", "www.ebay.es"),
];

static EBAY_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)/itm/(?:[^/?#]+/)?(\d{9,15})(?:[?#/]|$)").unwrap());

static EBAY_ITEM_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{9,15}$").unwrap());

static ALIEXPRESS_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)/item/(\d+)\.html").unwrap());

static AMAZON_ASIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)/(?:dp|gp/product)/([A-Z0-9]{10})(?:[/?#]|$)").unwrap()
});

/// Result of parsing a product URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlParseResponse {
    pub success: bool,
    pub store: Option<Marketplace>,
    pub item_id: Option<String>,
    pub original_url: String,
    pub canonical_url: Option<String>,
    pub error: Option<String>,
}

impl UrlParseResponse {
    fn parsed(store: Marketplace, item_id: String, original_url: &str, canonical_url: String) -> Self {
        Self {
            success: true,
            store: Some(store),
            item_id: Some(item_id),
            original_url: original_url.to_string(),
            canonical_url: Some(canonical_url),
            error: None,
        }
    }

    fn failed(original_url: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            store: None,
            item_id: None,
            original_url: original_url.to_string(),
            canonical_url: None,
            error: Some(error.into()),
        }
    }
}

/// Lowercased host with any leading `www.` removed.
fn bare_host(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    Some(host.strip_prefix("www.").map(str::to_string).unwrap_or(host))
}

fn host_matches(host: &str, domain: &str) -> bool {
    host == domain || host.ends_with(&format!(".{}", domain))
}

/// Identify which marketplace a URL belongs to.
pub fn detect_marketplace(url: &str) -> Option<Marketplace> {
    let parsed = Url::parse(url.trim()).ok()?;
    let host = bare_host(&parsed)?;

    if ebay_region_for_host(&host).is_some() {
        Some(Marketplace::Ebay)
    } else if host_matches(&host, "aliexpress.com") || host.contains(".aliexpress.") {
        Some(Marketplace::Aliexpress)
    } else if host.starts_with("amazon.") || host.contains(".amazon.") {
        Some(Marketplace::Amazon)
    } else {
        None
    }
}

fn ebay_region_for_host(host: &str) -> Option<&'static str> {
    EBAY_REGIONS
        .iter()
        .find(|(domain, _)| host_matches(host, domain))
        .map(|(_, region)| *region)
}

/// eBay region code for a URL, defaulting to `US`.
pub fn ebay_region(url: &str) -> &'static str {
    Url::parse(url.trim())
        .ok()
        .and_then(|u| bare_host(&u))
        .and_then(|h| ebay_region_for_host(&h))
        .unwrap_or("US")
}

/// eBay item id from `/itm/[slug/]<id>` or an `item`/`itemId` query parameter.
pub fn ebay_item_id(url: &str) -> Option<String> {
    if let Some(caps) = EBAY_ITEM_RE.captures(url) {
        return Some(caps[1].to_string());
    }

    let parsed = Url::parse(url.trim()).ok()?;
    for wanted in ["item", "itemId", "itemid"] {
        let found = parsed
            .query_pairs()
            .find(|(key, _)| key == wanted)
            .map(|(_, value)| value.into_owned());
        if let Some(id) = found {
            if EBAY_ITEM_ID_RE.is_match(&id) {
                return Some(id);
            }
        }
    }
    None
}

pub fn ebay_canonical_url(item_id: &str, region: &str) -> String {
    let host = EBAY_CANONICAL_HOSTS
        .iter()
        .find(|(r, _)| *r == region)
        .map(|(_, host)| *host)
        .unwrap_or("www.ebay.com");
    format!("https://{}/itm/{}", host, item_id)
}

/// AliExpress product id from `/item/<id>.html`.
pub fn aliexpress_item_id(url: &str) -> Option<String> {
    ALIEXPRESS_ITEM_RE
        .captures(url)
        .map(|caps| caps[1].to_string())
}

/// Amazon ASIN from `/dp/<ASIN>` or `/gp/product/<ASIN>`.
pub fn amazon_asin(url: &str) -> Option<String> {
    AMAZON_ASIN_RE
        .captures(url)
        .map(|caps| caps[1].to_uppercase())
}

/// Domain suffix of an Amazon host, e.g. `co.uk` for `www.amazon.co.uk`.
fn amazon_domain(url: &str) -> String {
    Url::parse(url.trim())
        .ok()
        .and_then(|u| bare_host(&u))
        .and_then(|h| h.split_once("amazon.").map(|(_, rest)| rest.to_string()))
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| "com".to_string())
}

/// Parse any supported product URL.
pub fn parse_product_url(url: &str) -> UrlParseResponse {
    let url = url.trim();
    let Some(store) = detect_marketplace(url) else {
        return UrlParseResponse::failed(url, "Unsupported store URL");
    };

    match store {
        Marketplace::Ebay => match ebay_item_id(url) {
            Some(id) => {
                let canonical = ebay_canonical_url(&id, ebay_region(url));
                UrlParseResponse::parsed(store, id, url, canonical)
            }
            None => UrlParseResponse::failed(url, "Could not extract item ID from URL"),
        },
        Marketplace::Aliexpress => match aliexpress_item_id(url) {
            Some(id) => {
                let canonical = format!("https://www.aliexpress.com/item/{}.html", id);
                UrlParseResponse::parsed(store, id, url, canonical)
            }
            None => UrlParseResponse::failed(url, "Could not extract item ID from URL"),
        },
        Marketplace::Amazon => match amazon_asin(url) {
            Some(asin) => {
                let canonical = format!("https://www.amazon.{}/dp/{}", amazon_domain(url), asin);
                UrlParseResponse::parsed(store, asin, url, canonical)
            }
            None => UrlParseResponse::failed(url, "Could not extract ASIN from URL"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ebay_url_formats() {
        for url in [
            "https://www.ebay.com/itm/256123456789",
            "https://www.ebay.com/itm/product-title/256123456789",
            "https://www.ebay.com/itm/256123456789?var=0&hash=abc",
            "https://ebay.com/itm/256123456789",
        ] {
            let parsed = parse_product_url(url);
            assert!(parsed.success, "{}", url);
            assert_eq!(parsed.store, Some(Marketplace::Ebay));
            assert_eq!(parsed.item_id.as_deref(), Some("256123456789"));
            assert_eq!(
                parsed.canonical_url.as_deref(),
                Some("https://www.ebay.com/itm/256123456789")
            );
        }
    }

    #[test]
    fn test_ebay_query_param_and_regions() {
        assert_eq!(
            ebay_item_id("https://www.ebay.de/sch/i.html?itemId=123456789012"),
            Some("123456789012".to_string())
        );
        assert_eq!(ebay_item_id("https://www.ebay.com/sch/i.html?item=12"), None);

        let parsed = parse_product_url("https://www.ebay.co.uk/itm/256123456789");
        assert_eq!(
            parsed.canonical_url.as_deref(),
            Some("https://www.ebay.co.uk/itm/256123456789")
        );

        // No dedicated canonical host for NL.
        assert_eq!(ebay_region("https://www.ebay.nl/itm/256123456789"), "NL");
        let parsed = parse_product_url("https://www.ebay.nl/itm/256123456789");
        assert_eq!(
            parsed.canonical_url.as_deref(),
            Some("https://www.ebay.com/itm/256123456789")
        );
    }

    #[test]
    fn test_ebay_without_item_id() {
        let parsed = parse_product_url("https://www.ebay.com/b/Drones/179697");
        assert!(!parsed.success);
        assert_eq!(parsed.store, None);
        assert!(parsed.error.is_some());
    }

    #[test]
    fn test_aliexpress_and_amazon() {
        let parsed = parse_product_url("https://ko.aliexpress.com/item/1005006123456789.html?spm=a2g0o");
        assert_eq!(parsed.store, Some(Marketplace::Aliexpress));
        assert_eq!(parsed.item_id.as_deref(), Some("1005006123456789"));
        assert_eq!(
            parsed.canonical_url.as_deref(),
            Some("https://www.aliexpress.com/item/1005006123456789.html")
        );

        let parsed = parse_product_url("https://www.amazon.co.uk/Some-Product/dp/B0ABCDEF12/ref=sr_1_1");
        assert_eq!(parsed.store, Some(Marketplace::Amazon));
        assert_eq!(parsed.item_id.as_deref(), Some("B0ABCDEF12"));
        assert_eq!(
            parsed.canonical_url.as_deref(),
            Some("https://www.amazon.co.uk/dp/B0ABCDEF12")
        );

        assert_eq!(
            amazon_asin("https://www.amazon.com/gp/product/B08N5WRWNW?th=1"),
            Some("B08N5WRWNW".to_string())
        );
    }

    #[test]
    fn test_unsupported_url() {
        let parsed = parse_product_url("https://www.walmart.com/ip/12345");
        assert!(!parsed.success);
        assert_eq!(parsed.error.as_deref(), Some("Unsupported store URL"));
        assert_eq!(parsed.original_url, "https://www.walmart.com/ip/12345");

        let parsed = parse_product_url("not a url");
        assert_eq!(parsed.error.as_deref(), Some("Unsupported store URL"));
    }
}
