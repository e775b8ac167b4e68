//! Per-marketplace page layouts.
//!
//! A [`SiteProfile`] names everything the scrape engine needs to know about a
//! marketplace: how to build the search URL, which element holds the results
//! and where each field lives inside a result node. Markup on these sites
//! changes often, so every field lists fallback selectors tried in order.

use url::Url;

use crate::config::ScraperSettings;
use crate::models::Marketplace;
use crate::url_parser::{aliexpress_item_id, ebay_item_id};

/// Where a field lives inside a result node.
#[derive(Debug, Clone, Copy)]
pub struct FieldSelector {
    /// Sub-selectors tried in order. An empty string is the node itself.
    pub selectors: &'static [&'static str],
    /// Attributes tried in order on each match. Empty means element text.
    pub attributes: &'static [&'static str],
}

impl FieldSelector {
    pub const NONE: FieldSelector = FieldSelector {
        selectors: &[],
        attributes: &[],
    };

    const fn text(selectors: &'static [&'static str]) -> Self {
        Self {
            selectors,
            attributes: &[],
        }
    }

    const fn attr(selectors: &'static [&'static str], attributes: &'static [&'static str]) -> Self {
        Self {
            selectors,
            attributes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }
}

/// How a result's marketplace item id is found.
#[derive(Debug, Clone, Copy)]
pub enum ItemIdSource {
    /// An attribute on the result node itself.
    NodeAttribute(&'static str),
    /// Parsed out of the item URL.
    FromUrl(fn(&str) -> Option<String>),
}

/// Selectors and URL rules for one marketplace.
#[derive(Debug, Clone, Copy)]
pub struct SiteProfile {
    pub marketplace: Marketplace,
    /// Element that appears once results have rendered.
    pub container: &'static str,
    /// One match per result.
    pub item: &'static str,
    pub title: FieldSelector,
    pub url: FieldSelector,
    pub price: FieldSelector,
    pub original_price: FieldSelector,
    pub discount: FieldSelector,
    pub rating: FieldSelector,
    pub sales: FieldSelector,
    pub reviews: FieldSelector,
    pub condition: FieldSelector,
    pub category: FieldSelector,
    pub image: FieldSelector,
    pub item_id: ItemIdSource,
    /// Page-level element holding the site's result count.
    pub result_count: Option<&'static str>,
    /// Placeholder cards the site mixes into results.
    pub skip_titles: &'static [&'static str],
    /// Prefixes stripped from titles.
    pub title_prefixes: &'static [&'static str],
}

pub const EBAY: SiteProfile = SiteProfile {
    marketplace: Marketplace::Ebay,
    container: "ul.srp-results",
    item: "li.s-item",
    title: FieldSelector::text(&[".s-item__title span[role=heading]", ".s-item__title"]),
    url: FieldSelector::attr(&["a.s-item__link"], &["href"]),
    price: FieldSelector::text(&[".s-item__price"]),
    original_price: FieldSelector::text(&[
        ".s-item__trending-price .STRIKETHROUGH",
        ".s-item__additional-price .STRIKETHROUGH",
        ".s-item__original-price",
    ]),
    discount: FieldSelector::text(&[".s-item__discount", ".s-item__trending-price .BOLD"]),
    rating: FieldSelector::text(&[".x-star-rating .clipped", ".s-item__reviews .clipped"]),
    sales: FieldSelector::text(&[".s-item__quantitySold", ".s-item__hotness"]),
    reviews: FieldSelector::text(&[".s-item__reviews-count span"]),
    condition: FieldSelector::text(&[".s-item__subtitle .SECONDARY_INFO", ".SECONDARY_INFO"]),
    category: FieldSelector::NONE,
    image: FieldSelector::attr(&[".s-item__image-wrapper img", "img"], &["src", "data-src"]),
    item_id: ItemIdSource::FromUrl(ebay_item_id),
    result_count: Some("h1.srp-controls__count-heading"),
    skip_titles: &["Shop on eBay"],
    title_prefixes: &["New Listing", "NEW LISTING"],
};

pub const ALIEXPRESS: SiteProfile = SiteProfile {
    marketplace: Marketplace::Aliexpress,
    container: "#card-list",
    item: "#card-list a.search-card-item",
    title: FieldSelector::text(&["h3", "[class*=\"title\"]"]),
    url: FieldSelector::attr(&[""], &["href"]),
    price: FieldSelector::text(&["[class*=\"price-sale\"]", "[class*=\"price\"]"]),
    original_price: FieldSelector::text(&["[class*=\"price-original\"]"]),
    discount: FieldSelector::text(&["[class*=\"price-discount\"]", "[class*=\"discount\"]"]),
    rating: FieldSelector::text(&["[class*=\"evaluation\"]", "[class*=\"star\"]"]),
    sales: FieldSelector::text(&["[class*=\"trade\"]", "[class*=\"sold\"]"]),
    reviews: FieldSelector::NONE,
    condition: FieldSelector::NONE,
    category: FieldSelector::NONE,
    image: FieldSelector::attr(&["img"], &["src", "data-src"]),
    item_id: ItemIdSource::FromUrl(aliexpress_item_id),
    result_count: None,
    skip_titles: &[],
    title_prefixes: &[],
};

pub const AMAZON: SiteProfile = SiteProfile {
    marketplace: Marketplace::Amazon,
    container: "div.s-main-slot",
    item: "div.s-main-slot div[data-component-type=\"s-search-result\"]",
    title: FieldSelector::text(&["h2 span", "h2"]),
    url: FieldSelector::attr(&["h2 a", "a.a-link-normal.s-no-outline", "a.a-link-normal"], &["href"]),
    price: FieldSelector::text(&[
        ".a-price:not(.a-text-price) .a-offscreen",
        ".a-price .a-offscreen",
    ]),
    original_price: FieldSelector::text(&[".a-price.a-text-price .a-offscreen"]),
    discount: FieldSelector::text(&[".savingsPercentage", ".s-coupon-highlight-color"]),
    rating: FieldSelector::text(&[".a-icon-star-small .a-icon-alt", ".a-icon-alt"]),
    sales: FieldSelector::text(&["[data-a-badge-color] .a-size-base", ".a-row.a-size-base .a-color-secondary"]),
    reviews: FieldSelector::text(&["a[href*=\"customerReviews\"] span", ".s-underline-text"]),
    condition: FieldSelector::NONE,
    category: FieldSelector::text(&[".s-breadcrumb-header-text"]),
    image: FieldSelector::attr(&["img.s-image", "img"], &["src"]),
    item_id: ItemIdSource::NodeAttribute("data-asin"),
    result_count: Some("[data-component-type=\"s-result-info-bar\"] h1 span"),
    skip_titles: &[],
    title_prefixes: &["Sponsored Ad -", "Sponsored"],
};

impl SiteProfile {
    pub fn for_marketplace(marketplace: Marketplace) -> &'static SiteProfile {
        match marketplace {
            Marketplace::Ebay => &EBAY,
            Marketplace::Aliexpress => &ALIEXPRESS,
            Marketplace::Amazon => &AMAZON,
        }
    }

    /// Site root used to resolve relative links.
    pub fn base_url(&self, settings: &ScraperSettings) -> String {
        match self.marketplace {
            Marketplace::Ebay => format!("https://www.ebay.{}", settings.ebay_domain),
            Marketplace::Aliexpress => {
                let lang = settings.aliexpress_lang.to_lowercase();
                let sub = if lang.is_empty() || lang == "en" {
                    "www".to_string()
                } else {
                    lang
                };
                format!("https://{}.aliexpress.{}", sub, settings.aliexpress_domain)
            }
            Marketplace::Amazon => format!("https://www.amazon.{}", settings.amazon_domain),
        }
    }

    /// Search results URL for `keyword`, sized for `limit` results where the
    /// site allows it.
    pub fn search_url(&self, keyword: &str, limit: usize, settings: &ScraperSettings) -> String {
        let base = self.base_url(settings);
        let encoded = urlencoding::encode(keyword.trim());
        match self.marketplace {
            Marketplace::Ebay => {
                let per_page = match limit {
                    0..=60 => 60,
                    61..=120 => 120,
                    _ => 240,
                };
                format!("{}/sch/i.html?_nkw={}&_ipg={}", base, encoded, per_page)
            }
            Marketplace::Aliexpress => {
                let slug: String = keyword
                    .trim()
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join("-");
                format!(
                    "{}/w/wholesale-{}.html?SearchText={}",
                    base,
                    urlencoding::encode(&slug),
                    encoded
                )
            }
            Marketplace::Amazon => format!("{}/s?k={}", base, encoded),
        }
    }
}

/// Make a scraped link absolute. Protocol-relative links get `https:`.
pub fn resolve_link(base: &str, link: &str) -> Option<String> {
    let link = link.trim();
    if link.is_empty() || link.starts_with("javascript:") || link.starts_with("data:") {
        return None;
    }
    if link.starts_with("//") {
        return Some(format!("https:{}", link));
    }
    if link.starts_with("http://") || link.starts_with("https://") {
        return Some(link.to_string());
    }
    Url::parse(base)
        .and_then(|b| b.join(link))
        .map(|u| u.to_string())
        .ok()
}
