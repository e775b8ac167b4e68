//! Field normalization for raw scraped text.
//!
//! Every parser here is total: garbled, empty or missing input yields `None`
//! (or a price with no value), never a panic.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::currency::detect_currency;
use crate::models::{Price, ScrapedItem};

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").unwrap());

static PRICE_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d(?:[\d.,]*\d)?").unwrap());

static DISCOUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)(?:\.\d+)?\s*%").unwrap());

static SALES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)(?:\s*([km])\b)?\s*(\+)?").unwrap());

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Collapse runs of whitespace and trim. Empty results become `None`.
pub fn clean_text(raw: Option<&str>) -> Option<String> {
    let raw = raw?;
    let cleaned = WHITESPACE_RE.replace_all(raw.trim(), " ");
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.into_owned())
    }
}

/// Parse price text such as `"US $1,299.99"`, `"£12"` or `"1.299,99 €"`.
///
/// The first number wins; separators are resolved by [`normalize_amount`].
/// The currency comes from a symbol or ISO code in the text, else
/// `default_currency`.
pub fn parse_price(raw: Option<&str>, default_currency: &str) -> Price {
    let currency = raw
        .and_then(detect_currency)
        .unwrap_or(default_currency)
        .to_string();

    let value = raw
        .and_then(|text| PRICE_TOKEN_RE.find(text))
        .and_then(|m| normalize_amount(m.as_str()));

    Price { value, currency }
}

/// Resolve thousands and decimal separators in a digit run.
///
/// With both `,` and `.` present, the one appearing last is the decimal
/// point. A lone `,` is a decimal point when exactly two digits follow the
/// last one (`"5,00"`), else a thousands separator (`"12,000"`). Repeated
/// `.` without `,` are thousands separators (`"1.299.000"`).
pub fn normalize_amount(token: &str) -> Option<String> {
    let last_comma = token.rfind(',');
    let last_dot = token.rfind('.');

    let normalized = match (last_comma, last_dot) {
        (Some(c), Some(d)) if c > d => token.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => token.replace(',', ""),
        (Some(c), None) => {
            if token.len() - c - 1 == 2 {
                let (int_part, frac) = token.split_at(c);
                format!("{}.{}", int_part.replace(',', ""), &frac[1..])
            } else {
                token.replace(',', "")
            }
        }
        (None, Some(_)) if token.matches('.').count() > 1 => token.replace('.', ""),
        _ => token.to_string(),
    };

    NUMBER_RE
        .find(&normalized)
        .filter(|m| m.start() == 0 && m.end() == normalized.len())
        .map(|m| m.as_str().to_string())
}

/// Parse a price and keep it only if a number was found.
pub fn parse_price_opt(raw: Option<&str>, default_currency: &str) -> Option<Price> {
    let price = parse_price(raw, default_currency);
    price.value.is_some().then_some(price)
}

/// First integer immediately preceding a `%` sign: `"85% OFF"` is 85.
///
/// Decimal discounts are truncated to their integer part: `"12.5%"` is 12.
pub fn parse_discount(raw: Option<&str>) -> Option<u32> {
    let caps = DISCOUNT_RE.captures(raw?)?;
    caps.get(1)?.as_str().parse().ok()
}

/// First decimal number in the text, accepted only within `[0, 5]`.
pub fn parse_rating(raw: Option<&str>) -> Option<f64> {
    let m = NUMBER_RE.find(raw?)?;
    let rating: f64 = m.as_str().parse().ok()?;
    (0.0..=5.0).contains(&rating).then_some(rating)
}

/// A best-effort sales or review count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SalesCount {
    Exact(u64),
    /// The site only shows a lower bound, e.g. `"900+ sold"`.
    AtLeast(u64),
    /// Digits were present but could not be read as a count.
    Raw(String),
}

impl SalesCount {
    pub fn as_exact(&self) -> Option<u64> {
        match self {
            SalesCount::Exact(n) => Some(*n),
            _ => None,
        }
    }

    /// The count or its lower bound.
    pub fn lower_bound(&self) -> Option<u64> {
        match self {
            SalesCount::Exact(n) | SalesCount::AtLeast(n) => Some(*n),
            SalesCount::Raw(_) => None,
        }
    }
}

/// Parse sales text like `"1.2k sold"`, `"900+"` or `"10,000+ sold"`.
pub fn parse_sales(raw: Option<&str>) -> Option<SalesCount> {
    let raw = raw?.trim();
    if !raw.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let stripped = raw.replace(',', "");
    let Some(caps) = SALES_RE.captures(&stripped) else {
        return Some(SalesCount::Raw(raw.to_string()));
    };

    let Ok(base) = caps[1].parse::<f64>() else {
        return Some(SalesCount::Raw(raw.to_string()));
    };
    let multiplier = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
        Some(ref s) if s == "k" => 1_000.0,
        Some(ref s) if s == "m" => 1_000_000.0,
        _ => 1.0,
    };
    let count = (base * multiplier).round();
    if !count.is_finite() || count < 0.0 || count > u64::MAX as f64 {
        return Some(SalesCount::Raw(raw.to_string()));
    }

    let count = count as u64;
    if caps.get(3).is_some() {
        Some(SalesCount::AtLeast(count))
    } else {
        Some(SalesCount::Exact(count))
    }
}

/// Tracks `(title, url)` pairs already emitted within one result set.
#[derive(Debug, Default)]
pub struct SeenItems {
    seen: HashSet<(Option<String>, Option<String>)>,
}

impl SeenItems {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the item's key. Returns `false` if it was already present.
    pub fn insert(&mut self, item: &ScrapedItem) -> bool {
        self.seen
            .insert((item.title.clone(), item.item_web_url.clone()))
    }
}

/// Drop items whose `(title, itemWebUrl)` matches an earlier one, keeping
/// first-occurrence order.
pub fn dedupe(items: Vec<ScrapedItem>) -> Vec<ScrapedItem> {
    let mut seen = SeenItems::new();
    items.into_iter().filter(|item| seen.insert(item)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str, url: &str) -> ScrapedItem {
        ScrapedItem {
            title: Some(title.to_string()),
            item_web_url: Some(url.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_price_strips_symbols_and_separators() {
        let price = parse_price(Some("US $1,299.99"), "USD");
        assert_eq!(price.value.as_deref(), Some("1299.99"));
        assert_eq!(price.currency, "USD");

        let price = parse_price(Some("£12 to £15"), "USD");
        assert_eq!(price.value.as_deref(), Some("12"));
        assert_eq!(price.currency, "GBP");
    }

    #[test]
    fn test_parse_price_malformed() {
        for raw in [Some("N/A"), Some(""), Some("$"), None] {
            let price = parse_price(raw, "USD");
            assert_eq!(price.value, None, "input {:?}", raw);
            assert_eq!(price.currency, "USD");
        }
        assert_eq!(parse_price_opt(Some("N/A"), "EUR"), None);
    }

    #[test]
    fn test_parse_price_uses_default_currency() {
        let price = parse_price(Some("12,000"), "KRW");
        assert_eq!(price.value.as_deref(), Some("12000"));
        assert_eq!(price.currency, "KRW");
    }

    #[test]
    fn test_parse_price_decimal_comma() {
        let price = parse_price(Some("€ 5,00"), "USD");
        assert_eq!(price.value.as_deref(), Some("5.00"));
        assert_eq!(price.currency, "EUR");

        let price = parse_price(Some("12,99 EUR"), "USD");
        assert_eq!(price.value.as_deref(), Some("12.99"));
        assert_eq!(price.currency, "EUR");

        let price = parse_price(Some("1.299,99 €"), "USD");
        assert_eq!(price.value.as_deref(), Some("1299.99"));

        let price = parse_price(Some("12,000"), "USD");
        assert_eq!(price.value.as_deref(), Some("12000"));
    }

    #[test]
    fn test_normalize_amount() {
        assert_eq!(normalize_amount("1,299.99").as_deref(), Some("1299.99"));
        assert_eq!(normalize_amount("1.234.567").as_deref(), Some("1234567"));
        assert_eq!(normalize_amount("1,234,567").as_deref(), Some("1234567"));
        assert_eq!(normalize_amount("12.5").as_deref(), Some("12.5"));
        assert_eq!(normalize_amount("7").as_deref(), Some("7"));
    }

    #[test]
    fn test_parse_discount() {
        assert_eq!(parse_discount(Some("12.5% off")), Some(12));
        assert_eq!(parse_discount(Some("85% OFF")), Some(85));
        assert_eq!(parse_discount(Some("-85%")), Some(85));
        assert_eq!(parse_discount(Some("Save 30 %")), Some(30));
        assert_eq!(parse_discount(Some("OFF")), None);
        assert_eq!(parse_discount(Some("%50")), None);
        assert_eq!(parse_discount(None), None);
    }

    #[test]
    fn test_parse_rating() {
        assert_eq!(parse_rating(Some("4.5 out of 5 stars")), Some(4.5));
        assert_eq!(parse_rating(Some("4.8")), Some(4.8));
        assert_eq!(parse_rating(Some("7.2")), None);
        assert_eq!(parse_rating(Some("no reviews")), None);
    }

    #[test]
    fn test_parse_sales() {
        assert_eq!(parse_sales(Some("1.2k sold")), Some(SalesCount::Exact(1200)));
        assert_eq!(parse_sales(Some("900+")), Some(SalesCount::AtLeast(900)));
        assert_eq!(
            parse_sales(Some("10,000+ sold")),
            Some(SalesCount::AtLeast(10_000))
        );
        assert_eq!(parse_sales(Some("37 sold")), Some(SalesCount::Exact(37)));
        assert_eq!(parse_sales(Some("2M+")), Some(SalesCount::AtLeast(2_000_000)));
        assert_eq!(parse_sales(Some("sold out")), None);
        assert_eq!(parse_sales(None), None);
    }

    #[test]
    fn test_sales_bounds() {
        assert_eq!(SalesCount::AtLeast(5).lower_bound(), Some(5));
        assert_eq!(SalesCount::AtLeast(5).as_exact(), None);
        assert_eq!(SalesCount::Raw("x1".into()).lower_bound(), None);
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(
            clean_text(Some("  Wireless \n  Earbuds ")),
            Some("Wireless Earbuds".to_string())
        );
        assert_eq!(clean_text(Some("   ")), None);
        assert_eq!(clean_text(None), None);
    }

    #[test]
    fn test_dedupe_preserves_first_occurrence_order() {
        let items = vec![
            item("a", "u1"),
            item("b", "u2"),
            item("a", "u1"),
            item("a", "u3"),
            item("b", "u2"),
        ];
        let out = dedupe(items);
        let keys: Vec<_> = out
            .iter()
            .map(|i| (i.title.clone().unwrap(), i.item_web_url.clone().unwrap()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("a".to_string(), "u1".to_string()),
                ("b".to_string(), "u2".to_string()),
                ("a".to_string(), "u3".to_string()),
            ]
        );
    }
}
