//! Currency detection and conversion.
//!
//! Rates are stored as "USD per one unit" of each currency, so every
//! conversion goes through USD. A static fallback table is always available;
//! a live table can be fetched from a public exchange-rate API.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

const RATES_API_URL: &str = "https://api.exchangerate-api.com/v4/latest";

/// USD value of one unit of each known currency.
const FALLBACK_USD_RATES: &[(&str, f64)] = &[
    ("USD", 1.0),
    ("EUR", 1.10),
    ("GBP", 1.27),
    ("CAD", 0.74),
    ("AUD", 0.66),
    ("JPY", 0.0067),
    ("KRW", 0.00075),
];

/// Symbol prefixes checked in order. Multi-character symbols come first so
/// `C$` is not read as plain `$`.
const SYMBOLS: &[(&str, &str)] = &[
    ("C$", "CAD"),
    ("CA$", "CAD"),
    ("AU$", "AUD"),
    ("A$", "AUD"),
    ("US$", "USD"),
    ("£", "GBP"),
    ("€", "EUR"),
    ("₩", "KRW"),
    ("¥", "JPY"),
    ("$", "USD"),
];

/// Detect a currency from symbols or ISO codes in raw price text.
pub fn detect_currency(text: &str) -> Option<&'static str> {
    let upper = text.to_uppercase();
    for (code, _) in FALLBACK_USD_RATES {
        if upper.contains(code) {
            return Some(code);
        }
    }
    SYMBOLS
        .iter()
        .find(|(symbol, _)| text.contains(symbol))
        .map(|(_, code)| *code)
}

#[derive(Debug, Deserialize)]
struct RatesResponse {
    rates: HashMap<String, f64>,
}

/// Exchange rates relative to USD.
#[derive(Debug, Clone)]
pub struct CurrencyTable {
    usd_rates: HashMap<String, f64>,
}

impl Default for CurrencyTable {
    fn default() -> Self {
        Self::fallback()
    }
}

impl CurrencyTable {
    /// The built-in static table.
    pub fn fallback() -> Self {
        Self {
            usd_rates: FALLBACK_USD_RATES
                .iter()
                .map(|(code, rate)| (code.to_string(), *rate))
                .collect(),
        }
    }

    /// Fetch live rates for `base`. Any failure logs a warning and returns
    /// the fallback table.
    pub async fn fetch(client: &reqwest::Client, base: &str) -> Self {
        match Self::try_fetch(client, base).await {
            Ok(table) => table,
            Err(e) => {
                warn!(base, "Failed to fetch exchange rates, using fallback: {}", e);
                Self::fallback()
            }
        }
    }

    async fn try_fetch(client: &reqwest::Client, base: &str) -> Result<Self, reqwest::Error> {
        let base = base.to_uppercase();
        let url = format!("{}/{}", RATES_API_URL, base);
        let body: RatesResponse = client
            .get(&url)
            .timeout(Duration::from_secs(10))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!(base = %base, count = body.rates.len(), "Fetched exchange rates");
        Ok(Self::from_base_rates(&base, &body.rates))
    }

    /// Build a table from "units of X per one `base`" rates, as returned by
    /// the rates API.
    pub fn from_base_rates(base: &str, rates: &HashMap<String, f64>) -> Self {
        let base_per_usd = if base.eq_ignore_ascii_case("USD") {
            1.0
        } else {
            rates.get("USD").copied().filter(|r| *r > 0.0).unwrap_or(1.0)
        };

        let mut usd_rates: HashMap<String, f64> = rates
            .iter()
            .filter(|(_, r)| **r > 0.0)
            .map(|(code, per_base)| (code.to_uppercase(), base_per_usd / per_base))
            .collect();
        usd_rates.insert("USD".to_string(), 1.0);
        Self { usd_rates }
    }

    /// USD value of one unit of `code`. Unknown codes are treated as 1.0.
    pub fn usd_rate(&self, code: &str) -> f64 {
        self.usd_rates
            .get(&code.to_uppercase())
            .copied()
            .unwrap_or(1.0)
    }

    /// Rate to multiply an amount in `from` by to get `to`.
    pub fn rate(&self, from: &str, to: &str) -> f64 {
        if from.eq_ignore_ascii_case(to) {
            return 1.0;
        }
        self.usd_rate(from) / self.usd_rate(to)
    }

    /// Convert `amount`, rounded to 2 decimals.
    pub fn convert(&self, amount: f64, from: &str, to: &str) -> f64 {
        round2(amount * self.rate(from, to))
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_currency_symbols() {
        assert_eq!(detect_currency("£12.99"), Some("GBP"));
        assert_eq!(detect_currency("€ 5,00"), Some("EUR"));
        assert_eq!(detect_currency("C$ 20.00"), Some("CAD"));
        assert_eq!(detect_currency("AU$19"), Some("AUD"));
        assert_eq!(detect_currency("₩15,000"), Some("KRW"));
        assert_eq!(detect_currency("¥1200"), Some("JPY"));
        assert_eq!(detect_currency("$9.99"), Some("USD"));
        assert_eq!(detect_currency("EUR 3.50"), Some("EUR"));
        assert_eq!(detect_currency("12.00"), None);
    }

    #[test]
    fn test_convert_through_usd() {
        let table = CurrencyTable::fallback();
        assert_eq!(table.convert(100.0, "EUR", "USD"), 110.0);
        assert_eq!(table.convert(127.0, "USD", "GBP"), 100.0);
        assert_eq!(table.convert(10_000.0, "KRW", "USD"), 7.5);
    }

    #[test]
    fn test_same_and_unknown_currency() {
        let table = CurrencyTable::fallback();
        assert_eq!(table.rate("usd", "USD"), 1.0);
        assert_eq!(table.convert(42.0, "XYZ", "USD"), 42.0);
    }

    #[test]
    fn test_from_base_rates_inverts_api_format() {
        let mut rates = HashMap::new();
        rates.insert("USD".to_string(), 1.0);
        rates.insert("EUR".to_string(), 0.5);
        let table = CurrencyTable::from_base_rates("USD", &rates);
        assert_eq!(table.usd_rate("EUR"), 2.0);
        assert_eq!(table.convert(10.0, "EUR", "USD"), 20.0);
    }
}
