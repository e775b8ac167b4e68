//! Configuration management for pricescout.
//!
//! Settings are resolved once at startup: built-in defaults, then an optional
//! config file (`--config`, or `pricescout.toml` discovered by `prefer`), then
//! environment variables, then CLI flags. The result is
//! immutable; scrapers receive their own copy of [`ScraperSettings`].

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::humanize::Humanizer;

/// Name used to discover config files (`pricescout.toml` and friends).
pub const APP_NAME: &str = "pricescout";

/// Default operation budget for every time-bounded browser step.
pub const DEFAULT_TIMEOUT_MS: u64 = 600_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "text" | "pretty" => Some(LogFormat::Text),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

/// Browser launch options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Run without a visible window.
    pub headless: bool,

    /// Proxy server URL (e.g., "socks5://127.0.0.1:1080").
    pub proxy: Option<String>,

    /// Remote Chrome DevTools URL (e.g., "ws://localhost:9222").
    /// If set, connects to an existing browser instead of launching one.
    pub remote_url: Option<String>,

    /// Apply bot-detection countermeasures (launch flags and page scripts).
    pub stealth: bool,

    /// Explicit Chrome executable; searched for when unset.
    pub chrome_path: Option<PathBuf>,

    /// Additional Chrome arguments.
    pub chrome_args: Vec<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            proxy: None,
            remote_url: None,
            stealth: true,
            chrome_path: None,
            chrome_args: Vec::new(),
        }
    }
}

/// Per-scrape behavior shared by every marketplace scraper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperSettings {
    /// Budget for each navigation and selector wait, in milliseconds.
    pub timeout_ms: u64,
    pub ebay_domain: String,
    pub aliexpress_domain: String,
    pub aliexpress_lang: String,
    pub amazon_domain: String,
    /// Currency assumed when price text carries no symbol or code.
    pub default_currency: String,
    /// Skip items whose title does not contain the search keyword.
    pub require_keyword_in_title: bool,
    /// Humanized delay bounds, in milliseconds.
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ScraperSettings {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            ebay_domain: "com".to_string(),
            aliexpress_domain: "com".to_string(),
            aliexpress_lang: "en".to_string(),
            amazon_domain: "com".to_string(),
            default_currency: "USD".to_string(),
            require_keyword_in_title: false,
            min_delay_ms: 1000,
            max_delay_ms: 2800,
        }
    }
}

impl ScraperSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn humanizer(&self) -> Humanizer {
        Humanizer::new(
            Duration::from_millis(self.min_delay_ms),
            Duration::from_millis(self.max_delay_ms),
        )
    }
}

/// eBay Browse API credentials. When configured, eBay searches go through
/// the API instead of the result page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EbayApiSettings {
    pub api_url: String,
    pub token_url: String,
    pub scope: String,
    pub marketplace_id: String,
    /// Value for `X-EBAY-C-ENDUSERCTX`, e.g. "contextualLocation=country=US".
    pub enduserctx: Option<String>,
    pub app_id: Option<String>,
    pub cert_id: Option<String>,
    /// Pre-issued application token. Used as-is until the API rejects it.
    pub token: Option<String>,
}

impl Default for EbayApiSettings {
    fn default() -> Self {
        Self {
            api_url: "https://api.ebay.com/buy/browse/v1/item_summary/search".to_string(),
            token_url: "https://api.ebay.com/identity/v1/oauth2/token".to_string(),
            scope: "https://api.ebay.com/oauth/api_scope".to_string(),
            marketplace_id: "EBAY_US".to_string(),
            enduserctx: None,
            app_id: None,
            cert_id: None,
            token: None,
        }
    }
}

impl EbayApiSettings {
    /// App credentials for the client-credentials grant, when both are set.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.app_id.as_deref(), self.cert_id.as_deref()) {
            (Some(app), Some(cert)) => Some((app, cert)),
            _ => None,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.token.is_some() || self.credentials().is_some()
    }
}

/// Application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub log_format: LogFormat,
    pub browser: BrowserSettings,
    pub scraper: ScraperSettings,
    pub ebay_api: EbayApiSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8003,
            log_format: LogFormat::default(),
            browser: BrowserSettings::default(),
            scraper: ScraperSettings::default(),
            ebay_api: EbayApiSettings::default(),
        }
    }
}

fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn non_empty(val: String) -> Option<String> {
    let trimmed = val.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Find a `pricescout` config file in the standard locations.
async fn discover_config_file() -> Option<PathBuf> {
    match prefer::load(APP_NAME).await {
        Ok(found) => {
            let path = found.source_path().map(|p| p.to_path_buf());
            if let Some(ref path) = path {
                debug!("Using config file {}", path.display());
            }
            path
        }
        Err(_) => {
            debug!("No config file found, using defaults");
            None
        }
    }
}

impl Settings {
    /// Load settings from `path`, or from a `pricescout` config file found
    /// in the standard locations, then apply environment overrides.
    pub async fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let found = match path {
            Some(path) => Some(path.to_path_buf()),
            None => discover_config_file().await,
        };
        Self::load_from(found.as_deref())
    }

    /// Settings from an optional file plus environment overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        let settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        Ok(settings.with_env_overrides())
    }

    /// Parse a settings file (TOML, or JSON by extension). Missing keys keep
    /// their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
        match ext {
            "json" => serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            _ => toml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Apply overrides from the process environment.
    ///
    /// - `PRICESCOUT_HOST`, `PRICESCOUT_PORT`: listen address
    /// - `LOG_FORMAT`: "text" or "json"
    /// - `BROWSER_HEADLESS`, `BROWSER_STEALTH`: booleans
    /// - `BROWSER_PROXY`: proxy URL for the browser
    /// - `BROWSER_URL`: remote DevTools URL to connect to instead of launching
    /// - `CHROME_PATH`: Chrome executable
    /// - `SCRAPE_TIMEOUT_MS`: per-operation budget
    /// - `EBAY_DOMAIN`, `ALIEXPRESS_DOMAIN`, `AMAZON_DOMAIN`: domain suffixes
    /// - `ALIEXPRESS_LANG`: AliExpress UI language
    /// - `DEFAULT_CURRENCY`: currency for prices without a symbol
    /// - `REQUIRE_KEYWORD_IN_TITLE`: drop results whose title lacks the keyword
    /// - `EBAY_APP_ID`, `EBAY_CERT_ID`, `EBAY_API_TOKEN`: Browse API credentials
    /// - `EBAY_API_URL`, `EBAY_MARKETPLACE_ID`, `EBAY_ENDUSERCTX`: Browse API request
    pub fn with_env_overrides(self) -> Self {
        self.apply_env(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable source.
    pub fn apply_env(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(host) = var("PRICESCOUT_HOST").and_then(non_empty) {
            self.host = host;
        }
        if let Some(port) = var("PRICESCOUT_PORT").and_then(|v| v.trim().parse().ok()) {
            self.port = port;
        }
        if let Some(format) = var("LOG_FORMAT").and_then(|v| LogFormat::from_str(&v)) {
            self.log_format = format;
        }

        if let Some(headless) = var("BROWSER_HEADLESS").and_then(|v| parse_bool(&v)) {
            self.browser.headless = headless;
        }
        if let Some(stealth) = var("BROWSER_STEALTH").and_then(|v| parse_bool(&v)) {
            self.browser.stealth = stealth;
        }
        if let Some(proxy) = var("BROWSER_PROXY").and_then(non_empty) {
            self.browser.proxy = Some(proxy);
        }
        if let Some(url) = var("BROWSER_URL").and_then(non_empty) {
            self.browser.remote_url = Some(url);
        }
        if let Some(path) = var("CHROME_PATH").and_then(non_empty) {
            self.browser.chrome_path = Some(PathBuf::from(path));
        }

        let scraper = &mut self.scraper;
        if let Some(ms) = var("SCRAPE_TIMEOUT_MS").and_then(|v| v.trim().parse().ok()) {
            scraper.timeout_ms = ms;
        }
        if let Some(domain) = var("EBAY_DOMAIN").and_then(non_empty) {
            scraper.ebay_domain = domain;
        }
        if let Some(domain) = var("ALIEXPRESS_DOMAIN").and_then(non_empty) {
            scraper.aliexpress_domain = domain;
        }
        if let Some(lang) = var("ALIEXPRESS_LANG").and_then(non_empty) {
            scraper.aliexpress_lang = lang;
        }
        if let Some(domain) = var("AMAZON_DOMAIN").and_then(non_empty) {
            scraper.amazon_domain = domain;
        }
        if let Some(currency) = var("DEFAULT_CURRENCY").and_then(non_empty) {
            scraper.default_currency = currency.to_uppercase();
        }
        if let Some(required) = var("REQUIRE_KEYWORD_IN_TITLE").and_then(|v| parse_bool(&v)) {
            scraper.require_keyword_in_title = required;
        }

        let ebay = &mut self.ebay_api;
        if let Some(app_id) = var("EBAY_APP_ID").and_then(non_empty) {
            ebay.app_id = Some(app_id);
        }
        if let Some(cert_id) = var("EBAY_CERT_ID").and_then(non_empty) {
            ebay.cert_id = Some(cert_id);
        }
        if let Some(token) = var("EBAY_API_TOKEN").and_then(non_empty) {
            ebay.token = Some(token);
        }
        if let Some(url) = var("EBAY_API_URL").and_then(non_empty) {
            ebay.api_url = url;
        }
        if let Some(id) = var("EBAY_MARKETPLACE_ID").and_then(non_empty) {
            ebay.marketplace_id = id;
        }
        if let Some(ctx) = var("EBAY_ENDUSERCTX").and_then(non_empty) {
            ebay.enduserctx = Some(ctx);
        }

        self
    }
}
