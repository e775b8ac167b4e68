//! eBay Browse API search.
//!
//! Used instead of scraping eBay result pages when an application token or
//! app credentials are configured. Item summaries are mapped onto
//! [`ScrapedItem`]; fields without a counterpart are kept in `extra`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::ProductSearch;
use crate::config::EbayApiSettings;
use crate::error::ApiError;
use crate::models::{Marketplace, Price, ScrapeResult, ScrapedItem};
use crate::normalize::dedupe;

/// Tokens are refreshed this long before eBay says they expire.
const TOKEN_EXPIRY_MARGIN_SECS: u64 = 60;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Option<Instant>,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        self.expires_at.map_or(true, |at| Instant::now() < at)
    }
}

pub struct EbayApiSearch {
    client: Client,
    settings: EbayApiSettings,
    token: Mutex<Option<CachedToken>>,
}

impl EbayApiSearch {
    pub fn new(settings: EbayApiSettings, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("pricescout/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            settings,
            token: Mutex::new(None),
        })
    }

    /// Current access token. With `refresh`, a new one is requested with the
    /// app credentials even if a cached token exists.
    async fn access_token(&self, refresh: bool) -> Result<String, ApiError> {
        let mut cached = self.token.lock().await;

        if !refresh {
            if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
                return Ok(token.value.clone());
            }
            if cached.is_none() {
                if let Some(value) = &self.settings.token {
                    *cached = Some(CachedToken {
                        value: value.clone(),
                        expires_at: None,
                    });
                    return Ok(value.clone());
                }
            }
        }

        let (app_id, cert_id) = self
            .settings
            .credentials()
            .ok_or(ApiError::MissingCredentials)?;
        let token = self.fetch_token(app_id, cert_id).await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    /// Client-credentials grant against the OAuth token endpoint.
    async fn fetch_token(&self, app_id: &str, cert_id: &str) -> Result<CachedToken, ApiError> {
        debug!("Requesting eBay application token");
        let response = self
            .client
            .post(&self.settings.token_url)
            .basic_auth(app_id, Some(cert_id))
            .form(&[
                ("grant_type", "client_credentials"),
                ("scope", self.settings.scope.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ApiError::Token {
                status: status.as_u16(),
                detail: detail.trim().to_string(),
            });
        }

        let token: TokenResponse = response.json().await?;
        let expires_at = token.expires_in.map(|secs| {
            Instant::now() + Duration::from_secs(secs.saturating_sub(TOKEN_EXPIRY_MARGIN_SECS))
        });
        Ok(CachedToken {
            value: token.access_token,
            expires_at,
        })
    }

    async fn send_search(
        &self,
        token: &str,
        keyword: &str,
        limit: usize,
    ) -> Result<reqwest::Response, ApiError> {
        let mut request = self
            .client
            .get(&self.settings.api_url)
            .bearer_auth(token)
            .header("X-EBAY-C-MARKETPLACE-ID", self.settings.marketplace_id.as_str())
            .query(&[("q", keyword.to_string()), ("limit", limit.to_string())]);
        if let Some(ctx) = &self.settings.enduserctx {
            request = request.header("X-EBAY-C-ENDUSERCTX", ctx.as_str());
        }
        Ok(request.send().await?)
    }

    /// Raw search response. A rejected token is refreshed once when app
    /// credentials are available.
    async fn fetch(&self, keyword: &str, limit: usize) -> Result<Value, ApiError> {
        let token = self.access_token(false).await?;
        let mut response = self.send_search(&token, keyword, limit).await?;

        if response.status() == StatusCode::UNAUTHORIZED && self.settings.credentials().is_some() {
            warn!("eBay rejected the access token, refreshing");
            let token = self.access_token(true).await?;
            response = self.send_search(&token, keyword, limit).await?;
        }

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                detail: detail.trim().to_string(),
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl ProductSearch for EbayApiSearch {
    fn marketplace(&self) -> Marketplace {
        Marketplace::Ebay
    }

    async fn search(&self, keyword: &str, limit: usize) -> ScrapeResult {
        info!(marketplace = %Marketplace::Ebay, keyword, limit, "Searching eBay Browse API");
        match self.fetch(keyword, limit).await {
            Ok(data) => {
                let result = parse_search_response(&data, limit);
                info!(
                    items = result.items().len(),
                    total = result.total(),
                    "eBay API search complete"
                );
                result
            }
            Err(e) => {
                error!(keyword, "eBay API search failed: {}", e);
                ScrapeResult::failure(e.to_string())
            }
        }
    }
}

/// Map a Browse API `item_summary/search` response onto a result set.
pub fn parse_search_response(data: &Value, limit: usize) -> ScrapeResult {
    let summaries = data
        .get("itemSummaries")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let items: Vec<ScrapedItem> = summaries
        .iter()
        .filter_map(|summary| match summary_to_item(summary) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!("Skipping malformed eBay item summary: {}", e);
                None
            }
        })
        .filter(|item| !item.is_unidentifiable())
        .collect();

    let mut items = dedupe(items);
    items.truncate(limit);

    let total = data
        .get("total")
        .and_then(Value::as_u64)
        .map(|t| t as usize);
    ScrapeResult::success(items, total)
}

fn summary_to_item(summary: &Value) -> serde_json::Result<ScrapedItem> {
    let mut item: ScrapedItem = serde_json::from_value(summary.clone())?;

    if let Some(marketing) = item.extra.get("marketingPrice") {
        if item.original_price.is_none() {
            item.original_price = marketing
                .get("originalPrice")
                .and_then(|p| serde_json::from_value::<Price>(p.clone()).ok());
        }
        if item.discount.is_none() {
            item.discount = marketing
                .get("discountPercentage")
                .and_then(|d| d.as_str().and_then(|s| s.parse::<u32>().ok()).or(d.as_u64().map(|n| n as u32)))
                .map(|d| format!("{}%", d));
        }
    }

    if item.category.is_none() {
        item.category = item
            .extra
            .get("categories")
            .and_then(Value::as_array)
            .and_then(|cats| cats.first())
            .and_then(|cat| cat.get("categoryName"))
            .and_then(Value::as_str)
            .map(str::to_string);
    }

    Ok(item)
}
