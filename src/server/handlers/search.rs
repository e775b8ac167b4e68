//! Product search endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use tracing::{info, warn};

use super::super::AppState;
use crate::error::ValidationError;
use crate::models::{Marketplace, SearchRequest, SearchResponse};
use crate::scrapers::bridge;

/// Query parameters shared by the search endpoints.
///
/// Values arrive as raw strings so malformed input is reported through the
/// response envelope instead of axum's plain-text rejection.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub keyword: Option<String>,
    pub limit: Option<String>,
    pub marketplace: Option<String>,
}

/// `GET /search?keyword=&limit=&marketplace=`
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ValidationError> {
    let marketplace = match params.marketplace.as_deref().map(str::trim) {
        None | Some("") => Marketplace::Aliexpress,
        Some(name) => Marketplace::from_str(name)
            .ok_or_else(|| ValidationError::UnknownMarketplace(name.to_string()))?,
    };
    run_search(&state, marketplace, &params).await
}

/// `GET /api/:marketplace/item_summary/search?keyword=&limit=`
pub async fn marketplace_search(
    State(state): State<AppState>,
    Path(marketplace): Path<String>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ValidationError> {
    let marketplace = Marketplace::from_str(&marketplace)
        .ok_or(ValidationError::UnknownMarketplace(marketplace))?;
    run_search(&state, marketplace, &params).await
}

async fn run_search(
    state: &AppState,
    marketplace: Marketplace,
    params: &SearchParams,
) -> Result<Json<SearchResponse>, ValidationError> {
    let request = SearchRequest::from_query(params.keyword.as_deref(), params.limit.as_deref())?;
    let scraper = state
        .registry
        .get(marketplace)
        .ok_or_else(|| ValidationError::UnknownMarketplace(marketplace.to_string()))?;

    info!(%marketplace, keyword = %request.keyword, limit = request.limit, "Search request");

    let SearchRequest { keyword, limit } = request;
    let response = match bridge::run(async move { scraper.search(&keyword, limit).await }).await {
        Ok(result) => SearchResponse::from(result),
        Err(e) => {
            warn!(%marketplace, "Search worker failed: {}", e);
            SearchResponse::failure(e.to_string())
        }
    };

    Ok(Json(response))
}
