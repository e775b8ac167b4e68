//! Service metadata and URL parsing endpoints.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use super::super::AppState;
use crate::error::ValidationError;
use crate::url_parser::{parse_product_url, UrlParseResponse};

/// Health check endpoint for container orchestration.
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "marketplaces": state.registry.marketplaces(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct ParseUrlParams {
    pub url: Option<String>,
}

/// `GET /api/parse-url?url=`
pub async fn parse_url(
    Query(params): Query<ParseUrlParams>,
) -> Result<Json<UrlParseResponse>, ValidationError> {
    let url = params
        .url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or(ValidationError::EmptyUrl)?;
    Ok(Json(parse_product_url(url)))
}
