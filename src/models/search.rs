//! Search request validation and the public response envelope.

use serde::{Deserialize, Serialize};

use super::item::{ScrapeResult, ScrapedItem};
use crate::error::ValidationError;

pub const DEFAULT_LIMIT: usize = 3;
pub const MAX_LIMIT: usize = 200;

/// A validated search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub keyword: String,
    pub limit: usize,
}

impl SearchRequest {
    pub fn new(keyword: &str, limit: Option<i64>) -> Result<Self, ValidationError> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(ValidationError::EmptyKeyword);
        }

        let limit = match limit {
            None => DEFAULT_LIMIT,
            Some(n) if n >= 1 && n <= MAX_LIMIT as i64 => n as usize,
            Some(n) => return Err(ValidationError::LimitOutOfRange(n)),
        };

        Ok(Self {
            keyword: keyword.to_string(),
            limit,
        })
    }

    /// Validate raw query-string values.
    pub fn from_query(
        keyword: Option<&str>,
        limit: Option<&str>,
    ) -> Result<Self, ValidationError> {
        let keyword = keyword.ok_or(ValidationError::EmptyKeyword)?;
        let limit = match limit.map(str::trim).filter(|s| !s.is_empty()) {
            None => None,
            Some(raw) => Some(
                raw.parse::<i64>()
                    .map_err(|_| ValidationError::InvalidLimit(raw.to_string()))?,
            ),
        };
        Self::new(keyword, limit)
    }
}

/// Response envelope shared by every search endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub success: bool,
    pub total: usize,
    pub item_summaries: Vec<ScrapedItem>,
    pub error: Option<String>,
}

impl SearchResponse {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            total: 0,
            item_summaries: Vec::new(),
            error: Some(error.into()),
        }
    }
}

impl From<ScrapeResult> for SearchResponse {
    fn from(result: ScrapeResult) -> Self {
        let success = result.is_success();
        let total = result.total();
        let error = result.error().map(str::to_string);
        Self {
            success,
            total,
            item_summaries: result.into_items(),
            error,
        }
    }
}
