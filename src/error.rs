//! Error types for the search pipeline.
//!
//! Only [`ValidationError`] ever reaches an HTTP caller as a rejection.
//! Driver and scrape failures are folded into a failed
//! [`ScrapeResult`](crate::models::ScrapeResult) at the scraper boundary.

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::models::SearchResponse;

/// Bad request input, rejected before any browser is launched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("keyword must not be empty")]
    EmptyKeyword,

    #[error("limit must be between 1 and 200, got {0}")]
    LimitOutOfRange(i64),

    #[error("limit must be an integer, got '{0}'")]
    InvalidLimit(String),

    #[error("unsupported marketplace: {0}")]
    UnknownMarketplace(String),

    #[error("url must not be empty")]
    EmptyUrl,
}

impl IntoResponse for ValidationError {
    fn into_response(self) -> Response {
        let body = SearchResponse::failure(self.to_string());
        (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response()
    }
}

/// Errors raised by a page driver session.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    #[error("browser protocol error: {0}")]
    Protocol(String),

    #[error("invalid selector '{0}'")]
    Selector(String),

    #[error("browser unavailable: {0}")]
    Unavailable(String),
}

impl DriverError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, DriverError::Timeout { .. })
    }
}

/// Terminal failure of a single scrape.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// A wait exceeded the fixed operation budget.
    #[error("timeout")]
    Timeout,

    /// Network or browser level failure.
    #[error("{0}")]
    Failure(String),
}

impl From<DriverError> for ScrapeError {
    fn from(err: DriverError) -> Self {
        if err.is_timeout() {
            ScrapeError::Timeout
        } else {
            ScrapeError::Failure(err.to_string())
        }
    }
}

/// Failures talking to a marketplace's search API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("API request failed: HTTP {status} - {detail}")]
    Status { status: u16, detail: String },

    #[error("Token request failed: HTTP {status} - {detail}")]
    Token { status: u16, detail: String },

    #[error("no API token or app credentials configured")]
    MissingCredentials,

    #[error("Request timeout")]
    Timeout,

    #[error("Request error: {0}")]
    Request(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Request(err.to_string())
        }
    }
}

/// The worker running a bridged scrape did not hand back a result.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("scrape worker panicked: {0}")]
    Panicked(String),

    #[error("scrape worker was cancelled")]
    Cancelled,
}

impl From<tokio::task::JoinError> for BridgeError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_cancelled() {
            return BridgeError::Cancelled;
        }
        let payload = err.into_panic();
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        BridgeError::Panicked(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_timeout_maps_to_scrape_timeout() {
        let err = DriverError::Timeout {
            operation: "navigation".to_string(),
            after: Duration::from_secs(600),
        };
        let scrape: ScrapeError = err.into();
        assert!(matches!(scrape, ScrapeError::Timeout));
        assert_eq!(scrape.to_string(), "timeout");
    }

    #[test]
    fn test_driver_failure_keeps_message() {
        let err = DriverError::Navigation {
            url: "https://example.com".to_string(),
            message: "net::ERR_NAME_NOT_RESOLVED".to_string(),
        };
        let scrape: ScrapeError = err.into();
        assert!(scrape.to_string().contains("ERR_NAME_NOT_RESOLVED"));
    }

    #[test]
    fn test_api_status_message() {
        let err = ApiError::Status {
            status: 429,
            detail: "Too many requests".to_string(),
        };
        assert_eq!(err.to_string(), "API request failed: HTTP 429 - Too many requests");
        assert_eq!(ApiError::Timeout.to_string(), "Request timeout");
    }

    #[test]
    fn test_validation_messages() {
        assert_eq!(
            ValidationError::LimitOutOfRange(500).to_string(),
            "limit must be between 1 and 200, got 500"
        );
        assert_eq!(
            ValidationError::EmptyKeyword.to_string(),
            "keyword must not be empty"
        );
    }
}
