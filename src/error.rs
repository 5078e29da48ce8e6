//! Error types for the digest pipeline

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DigestError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Feed parsing failed: {0}")]
    FeedError(#[from] feed_rs::parser::ParseFeedError),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Rate limit exceeded for {0}")]
    RateLimited(String),

    #[error("Source blocked the request: {0}")]
    Blocked(String),

    #[error("Circuit breaker open for source: {0}")]
    CircuitBreakerOpen(String),

    #[error("API error: {code} - {message}")]
    ApiError {
        code: String,
        message: String,
    },

    #[error("Request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("No usable items from {0}")]
    EmptyResult(String),

    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Summarization failed: {0}")]
    SummarizationFailed(String),

    #[error("Localization table incomplete: {0}")]
    LocalizationIncomplete(String),

    #[error("Source not configured: {0}")]
    SourceNotConfigured(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl DigestError {
    /// Upstream told us to go away; retrying the same unit only makes it worse.
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            DigestError::RateLimited(_) | DigestError::Blocked(_) | DigestError::CircuitBreakerOpen(_)
        )
    }

    /// Whether another attempt against the same source unit may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            DigestError::HttpError(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            DigestError::Timeout(_) | DigestError::EmptyResult(_) => true,
            DigestError::ApiError { code, .. } => code.starts_with('5') || code.starts_with("408"),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, DigestError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_blocking_classification() {
        assert!(DigestError::RateLimited("x".into()).is_blocking());
        assert!(DigestError::Blocked("x".into()).is_blocking());
        assert!(!DigestError::Timeout(Duration::from_secs(1)).is_blocking());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(DigestError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(DigestError::EmptyResult("feed".into()).is_retryable());
        assert!(DigestError::ApiError { code: "503 Service Unavailable".into(), message: String::new() }.is_retryable());
        assert!(!DigestError::ApiError { code: "404 Not Found".into(), message: String::new() }.is_retryable());
        assert!(!DigestError::ParseError("bad".into()).is_retryable());
    }
}
