//! HTTP Client Module
//!
//! [`ResilientHttpClient`] owns the shared `reqwest` client and a global
//! semaphore capping in-flight requests. It performs exactly one attempt and
//! classifies the response; retries belong to [`crate::retry::RetryPolicy`].
//!
//! [`SourceHttpClient`] adds a per-source-kind rate limiter and per-host
//! circuit breakers on top.

use governor::{clock::DefaultClock, middleware::NoOpMiddleware, state::InMemoryState, state::NotKeyed, Quota, RateLimiter};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::circuit_breaker::BreakerRegistry;
use crate::config::Config;
use crate::error::{DigestError, Result};

/// Longest upstream error body kept in an `ApiError`
const ERROR_BODY_LIMIT: usize = 200;

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Maximum concurrent requests across all sources
    pub max_concurrent_requests: usize,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 10,
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            user_agent: format!("NewsBhai/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl From<&Config> for HttpClientConfig {
    fn from(config: &Config) -> Self {
        Self {
            max_concurrent_requests: config.max_concurrent_requests,
            request_timeout: config.request_timeout(),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            user_agent: config.user_agent.clone(),
        }
    }
}

/// Shared HTTP client with concurrency limiting and status classification
pub struct ResilientHttpClient {
    client: Client,
    semaphore: Arc<Semaphore>,
}

impl ResilientHttpClient {
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_requests.max(1))),
        })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(HttpClientConfig::default())
    }

    pub fn inner(&self) -> &Client {
        &self.client
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Sends one request and returns the body text of a 2xx response.
    ///
    /// The permit is held until the body has been read.
    pub async fn send_text(&self, request: RequestBuilder) -> Result<String> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| DigestError::ParseError("HTTP semaphore closed".to_string()))?;

        let response = request.send().await?;
        let status = response.status();
        let url = response.url().to_string();
        debug!(status = %status, url = %url, "HTTP response");

        if status.is_success() {
            return Ok(response.text().await?);
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status, &url, &body))
    }

    pub async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let body = self.send_text(request).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Maps a non-success status to the error the retry runner understands
pub fn classify_status(status: StatusCode, url: &str, body: &str) -> DigestError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => DigestError::RateLimited(url.to_string()),
        StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => DigestError::Blocked(format!("{} ({})", url, status)),
        _ => DigestError::ApiError {
            code: status.to_string(),
            message: crate::text::take_chars(body, ERROR_BODY_LIMIT),
        },
    }
}

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// Client for one kind of source (social API, feeds, pages)
pub struct SourceHttpClient {
    client: Arc<ResilientHttpClient>,
    rate_limiter: DirectLimiter,
    breakers: Arc<BreakerRegistry>,
    source_kind: String,
}

impl SourceHttpClient {
    pub fn new(client: Arc<ResilientHttpClient>, source_kind: &str, rate_limit_rpm: u32, breakers: Arc<BreakerRegistry>) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(rate_limit_rpm).unwrap_or(NonZeroU32::MIN));

        Self {
            client,
            rate_limiter: RateLimiter::direct(quota),
            breakers,
            source_kind: source_kind.to_string(),
        }
    }

    pub fn source_kind(&self) -> &str {
        &self.source_kind
    }

    /// GET a document (feed, page) as text
    pub async fn get_text(&self, url: &str) -> Result<String> {
        let request = self.client.inner().get(url);
        self.execute_with_protection(url, self.client.send_text(request)).await
    }

    /// GET a JSON API with query parameters and an optional bearer token
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)], bearer: Option<&str>) -> Result<T> {
        let mut request = self.client.inner().get(url).query(query);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        self.execute_with_protection(url, self.client.send_json(request)).await
    }

    /// POST a JSON body and decode a JSON reply
    pub async fn post_json<B, T>(&self, url: &str, body: &B, bearer: Option<&str>) -> Result<T>
    where
        B: serde::Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = self.client.inner().post(url).json(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        self.execute_with_protection(url, self.client.send_json(request)).await
    }

    async fn execute_with_protection<T, F>(&self, url: &str, call: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        let host = url::Url::parse(url)?
            .host_str()
            .map(str::to_string)
            .unwrap_or_else(|| self.source_kind.clone());
        let breaker = self.breakers.for_host(&host);

        // Wait for quota before taking the probe slot
        self.rate_limiter.until_ready().await;

        let Some(permit) = breaker.try_acquire() else {
            warn!(source = %self.source_kind, host = %host, "Circuit breaker open, request blocked");
            return Err(DigestError::CircuitBreakerOpen(host));
        };

        match call.await {
            Ok(value) => {
                permit.success();
                Ok(value)
            }
            Err(e) => {
                permit.failure();
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_semaphore_limiting() {
        let config = HttpClientConfig {
            max_concurrent_requests: 2,
            ..Default::default()
        };
        let client = ResilientHttpClient::new(config).unwrap();
        assert_eq!(client.available_permits(), 2);
    }

    #[test]
    fn test_status_classification() {
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, "u", "").is_blocking());
        assert!(classify_status(StatusCode::FORBIDDEN, "u", "").is_blocking());
        assert!(classify_status(StatusCode::SERVICE_UNAVAILABLE, "u", "").is_retryable());
        assert!(classify_status(StatusCode::GATEWAY_TIMEOUT, "u", "").is_retryable());

        let not_found = classify_status(StatusCode::NOT_FOUND, "u", "missing");
        assert!(!not_found.is_retryable());
        assert!(!not_found.is_blocking());
    }

    #[test]
    fn test_social_quota_is_per_minute() {
        let http = Arc::new(ResilientHttpClient::with_defaults().unwrap());
        let rpm = Config::default().social_rate_limit_rpm;
        let client = SourceHttpClient::new(http, "social", rpm, Arc::new(BreakerRegistry::default()));

        for _ in 0..rpm {
            assert!(client.rate_limiter.check().is_ok());
        }
        assert!(client.rate_limiter.check().is_err());
    }

    #[test]
    fn test_config_from_app_config() {
        let app = Config {
            max_concurrent_requests: 4,
            ..Config::default()
        };
        let http = HttpClientConfig::from(&app);
        assert_eq!(http.max_concurrent_requests, 4);
        assert_eq!(http.request_timeout, Duration::from_secs(10));
    }
}
