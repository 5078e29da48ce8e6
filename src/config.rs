//! Configuration for the digest service

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{DigestError, Result};
use crate::retry::RetryPolicy;
use crate::topics::TopicSourceConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // HTTP
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    // Retry
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_max_consecutive_empty")]
    pub max_consecutive_empty: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,

    // Fetching
    #[serde(default = "default_topic_fanout")]
    pub topic_fanout: usize,
    #[serde(default = "default_items_per_feed")]
    pub items_per_feed: usize,
    #[serde(default = "default_feed_content_max_chars")]
    pub feed_content_max_chars: usize,
    #[serde(default = "default_auto_fetch")]
    pub auto_fetch_enabled: bool,
    pub sources_file: Option<PathBuf>,

    // Social feed API (X API v2 shape)
    #[serde(default = "default_social_api_base_url")]
    pub social_api_base_url: String,
    pub social_bearer_token: Option<String>,

    // Rate limiting (requests per minute)
    #[serde(default = "default_social_rate_limit")]
    pub social_rate_limit_rpm: u32,
    #[serde(default = "default_feed_rate_limit")]
    pub feed_rate_limit_rpm: u32,

    // Circuit breaker
    #[serde(default = "default_circuit_breaker_threshold")]
    pub circuit_breaker_failure_threshold: u32,
    #[serde(default = "default_circuit_breaker_timeout")]
    pub circuit_breaker_open_duration_secs: u64,

    // Summarization
    pub summarizer_url: Option<String>,
    pub summarizer_token: Option<String>,
    #[serde(default = "default_summarizer_timeout")]
    pub summarizer_timeout_secs: u64,
    /// Char budget for digest text; unbounded when unset
    pub digest_max_chars: Option<usize>,

    // Delivery
    #[serde(default = "default_preferences_file")]
    pub preferences_file: PathBuf,
    #[serde(default = "default_delivery_delay")]
    pub delivery_delay_ms: u64,
    #[serde(default = "default_max_audio_secs")]
    pub max_audio_secs: u64,
}

fn default_request_timeout() -> u64 {
    10
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (compatible; NewsBhai/0.1)".to_string()
}

fn default_max_concurrent_requests() -> usize {
    10
}

fn default_max_retries() -> u32 {
    5
}

fn default_max_consecutive_empty() -> u32 {
    2
}

fn default_initial_backoff() -> u64 {
    500
}

fn default_max_backoff() -> u64 {
    8000
}

fn default_topic_fanout() -> usize {
    3
}

fn default_items_per_feed() -> usize {
    5
}

fn default_feed_content_max_chars() -> usize {
    300
}

fn default_auto_fetch() -> bool {
    true
}

fn default_social_api_base_url() -> String {
    "https://api.twitter.com/2".to_string()
}

fn default_social_rate_limit() -> u32 {
    15 // requests per minute across all handles
}

fn default_feed_rate_limit() -> u32 {
    120
}

fn default_circuit_breaker_threshold() -> u32 {
    5
}

fn default_circuit_breaker_timeout() -> u64 {
    30
}

fn default_summarizer_timeout() -> u64 {
    15
}

fn default_preferences_file() -> PathBuf {
    PathBuf::from("./data/preferences.json")
}

fn default_delivery_delay() -> u64 {
    1000
}

fn default_max_audio_secs() -> u64 {
    60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            user_agent: default_user_agent(),
            max_concurrent_requests: default_max_concurrent_requests(),
            max_retries: default_max_retries(),
            max_consecutive_empty: default_max_consecutive_empty(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
            topic_fanout: default_topic_fanout(),
            items_per_feed: default_items_per_feed(),
            feed_content_max_chars: default_feed_content_max_chars(),
            auto_fetch_enabled: default_auto_fetch(),
            sources_file: None,
            social_api_base_url: default_social_api_base_url(),
            social_bearer_token: None,
            social_rate_limit_rpm: default_social_rate_limit(),
            feed_rate_limit_rpm: default_feed_rate_limit(),
            circuit_breaker_failure_threshold: default_circuit_breaker_threshold(),
            circuit_breaker_open_duration_secs: default_circuit_breaker_timeout(),
            summarizer_url: None,
            summarizer_token: None,
            summarizer_timeout_secs: default_summarizer_timeout(),
            digest_max_chars: None,
            preferences_file: default_preferences_file(),
            delivery_delay_ms: default_delivery_delay(),
            max_audio_secs: default_max_audio_secs(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load .env file
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Rejects values that would make every fetch fail or hang
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_secs == 0 {
            return Err(DigestError::InvalidConfig("request_timeout_secs must be > 0".into()));
        }
        if self.topic_fanout == 0 {
            return Err(DigestError::InvalidConfig("topic_fanout must be > 0".into()));
        }
        if self.max_retries == 0 {
            return Err(DigestError::InvalidConfig("max_retries must be > 0".into()));
        }
        if self.max_concurrent_requests == 0 {
            return Err(DigestError::InvalidConfig("max_concurrent_requests must be > 0".into()));
        }
        if self.items_per_feed == 0 {
            return Err(DigestError::InvalidConfig("items_per_feed must be > 0".into()));
        }
        if self.social_rate_limit_rpm == 0 || self.feed_rate_limit_rpm == 0 {
            return Err(DigestError::InvalidConfig("rate limits must be > 0".into()));
        }
        if self.digest_max_chars == Some(0) {
            return Err(DigestError::InvalidConfig("digest_max_chars must be > 0 when set".into()));
        }
        if let Some(url) = &self.summarizer_url {
            url::Url::parse(url)?;
        }
        url::Url::parse(&self.social_api_base_url)?;
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Checks if the social feed API is configured
    pub fn has_social_api(&self) -> bool {
        self.social_bearer_token.is_some()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries,
            attempt_timeout: self.request_timeout(),
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            multiplier: 2.0,
            max_consecutive_empty: self.max_consecutive_empty,
        }
    }

    /// Built-in topic sources, overridden by `sources_file` when set
    pub fn topic_sources(&self) -> Result<TopicSourceConfig> {
        match &self.sources_file {
            Some(path) => TopicSourceConfig::load(path),
            None => Ok(TopicSourceConfig::builtin()),
        }
    }
}
