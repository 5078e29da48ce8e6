//! NewsBhai digest core
//!
//! Fetches news for a user's topics from unreliable upstreams and turns it
//! into a short, localized, speakable digest.
//!
//! Features:
//! - Tiered sources: social handles, then RSS/Atom feeds; section-front
//!   scraping for current affairs
//! - Bounded retry with exponential backoff and jitter on every tier
//! - Per-host circuit breakers, per-source rate limits, global concurrency cap
//! - URL and title deduplication
//! - Keyword relevance ranking for questions
//! - Topic-grouped digests with summarizer fallback and length budgets
//! - Hindi, English and Hinglish phrase tables checked at startup
//! - Prometheus metrics per tier and per delivery

pub mod circuit_breaker;
pub mod collaborators;
pub mod config;
pub mod dedup;
pub mod error;
pub mod fetcher;
pub mod http_client;
pub mod localization;
pub mod metrics;
pub mod ranker;
pub mod retry;
pub mod schemas;
pub mod service;
pub mod sources;
pub mod synthesizer;
pub mod text;
pub mod topics;

pub use config::Config;
pub use error::{DigestError, Result};
pub use fetcher::NewsFetcher;
pub use schemas::{Digest, DigestRequest, Language, NewsItem, Topic, UpdateKind};
pub use service::NewsService;
pub use sources::FetchOptions;
pub use synthesizer::DigestSynthesizer;
pub use topics::TopicSourceConfig;
