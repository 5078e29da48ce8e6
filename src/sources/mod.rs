//! News sources, one module per tier
//!
//! Each tier implements [`NewsSource`]: given one unit (a handle, a feed URL
//! or a page URL) it returns normalized items for a topic. Tiers never see
//! each other; the fetcher decides the order.

pub mod display_names;
pub mod headlines;
pub mod social;
pub mod syndication;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::metrics;
use crate::schemas::{NewsItem, Topic};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTier {
    /// Recent posts from news handles
    Social,
    /// RSS / Atom feeds
    Feed,
    /// Headlines scraped from section-front pages
    Page,
}

impl SourceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTier::Social => metrics::TIER_SOCIAL,
            SourceTier::Feed => metrics::TIER_FEED,
            SourceTier::Page => metrics::TIER_PAGE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub id: String,
    pub name: String,
    pub tier: SourceTier,
}

/// Per-call fetch switches, passed down explicitly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// When false, nothing touches the network and fetches return no items
    pub auto_fetch: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self { auto_fetch: true }
    }
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn auto_fetch(mut self, enabled: bool) -> Self {
        self.auto_fetch = enabled;
        self
    }
}

#[async_trait]
pub trait NewsSource: Send + Sync {
    fn metadata(&self) -> &SourceMetadata;

    /// Fetches up to `limit` items from one unit, newest first.
    async fn fetch_unit(&self, unit: &str, topic: Topic, limit: usize) -> Result<Vec<NewsItem>>;

    fn tier(&self) -> SourceTier {
        self.metadata().tier
    }

    fn name(&self) -> &str {
        &self.metadata().name
    }
}

pub use display_names::display_name_for;
pub use headlines::{ClassPatternExtractor, HeadlineExtractor, HeadlineSource};
pub use social::{HttpSocialFeedAdapter, MockSocialFeedAdapter, SocialFeedAdapter, SocialFeedSource, SocialPost, TimelineParams};
pub use syndication::SyndicationSource;
