//! Social feed tier
//!
//! Reads recent posts from news handles through a [`SocialFeedAdapter`], so
//! the official X API v2, another provider, or a mock can sit behind it.
//! Only posts that pass the news gate become items.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

use super::{NewsSource, SourceMetadata, SourceTier};
use crate::error::{DigestError, Result};
use crate::http_client::SourceHttpClient;
use crate::ranker::{is_news_like, relevance_score};
use crate::retry::RetryPolicy;
use crate::schemas::{NewsItem, Topic};

/// Timeline look-back for digests
pub const TIMELINE_WINDOW_HOURS: i64 = 24;
/// Look-back for keyword search
pub const SEARCH_WINDOW_DAYS: i64 = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialPost {
    pub id: String,
    pub handle: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub url: String,
    #[serde(default)]
    pub is_reply: bool,
    #[serde(default)]
    pub is_repost: bool,
}

impl SocialPost {
    pub fn new(id: impl Into<String>, handle: impl Into<String>, text: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        let id = id.into();
        let handle = handle.into();
        Self {
            url: format!("https://x.com/{}/status/{}", handle, id),
            id,
            handle,
            text: text.into(),
            created_at,
            is_reply: false,
            is_repost: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TimelineParams {
    pub since: DateTime<Utc>,
    pub max_results: u32,
}

impl TimelineParams {
    pub fn last_hours(hours: i64, max_results: u32) -> Self {
        Self {
            since: Utc::now() - Duration::hours(hours),
            max_results,
        }
    }
}

#[async_trait]
pub trait SocialFeedAdapter: Send + Sync {
    fn name(&self) -> &str;

    /// Recent original posts (no replies, no reposts) from a handle
    async fn timeline(&self, handle: &str, params: &TimelineParams) -> Result<Vec<SocialPost>>;

    /// Posts from a handle matching any of the keywords
    async fn search(&self, handle: &str, keywords: &[String], params: &TimelineParams) -> Result<Vec<SocialPost>>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<ApiTweet>,
}

#[derive(Debug, Deserialize)]
struct ApiTweet {
    id: String,
    text: String,
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    referenced_tweets: Vec<ApiReference>,
}

#[derive(Debug, Deserialize)]
struct ApiReference {
    #[serde(rename = "type")]
    kind: String,
}

/// X API v2 recent-search adapter
///
/// Both operations go through `/tweets/search/recent` with a `from:` query,
/// which avoids resolving handles to user ids first.
pub struct HttpSocialFeedAdapter {
    client: Arc<SourceHttpClient>,
    base_url: String,
    bearer_token: String,
}

impl HttpSocialFeedAdapter {
    pub fn new(client: Arc<SourceHttpClient>, base_url: impl Into<String>, bearer_token: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bearer_token: bearer_token.into(),
        }
    }

    async fn recent_search(&self, handle: &str, query: String, params: &TimelineParams) -> Result<Vec<SocialPost>> {
        let url = format!("{}/tweets/search/recent", self.base_url);
        let query_params = [
            ("query", query),
            ("max_results", params.max_results.clamp(10, 100).to_string()),
            ("start_time", params.since.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)),
            ("tweet.fields", "created_at,referenced_tweets".to_string()),
        ];

        let response: SearchResponse = self.client.get_json(&url, &query_params, Some(&self.bearer_token)).await?;

        Ok(response
            .data
            .into_iter()
            .map(|tweet| {
                let mut post = SocialPost::new(tweet.id, handle, tweet.text, tweet.created_at.unwrap_or_else(Utc::now));
                post.is_reply = tweet.referenced_tweets.iter().any(|r| r.kind == "replied_to");
                post.is_repost = tweet.referenced_tweets.iter().any(|r| r.kind == "retweeted");
                post
            })
            .collect())
    }
}

#[async_trait]
impl SocialFeedAdapter for HttpSocialFeedAdapter {
    fn name(&self) -> &str {
        "X API v2"
    }

    async fn timeline(&self, handle: &str, params: &TimelineParams) -> Result<Vec<SocialPost>> {
        let query = format!("from:{} -is:reply -is:retweet", handle);
        self.recent_search(handle, query, params).await
    }

    async fn search(&self, handle: &str, keywords: &[String], params: &TimelineParams) -> Result<Vec<SocialPost>> {
        if keywords.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!("from:{} ({}) -is:reply -is:retweet", handle, keywords.join(" OR "));
        self.recent_search(handle, query, params).await
    }
}

/// In-memory adapter for tests and offline runs
#[derive(Default)]
pub struct MockSocialFeedAdapter {
    posts: HashMap<String, Vec<SocialPost>>,
    rate_limited: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl MockSocialFeedAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_posts(mut self, handle: &str, posts: Vec<SocialPost>) -> Self {
        self.posts.insert(handle.to_string(), posts);
        self
    }

    /// Every call for this handle answers with a rate-limit error
    pub fn rate_limited(mut self, handle: &str) -> Self {
        self.rate_limited.insert(handle.to_string());
        self
    }

    /// Handles requested so far, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn answer(&self, handle: &str, params: &TimelineParams) -> Result<Vec<SocialPost>> {
        self.calls.lock().push(handle.to_string());
        if self.rate_limited.contains(handle) {
            return Err(DigestError::RateLimited(format!("@{}", handle)));
        }
        Ok(self
            .posts
            .get(handle)
            .map(|posts| posts.iter().filter(|p| p.created_at >= params.since).cloned().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl SocialFeedAdapter for MockSocialFeedAdapter {
    fn name(&self) -> &str {
        "Mock social feed"
    }

    async fn timeline(&self, handle: &str, params: &TimelineParams) -> Result<Vec<SocialPost>> {
        self.answer(handle, params)
    }

    async fn search(&self, handle: &str, keywords: &[String], params: &TimelineParams) -> Result<Vec<SocialPost>> {
        let posts = self.answer(handle, params)?;
        Ok(posts.into_iter().filter(|p| relevance_score(&p.text, keywords) > 0.0).collect())
    }
}

/// Social tier: one unit is one handle
pub struct SocialFeedSource {
    adapter: Arc<dyn SocialFeedAdapter>,
    retry: RetryPolicy,
    metadata: SourceMetadata,
}

impl SocialFeedSource {
    pub fn new(adapter: Arc<dyn SocialFeedAdapter>, retry: RetryPolicy) -> Self {
        let metadata = SourceMetadata {
            id: "social".to_string(),
            name: format!("Social feed ({})", adapter.name()),
            tier: SourceTier::Social,
        };
        Self { adapter, retry, metadata }
    }

    fn posts_to_items(posts: Vec<SocialPost>, handle: &str, topic: Topic, limit: usize) -> Vec<NewsItem> {
        let mut items: Vec<NewsItem> = posts
            .into_iter()
            .filter(|p| !p.is_reply && !p.is_repost)
            .filter(|p| is_news_like(&p.text))
            .filter_map(|p| NewsItem::new("", &p.text, format!("@{}", handle), p.url, Some(p.created_at), topic))
            .collect();

        items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        items.truncate(limit);
        items
    }

    /// Keyword search within one handle, scored against the keywords
    pub async fn search_unit(&self, handle: &str, keywords: &[String], topic: Topic, limit: usize) -> Result<Vec<NewsItem>> {
        let params = TimelineParams::last_hours(SEARCH_WINDOW_DAYS * 24, (limit as u32).max(10));
        let adapter = &self.adapter;
        let params_ref = &params;

        let posts = self
            .retry
            .run(&format!("@{} search", handle), move |_| async move {
                adapter.search(handle, keywords, params_ref).await
            })
            .await?;

        let mut items: Vec<NewsItem> = posts
            .into_iter()
            .filter(|p| !p.is_reply && !p.is_repost)
            .filter_map(|p| {
                let score = relevance_score(&p.text, keywords);
                NewsItem::new("", &p.text, format!("@{}", handle), p.url, Some(p.created_at), topic)
                    .map(|item| item.with_relevance(score))
            })
            .collect();
        items.truncate(limit);

        debug!(handle = %handle, items = items.len(), "Social search finished");
        Ok(items)
    }
}

#[async_trait]
impl NewsSource for SocialFeedSource {
    fn metadata(&self) -> &SourceMetadata {
        &self.metadata
    }

    async fn fetch_unit(&self, handle: &str, topic: Topic, limit: usize) -> Result<Vec<NewsItem>> {
        let params = TimelineParams::last_hours(TIMELINE_WINDOW_HOURS, (limit as u32).max(10));
        let adapter = &self.adapter;
        let params_ref = &params;

        let posts = self
            .retry
            .run(&format!("@{}", handle), move |_| async move {
                let posts = adapter.timeline(handle, params_ref).await?;
                if posts.is_empty() {
                    Err(DigestError::EmptyResult(format!("@{}", handle)))
                } else {
                    Ok(posts)
                }
            })
            .await?;

        let fetched = posts.len();
        let items = Self::posts_to_items(posts, handle, topic, limit);
        info!(
            handle = %handle,
            topic = %topic,
            posts = fetched,
            items = items.len(),
            "Fetched social posts"
        );
        Ok(items)
    }
}
