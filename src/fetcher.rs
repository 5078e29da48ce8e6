//! Source Fetcher
//!
//! Resolves each topic to its tiers and walks them in order: social handles
//! first, syndication feeds when that falls short, section-front pages for
//! `current_affairs`. Every unit fails alone; the fetcher itself never
//! returns an error for partial failure.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::circuit_breaker::BreakerRegistry;
use crate::config::Config;
use crate::dedup::dedup_items;
use crate::error::Result;
use crate::http_client::{HttpClientConfig, ResilientHttpClient, SourceHttpClient};
use crate::metrics;
use crate::ranker::{extract_keywords, rank_by_relevance, sort_by_recency_and_truncate};
use crate::schemas::{NewsItem, Topic};
use crate::sources::{
    ClassPatternExtractor, FetchOptions, HeadlineSource, HttpSocialFeedAdapter, NewsSource, SocialFeedSource,
    SyndicationSource,
};
use crate::topics::TopicSourceConfig;

/// Handles consulted per topic in search mode
const SEARCH_HANDLES: usize = 2;

pub struct NewsFetcher {
    topics: Arc<TopicSourceConfig>,
    social: Option<Arc<SocialFeedSource>>,
    feeds: Arc<dyn NewsSource>,
    pages: Arc<dyn NewsSource>,
    fanout: usize,
}

impl NewsFetcher {
    pub fn new(topics: Arc<TopicSourceConfig>, feeds: Arc<dyn NewsSource>, pages: Arc<dyn NewsSource>) -> Self {
        Self {
            topics,
            social: None,
            feeds,
            pages,
            fanout: 3,
        }
    }

    pub fn with_social(mut self, social: Arc<SocialFeedSource>) -> Self {
        self.social = Some(social);
        self
    }

    pub fn fanout(mut self, fanout: usize) -> Self {
        self.fanout = fanout.max(1);
        self
    }

    /// Wires the HTTP stack and every tier from configuration.
    ///
    /// The social tier is only enabled when a bearer token is configured.
    pub fn from_config(config: &Config, topics: TopicSourceConfig) -> Result<Self> {
        let http = Arc::new(ResilientHttpClient::new(HttpClientConfig::from(config))?);
        let breakers = Arc::new(BreakerRegistry::new(
            config.circuit_breaker_failure_threshold,
            Duration::from_secs(config.circuit_breaker_open_duration_secs),
        ));
        let retry = config.retry_policy();

        let feed_client = Arc::new(SourceHttpClient::new(http.clone(), "feed", config.feed_rate_limit_rpm, breakers.clone()));
        let page_client = Arc::new(SourceHttpClient::new(http.clone(), "page", config.feed_rate_limit_rpm, breakers.clone()));

        let feeds = SyndicationSource::new(feed_client, retry.clone(), config.items_per_feed, config.feed_content_max_chars);
        let pages = HeadlineSource::new(page_client, retry.clone(), Arc::new(ClassPatternExtractor::default()));

        let mut fetcher = Self::new(Arc::new(topics), Arc::new(feeds), Arc::new(pages)).fanout(config.topic_fanout);

        match &config.social_bearer_token {
            Some(token) => {
                let social_client = Arc::new(SourceHttpClient::new(http, "social", config.social_rate_limit_rpm, breakers));
                let adapter = HttpSocialFeedAdapter::new(social_client, config.social_api_base_url.clone(), token.clone());
                fetcher = fetcher.with_social(Arc::new(SocialFeedSource::new(Arc::new(adapter), retry)));
                info!("Social tier enabled");
            }
            None => info!("No social API token configured, social tier disabled"),
        }

        Ok(fetcher)
    }

    pub fn topic_sources(&self) -> &TopicSourceConfig {
        &self.topics
    }

    pub fn has_social(&self) -> bool {
        self.social.is_some()
    }

    /// Latest items across `topics`, newest first, at most `limit`.
    #[instrument(skip(self, options), fields(topics = ?topics, limit = limit))]
    pub async fn fetch(&self, topics: &[Topic], limit: usize, options: &FetchOptions) -> Vec<NewsItem> {
        if !options.auto_fetch {
            debug!("Auto-fetch disabled, skipping network");
            return Vec::new();
        }
        let topics = unique_topics(topics);
        if topics.is_empty() || limit == 0 {
            return Vec::new();
        }

        let per_topic = per_topic_limit(limit, topics.len());
        let per_topic_results = futures::future::join_all(topics.iter().map(|t| self.fetch_topic(*t, per_topic))).await;

        let merged = dedup_items(per_topic_results.into_iter().flatten().collect());
        let items = sort_by_recency_and_truncate(merged, limit);
        info!(items = items.len(), "Fetch finished");
        items
    }

    async fn fetch_topic(&self, topic: Topic, limit: usize) -> Vec<NewsItem> {
        if topic == Topic::CurrentAffairs {
            return self.fetch_pages(topic, limit).await;
        }

        let sources = self.topics.sources_for(topic);
        let mut items: Vec<NewsItem> = Vec::new();

        if let Some(social) = &self.social {
            let handles: Vec<&str> = sources.handles.iter().take(self.fanout).map(String::as_str).collect();
            items = self.run_units(social.as_ref(), handles, topic, limit).await;

            if items.len() < limit {
                debug!(topic = %topic, social_items = items.len(), "Social tier short, falling back to feeds");
                metrics::record_tier_fallback(topic.as_str());
            }
        }

        if items.len() < limit {
            let feeds: Vec<&str> = sources.feeds.iter().map(String::as_str).collect();
            items.extend(self.run_units(self.feeds.as_ref(), feeds, topic, limit).await);
        }

        sort_by_recency_and_truncate(dedup_items(items), limit)
    }

    /// Fetches units with bounded concurrency, logging and dropping failures
    async fn run_units(&self, source: &dyn NewsSource, units: Vec<&str>, topic: Topic, limit: usize) -> Vec<NewsItem> {
        let tier = source.tier().as_str();

        let results: Vec<(&str, Result<Vec<NewsItem>>)> = stream::iter(units)
            .map(move |unit| async move { (unit, source.fetch_unit(unit, topic, limit).await) })
            .buffer_unordered(self.fanout)
            .collect()
            .await;

        let mut items = Vec::new();
        for (unit, result) in results {
            absorb_unit_result(tier, unit, result, &mut items);
        }
        items
    }

    /// Section-front pages in configured order, stopping once `limit`
    /// headlines are in hand. All headlines share one stamp so later
    /// recency sorts keep page order.
    async fn fetch_pages(&self, topic: Topic, limit: usize) -> Vec<NewsItem> {
        let tier = self.pages.tier().as_str();
        let fetched_at = Utc::now();
        let mut items: Vec<NewsItem> = Vec::new();

        for page in self.topics.current_affairs_pages() {
            let wanted = limit.saturating_sub(items.len());
            if wanted == 0 {
                break;
            }
            let result = self.pages.fetch_unit(page, topic, wanted).await;
            absorb_unit_result(tier, page, result, &mut items);
            items = dedup_items(items);
        }

        items.truncate(limit);
        for item in &mut items {
            item.published_at = fetched_at;
        }
        items
    }

    /// Items matching a free-text query, ordered by relevance then recency.
    #[instrument(skip(self, options), fields(topics = ?topics, limit = limit))]
    pub async fn search(&self, query: &str, topics: &[Topic], limit: usize, options: &FetchOptions) -> Vec<NewsItem> {
        if !options.auto_fetch {
            debug!("Auto-fetch disabled, skipping network");
            return Vec::new();
        }
        let keywords = extract_keywords(query);
        if keywords.is_empty() || limit == 0 {
            debug!(query = %query, "No usable keywords in query");
            return Vec::new();
        }
        let topics = unique_topics(topics);

        let per_topic = futures::future::join_all(topics.iter().map(|t| self.search_topic(*t, &keywords, limit))).await;

        let candidates = dedup_items(per_topic.into_iter().flatten().collect());
        let mut ranked = rank_by_relevance(candidates, &keywords);
        ranked.truncate(limit);
        info!(keywords = ?keywords, results = ranked.len(), "Search finished");
        ranked
    }

    async fn search_topic(&self, topic: Topic, keywords: &[String], limit: usize) -> Vec<NewsItem> {
        if topic == Topic::CurrentAffairs {
            return self.fetch_pages(topic, limit).await;
        }

        let sources = self.topics.sources_for(topic);
        let mut items: Vec<NewsItem> = Vec::new();

        if let Some(social) = &self.social {
            let handles: Vec<&str> = sources.handles.iter().take(SEARCH_HANDLES).map(String::as_str).collect();
            let results: Vec<Result<Vec<NewsItem>>> = stream::iter(handles)
                .map(move |handle| {
                    let social = social.clone();
                    async move { social.search_unit(handle, keywords, topic, limit).await }
                })
                .buffer_unordered(self.fanout)
                .collect()
                .await;

            for result in results {
                match result {
                    Ok(found) => items.extend(found),
                    Err(e) => warn!(topic = %topic, error = %e, "Social search failed"),
                }
            }
        }

        if items.len() < limit {
            let feeds: Vec<&str> = sources.feeds.iter().map(String::as_str).collect();
            items.extend(self.run_units(self.feeds.as_ref(), feeds, topic, limit).await);
        }
        items
    }
}

fn absorb_unit_result(tier: &str, unit: &str, result: Result<Vec<NewsItem>>, items: &mut Vec<NewsItem>) {
    match result {
        Ok(unit_items) if unit_items.is_empty() => {
            metrics::record_fetch_outcome(tier, metrics::OUTCOME_EMPTY);
        }
        Ok(unit_items) => {
            metrics::record_fetch_outcome(tier, metrics::OUTCOME_OK);
            metrics::record_items_fetched(tier, unit_items.len());
            items.extend(unit_items);
        }
        Err(e) if e.is_blocking() => {
            metrics::record_fetch_outcome(tier, metrics::OUTCOME_BLOCKED);
            warn!(tier = tier, unit = %unit, error = %e, "Source unit blocked");
        }
        Err(e) => {
            let outcome = if matches!(e, crate::error::DigestError::EmptyResult(_)) {
                metrics::OUTCOME_EMPTY
            } else {
                metrics::OUTCOME_FAILED
            };
            metrics::record_fetch_outcome(tier, outcome);
            warn!(tier = tier, unit = %unit, error = %e, "Source unit failed");
        }
    }
}

/// `ceil(limit / topics)`, never zero
pub fn per_topic_limit(limit: usize, topic_count: usize) -> usize {
    if topic_count == 0 {
        return limit.max(1);
    }
    limit.div_ceil(topic_count).max(1)
}

fn unique_topics(topics: &[Topic]) -> Vec<Topic> {
    let mut out: Vec<Topic> = Vec::with_capacity(topics.len());
    for topic in topics {
        if !out.contains(topic) {
            out.push(*topic);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DigestError;
    use crate::retry::RetryPolicy;
    use crate::sources::{MockSocialFeedAdapter, SocialPost, SourceMetadata, SourceTier};
    use crate::topics::TopicSources;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// Serves canned items per unit; unknown units fail as blocked
    struct StubSource {
        metadata: SourceMetadata,
        units: HashMap<String, Vec<NewsItem>>,
        calls: Mutex<Vec<String>>,
    }

    impl StubSource {
        fn new(tier: SourceTier) -> Self {
            Self {
                metadata: SourceMetadata {
                    id: "stub".into(),
                    name: "stub".into(),
                    tier,
                },
                units: HashMap::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn unit(mut self, unit: &str, items: Vec<NewsItem>) -> Self {
            self.units.insert(unit.to_string(), items);
            self
        }

        fn calls(&self) -> usize {
            self.calls.lock().len()
        }
    }

    #[async_trait]
    impl NewsSource for StubSource {
        fn metadata(&self) -> &SourceMetadata {
            &self.metadata
        }

        async fn fetch_unit(&self, unit: &str, topic: Topic, limit: usize) -> Result<Vec<NewsItem>> {
            self.calls.lock().push(unit.to_string());
            match self.units.get(unit) {
                Some(items) => Ok(items
                    .iter()
                    .cloned()
                    .map(|mut i| {
                        i.topic = topic;
                        i
                    })
                    .take(limit)
                    .collect()),
                None => Err(DigestError::Blocked(unit.to_string())),
            }
        }
    }

    fn item(title: &str, age_mins: i64) -> NewsItem {
        NewsItem::new(title, "", "Feed", "", Some(Utc::now() - ChronoDuration::minutes(age_mins)), Topic::General).unwrap()
    }

    fn items(prefix: &str, n: usize) -> Vec<NewsItem> {
        (0..n).map(|i| item(&format!("{} story number {}", prefix, i), (i as i64 + 1) * 10)).collect()
    }

    fn topic_config() -> Arc<TopicSourceConfig> {
        Arc::new(
            TopicSourceConfig::empty()
                .with_topic(Topic::Technology, TopicSources::new(["ETtech", "Inc42"], ["https://tech.example/rss"]))
                .with_topic(Topic::Sports, TopicSources::new(["cricbuzz"], ["https://sports.example/rss", "https://dead.example/rss"]))
                .with_current_affairs_pages(["https://news.example/india"]),
        )
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            initial_backoff: std::time::Duration::from_millis(1),
            max_backoff: std::time::Duration::from_millis(2),
            ..RetryPolicy::default()
        }
    }

    #[test]
    fn test_per_topic_limit() {
        assert_eq!(per_topic_limit(10, 3), 4);
        assert_eq!(per_topic_limit(1, 3), 1);
        assert_eq!(per_topic_limit(8, 1), 8);
        assert_eq!(per_topic_limit(0, 2), 1);
    }

    #[tokio::test]
    async fn test_auto_fetch_disabled_touches_nothing() {
        let feeds = Arc::new(StubSource::new(SourceTier::Feed).unit("https://tech.example/rss", items("tech", 3)));
        let fetcher = NewsFetcher::new(topic_config(), feeds.clone(), Arc::new(StubSource::new(SourceTier::Page)));

        let out = fetcher.fetch(&[Topic::Technology], 5, &FetchOptions::new().auto_fetch(false)).await;
        assert!(out.is_empty());
        assert_eq!(feeds.calls(), 0);
    }

    #[tokio::test]
    async fn test_feed_only_fetch_is_sorted_and_capped() {
        let feeds = Arc::new(StubSource::new(SourceTier::Feed).unit("https://tech.example/rss", items("tech", 8)));
        let fetcher = NewsFetcher::new(topic_config(), feeds, Arc::new(StubSource::new(SourceTier::Page)));

        let out = fetcher.fetch(&[Topic::Technology], 5, &FetchOptions::default()).await;
        assert_eq!(out.len(), 5);
        assert!(out.iter().all(|i| i.topic == Topic::Technology));
        assert!(out.windows(2).all(|w| w[0].published_at >= w[1].published_at));
    }

    #[tokio::test]
    async fn test_failed_units_are_isolated() {
        let feeds = Arc::new(StubSource::new(SourceTier::Feed).unit("https://sports.example/rss", items("sports", 2)));
        let fetcher = NewsFetcher::new(topic_config(), feeds.clone(), Arc::new(StubSource::new(SourceTier::Page)));

        let out = fetcher.fetch(&[Topic::Sports], 5, &FetchOptions::default()).await;
        assert_eq!(out.len(), 2);
        assert_eq!(feeds.calls(), 2);
    }

    #[tokio::test]
    async fn test_social_tier_short_falls_back_to_feeds() {
        let adapter = MockSocialFeedAdapter::new().with_posts(
            "ETtech",
            vec![SocialPost::new(
                "1",
                "ETtech",
                "BREAKING: Government announces a new semiconductor policy for startups today",
                Utc::now(),
            )],
        );
        let social = Arc::new(SocialFeedSource::new(Arc::new(adapter), fast_retry()));
        let feeds = Arc::new(StubSource::new(SourceTier::Feed).unit("https://tech.example/rss", items("tech", 3)));
        let fetcher = NewsFetcher::new(topic_config(), feeds.clone(), Arc::new(StubSource::new(SourceTier::Page))).with_social(social);

        let out = fetcher.fetch(&[Topic::Technology], 4, &FetchOptions::default()).await;
        assert_eq!(out.len(), 4);
        assert_eq!(out[0].source, "@ETtech");
        assert_eq!(feeds.calls(), 1);
    }

    #[tokio::test]
    async fn test_current_affairs_uses_pages() {
        let pages = Arc::new(StubSource::new(SourceTier::Page).unit("https://news.example/india", items("india", 4)));
        let feeds = Arc::new(StubSource::new(SourceTier::Feed));
        let fetcher = NewsFetcher::new(topic_config(), feeds.clone(), pages);

        let out = fetcher.fetch(&[Topic::CurrentAffairs], 3, &FetchOptions::default()).await;
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|i| i.topic == Topic::CurrentAffairs));
        assert_eq!(feeds.calls(), 0);
    }

    #[tokio::test]
    async fn test_current_affairs_keeps_page_order_and_stops_early() {
        let topics = Arc::new(
            TopicSourceConfig::empty().with_current_affairs_pages(["https://news.example/india", "https://news.example/world"]),
        );
        let pages = Arc::new(
            StubSource::new(SourceTier::Page)
                .unit("https://news.example/india", vec![item("India lead story of the day", 90), item("India second story of the day", 80)])
                .unit("https://news.example/world", vec![item("World lead story of the day", 1), item("World second story of the day", 2)]),
        );
        let fetcher = NewsFetcher::new(topics.clone(), Arc::new(StubSource::new(SourceTier::Feed)), pages.clone());

        let out = fetcher.fetch(&[Topic::CurrentAffairs], 3, &FetchOptions::default()).await;
        let titles: Vec<&str> = out.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["India lead story of the day", "India second story of the day", "World lead story of the day"]
        );
        assert_eq!(pages.calls(), 2);

        let pages = Arc::new(
            StubSource::new(SourceTier::Page)
                .unit("https://news.example/india", vec![item("India lead story of the day", 90), item("India second story of the day", 80)]),
        );
        let fetcher = NewsFetcher::new(topics, Arc::new(StubSource::new(SourceTier::Feed)), pages.clone());
        let out = fetcher.fetch(&[Topic::CurrentAffairs], 2, &FetchOptions::default()).await;
        assert_eq!(out[0].title, "India lead story of the day");
        assert_eq!(pages.calls(), 1);
    }

    #[tokio::test]
    async fn test_all_sources_failing_yields_empty() {
        let fetcher = NewsFetcher::new(
            topic_config(),
            Arc::new(StubSource::new(SourceTier::Feed)),
            Arc::new(StubSource::new(SourceTier::Page)),
        );
        assert!(fetcher.fetch(&[Topic::Sports], 5, &FetchOptions::default()).await.is_empty());
    }

    #[tokio::test]
    async fn test_search_ranks_feed_items() {
        let feeds = Arc::new(StubSource::new(SourceTier::Feed).unit(
            "https://sports.example/rss",
            vec![item("Cricket final goes to super over", 30), item("Hockey team lands in Paris", 5)],
        ));
        let fetcher = NewsFetcher::new(topic_config(), feeds, Arc::new(StubSource::new(SourceTier::Page)));

        let out = fetcher
            .search("what happened in cricket today", &[Topic::Sports], 5, &FetchOptions::default())
            .await;
        assert_eq!(out.len(), 1);
        assert!(out[0].title.contains("Cricket"));
        assert!(out[0].relevance_score.unwrap_or(0.0) > 0.0);
    }
}
