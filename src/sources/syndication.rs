//! RSS / Atom tier
//!
//! One unit is one feed URL. Entries are taken in document order up to
//! `items_per_feed`, cleaned of markup, and attributed to the outlet's
//! display name.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use super::{display_name_for, NewsSource, SourceMetadata, SourceTier};
use crate::error::Result;
use crate::http_client::SourceHttpClient;
use crate::ranker::sort_by_recency_and_truncate;
use crate::retry::RetryPolicy;
use crate::schemas::{NewsItem, Topic};
use crate::text::{strip_html, truncate_chars};

pub struct SyndicationSource {
    client: Arc<SourceHttpClient>,
    retry: RetryPolicy,
    items_per_feed: usize,
    content_max_chars: usize,
    metadata: SourceMetadata,
}

impl SyndicationSource {
    pub fn new(client: Arc<SourceHttpClient>, retry: RetryPolicy, items_per_feed: usize, content_max_chars: usize) -> Self {
        Self {
            client,
            retry,
            items_per_feed,
            content_max_chars,
            metadata: SourceMetadata {
                id: "syndication".to_string(),
                name: "RSS/Atom feeds".to_string(),
                tier: SourceTier::Feed,
            },
        }
    }
}

/// Parses an RSS or Atom document into items.
pub fn parse_feed(body: &str, feed_url: &str, topic: Topic, max_items: usize, content_max_chars: usize) -> Result<Vec<NewsItem>> {
    let feed = feed_rs::parser::parse(body.as_bytes())?;
    let source = display_name_for(feed_url);

    let items = feed
        .entries
        .into_iter()
        .take(max_items)
        .filter_map(|entry| {
            let title = entry.title.map(|t| strip_html(&t.content)).unwrap_or_default();
            let raw_content = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body))
                .unwrap_or_default();
            let content = truncate_chars(&strip_html(&raw_content), content_max_chars);
            let url = entry.links.first().map(|l| l.href.clone()).unwrap_or_default();
            let published_at = entry.published.or(entry.updated);

            NewsItem::new(&title, &content, source.clone(), url, published_at, topic)
        })
        .collect();

    Ok(items)
}

#[async_trait]
impl NewsSource for SyndicationSource {
    fn metadata(&self) -> &SourceMetadata {
        &self.metadata
    }

    async fn fetch_unit(&self, feed_url: &str, topic: Topic, limit: usize) -> Result<Vec<NewsItem>> {
        let client = &self.client;
        let body = self
            .retry
            .run(feed_url, move |_| async move { client.get_text(feed_url).await })
            .await?;

        let items = parse_feed(&body, feed_url, topic, self.items_per_feed, self.content_max_chars)?;
        debug!(feed = %feed_url, entries = items.len(), "Parsed feed");

        let items = sort_by_recency_and_truncate(items, limit);
        info!(feed = %feed_url, topic = %topic, items = items.len(), "Fetched feed");
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>TOI</title>
<item><title>Sensex ends 500 points higher</title>
<description><![CDATA[<p>Markets <b>rallied</b> on Friday&nbsp;as banks gained.</p>]]></description>
<link>https://timesofindia.indiatimes.com/business/1</link>
<pubDate>Fri, 12 Jan 2024 10:00:00 GMT</pubDate></item>
<item><title>Rupee steadies</title><link>https://timesofindia.indiatimes.com/business/2</link></item>
<item><title></title><description></description></item>
</channel></rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom"><title>Verge</title><id>urn:verge</id>
<updated>2024-01-12T10:00:00Z</updated>
<entry><title>New phone launched</title><id>urn:1</id>
<updated>2024-01-12T09:00:00Z</updated>
<link href="https://www.theverge.com/1"/>
<summary>A new phone with a bigger battery was launched today in Delhi.</summary></entry>
</feed>"#;

    #[test]
    fn test_parse_rss() {
        let items = parse_feed(RSS, "https://timesofindia.indiatimes.com/rssfeeds/1.cms", Topic::Finance, 5, 300).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Sensex ends 500 points higher");
        assert_eq!(items[0].content, "Markets rallied on Friday as banks gained.");
        assert_eq!(items[0].source, "Times of India");
        assert_eq!(items[0].published_at.to_rfc3339(), "2024-01-12T10:00:00+00:00");
        // missing description falls back to the title
        assert_eq!(items[1].content, "Rupee steadies");
    }

    #[test]
    fn test_parse_atom() {
        let items = parse_feed(ATOM, "https://www.theverge.com/rss/index.xml", Topic::Technology, 5, 300).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].source, "The Verge");
        assert_eq!(items[0].url, "https://www.theverge.com/1");
        assert_eq!(items[0].topic, Topic::Technology);
    }

    #[test]
    fn test_caps_and_truncation() {
        let items = parse_feed(RSS, "https://example.com/rss", Topic::Finance, 1, 10).unwrap();
        assert_eq!(items.len(), 1);
        assert!(items[0].content.chars().count() <= 10);
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(parse_feed("not xml at all", "https://example.com/rss", Topic::General, 5, 300).is_err());
    }
}
