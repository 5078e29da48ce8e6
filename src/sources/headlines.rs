//! Headline scraping for section-front pages
//!
//! The markup heuristics sit behind [`HeadlineExtractor`] so a site-specific
//! strategy can replace the class-pattern default.

use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

use super::{NewsSource, SourceMetadata, SourceTier};
use crate::error::Result;
use crate::http_client::SourceHttpClient;
use crate::retry::RetryPolicy;
use crate::schemas::{NewsItem, Topic};
use crate::text::normalize_whitespace;

static SEL_CONTAINERS: Lazy<Selector> = Lazy::new(|| Selector::parse("article, div").expect("valid container selector"));
static SEL_HEADINGS: Lazy<Selector> = Lazy::new(|| Selector::parse("h1, h2, h3, a").expect("valid heading selector"));
static SEL_LINKS: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("valid link selector"));
static SEL_BLURBS: Lazy<Selector> = Lazy::new(|| Selector::parse("p, div").expect("valid blurb selector"));

pub trait HeadlineExtractor: Send + Sync {
    /// Up to `limit` headline items found in `html`, links resolved against `base_url`.
    fn extract_headlines(&self, html: &str, base_url: &str, limit: usize) -> Vec<NewsItem>;
}

/// Finds story containers and their headline by CSS class name patterns
pub struct ClassPatternExtractor {
    container_class: Regex,
    title_class: Regex,
    summary_class: Regex,
    min_title_chars: usize,
}

impl Default for ClassPatternExtractor {
    fn default() -> Self {
        Self {
            container_class: Regex::new(r"(?i)story|news-item|article|headline").expect("valid container pattern"),
            title_class: Regex::new(r"(?i)headline|title").expect("valid title pattern"),
            summary_class: Regex::new(r"(?i)summary|content|description").expect("valid summary pattern"),
            min_title_chars: 10,
        }
    }
}

impl ClassPatternExtractor {
    fn has_class(el: &ElementRef<'_>, pattern: &Regex) -> bool {
        el.value().attr("class").is_some_and(|c| pattern.is_match(c))
    }

    fn text_of(el: &ElementRef<'_>) -> String {
        normalize_whitespace(&el.text().collect::<Vec<_>>().join(" "))
    }

    fn link_of(title_el: &ElementRef<'_>, container: &ElementRef<'_>) -> Option<String> {
        if title_el.value().name() == "a" {
            if let Some(href) = title_el.value().attr("href") {
                return Some(href.to_string());
            }
        }
        title_el
            .select(&SEL_LINKS)
            .next()
            .or_else(|| container.select(&SEL_LINKS).next())
            .and_then(|a| a.value().attr("href"))
            .map(str::to_string)
    }
}

impl HeadlineExtractor for ClassPatternExtractor {
    fn extract_headlines(&self, html: &str, base_url: &str, limit: usize) -> Vec<NewsItem> {
        let document = Html::parse_document(html);
        let base = Url::parse(base_url).ok();
        let source = base
            .as_ref()
            .and_then(|u| u.host_str())
            .unwrap_or(base_url)
            .to_string();

        // One stamp per page so a stable recency sort keeps page order
        let fetched_at = Utc::now();
        let mut seen_titles: HashSet<String> = HashSet::new();
        let mut items: Vec<NewsItem> = Vec::new();

        for container in document.select(&SEL_CONTAINERS) {
            if items.len() >= limit {
                break;
            }
            if !Self::has_class(&container, &self.container_class) {
                continue;
            }

            let headings: Vec<ElementRef<'_>> = container.select(&SEL_HEADINGS).collect();
            let Some(title_el) = headings
                .iter()
                .find(|el| Self::has_class(el, &self.title_class))
                .or_else(|| headings.first())
                .copied()
            else {
                continue;
            };

            let title = Self::text_of(&title_el);
            if title.chars().count() <= self.min_title_chars || seen_titles.contains(&title) {
                continue;
            }

            let url = Self::link_of(&title_el, &container)
                .and_then(|href| match &base {
                    Some(b) => b.join(&href).ok().map(|u| u.to_string()),
                    None => Some(href),
                })
                .unwrap_or_default();

            let summary = container
                .select(&SEL_BLURBS)
                .find(|el| Self::has_class(el, &self.summary_class))
                .map(|el| Self::text_of(&el))
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| title.clone());

            if let Some(item) = NewsItem::new(&title, &summary, source.clone(), url, Some(fetched_at), Topic::CurrentAffairs) {
                seen_titles.insert(title);
                items.push(item);
            }
        }

        items
    }
}

/// Page tier: one unit is one section-front URL
pub struct HeadlineSource {
    client: Arc<SourceHttpClient>,
    retry: RetryPolicy,
    extractor: Arc<dyn HeadlineExtractor>,
    metadata: SourceMetadata,
}

impl HeadlineSource {
    pub fn new(client: Arc<SourceHttpClient>, retry: RetryPolicy, extractor: Arc<dyn HeadlineExtractor>) -> Self {
        Self {
            client,
            retry,
            extractor,
            metadata: SourceMetadata {
                id: "headlines".to_string(),
                name: "Section-front headlines".to_string(),
                tier: SourceTier::Page,
            },
        }
    }
}

#[async_trait]
impl NewsSource for HeadlineSource {
    fn metadata(&self) -> &SourceMetadata {
        &self.metadata
    }

    async fn fetch_unit(&self, page_url: &str, topic: Topic, limit: usize) -> Result<Vec<NewsItem>> {
        let client = &self.client;
        let html = self
            .retry
            .run(page_url, move |_| async move { client.get_text(page_url).await })
            .await?;
        debug!(page = %page_url, bytes = html.len(), "Fetched page");

        let items: Vec<NewsItem> = self
            .extractor
            .extract_headlines(&html, page_url, limit)
            .into_iter()
            .map(|mut item| {
                item.topic = topic;
                item
            })
            .collect();

        info!(page = %page_url, headlines = items.len(), "Extracted headlines");
        Ok(items)
    }
}
