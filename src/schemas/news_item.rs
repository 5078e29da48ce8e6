//! NewsItem Schema
//!
//! One fetched unit of content, normalized from any source tier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

use crate::text::{derive_title, normalize_whitespace};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Politics,
    Technology,
    Sports,
    Finance,
    Entertainment,
    Health,
    International,
    Business,
    General,
    CurrentAffairs,
}

impl Topic {
    pub const ALL: [Topic; 10] = [
        Topic::Politics,
        Topic::Technology,
        Topic::Sports,
        Topic::Finance,
        Topic::Entertainment,
        Topic::Health,
        Topic::International,
        Topic::Business,
        Topic::General,
        Topic::CurrentAffairs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Politics => "politics",
            Topic::Technology => "technology",
            Topic::Sports => "sports",
            Topic::Finance => "finance",
            Topic::Entertainment => "entertainment",
            Topic::Health => "health",
            Topic::International => "international",
            Topic::Business => "business",
            Topic::General => "general",
            Topic::CurrentAffairs => "current_affairs",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        let key = key.trim().to_lowercase().replace(['-', ' '], "_");
        Topic::ALL.into_iter().find(|t| t.as_str() == key)
    }

    /// Unknown topic keys are a configuration defect, not a request failure
    pub fn from_key_or_general(key: &str) -> Self {
        Self::from_key(key).unwrap_or_else(|| {
            warn!(topic = %key, "Unknown topic key, falling back to general");
            Topic::General
        })
    }
}

impl Default for Topic {
    fn default() -> Self {
        Topic::General
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub title: String,
    pub content: String,
    pub source: String,
    #[serde(default)]
    pub url: String,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub topic: Topic,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,
}

impl NewsItem {
    /// Builds an item, or `None` when there is no usable text at all.
    ///
    /// Missing content falls back to the title, a missing title is derived
    /// from the content, and a missing timestamp becomes the fetch time.
    pub fn new(
        title: &str,
        content: &str,
        source: impl Into<String>,
        url: impl Into<String>,
        published_at: Option<DateTime<Utc>>,
        topic: Topic,
    ) -> Option<Self> {
        let title = normalize_whitespace(title);
        let mut content = normalize_whitespace(content);

        if content.is_empty() {
            if title.is_empty() {
                return None;
            }
            content = title.clone();
        }

        let title = if title.is_empty() { derive_title(&content) } else { title };

        Some(Self {
            title,
            content,
            source: source.into(),
            url: url.into(),
            published_at: published_at.unwrap_or_else(Utc::now),
            topic,
            relevance_score: None,
        })
    }

    pub fn with_relevance(mut self, score: f64) -> Self {
        self.relevance_score = Some(score);
        self
    }
}
