//! Per-request deduplication
//!
//! Two items are the same story when their normalized titles hash equal or
//! their canonical URLs match. There is no cross-request memory.

use sha2::{Digest, Sha256};
use std::collections::HashSet;
use url::Url;

use crate::schemas::NewsItem;

const TRACKING_PARAMS: &[&str] = &[
    "utm_source", "utm_medium", "utm_campaign", "utm_term", "utm_content",
    "fbclid", "gclid", "msclkid", "ref", "mc_cid", "mc_eid", "_ga", "_gl", "twclid",
];

/// Hex SHA-256 of a string
pub fn compute_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Lowercased title with punctuation dropped and whitespace collapsed
pub fn title_fingerprint(title: &str) -> String {
    let normalized: String = title
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_lowercase().next().unwrap_or(c) } else { ' ' })
        .collect();
    compute_hash(&normalized.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Normalizes a URL for comparison: no fragment, no tracking parameters,
/// sorted query, lowercase host.
pub fn canonicalize_url(url_str: &str) -> Result<String, url::ParseError> {
    let mut url = Url::parse(url_str)?;
    url.set_fragment(None);

    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !TRACKING_PARAMS.contains(&key.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    params.sort();

    if params.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(params);
    }

    let mut canonical = url.to_string();
    if canonical.ends_with('/') && url.path() != "/" {
        canonical.pop();
    }
    Ok(canonical)
}

/// Seen-set for a single digest build
#[derive(Debug, Default)]
pub struct SeenSet {
    titles: HashSet<String>,
    urls: HashSet<String>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the item as seen; returns false when it was already present.
    pub fn insert(&mut self, item: &NewsItem) -> bool {
        let title_key = title_fingerprint(&item.title);
        let url_key = if item.url.is_empty() {
            None
        } else {
            Some(canonicalize_url(&item.url).unwrap_or_else(|_| item.url.clone()))
        };

        let dup_title = self.titles.contains(&title_key);
        let dup_url = url_key.as_ref().is_some_and(|u| self.urls.contains(u));
        if dup_title || dup_url {
            return false;
        }

        self.titles.insert(title_key);
        if let Some(u) = url_key {
            self.urls.insert(u);
        }
        true
    }
}

/// Drops later duplicates, keeping the first occurrence and input order
pub fn dedup_items(items: Vec<NewsItem>) -> Vec<NewsItem> {
    let before = items.len();
    let mut seen = SeenSet::new();
    let kept: Vec<NewsItem> = items.into_iter().filter(|item| seen.insert(item)).collect();

    let dropped = before - kept.len();
    if dropped > 0 {
        crate::metrics::record_dedup_hits(dropped);
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::Topic;

    fn item(title: &str, url: &str) -> NewsItem {
        NewsItem::new(title, "", "NDTV", url, None, Topic::General).unwrap()
    }

    #[test]
    fn test_compute_hash() {
        assert_eq!(compute_hash("hello").len(), 64);
        assert_eq!(compute_hash("hello"), compute_hash("hello"));
        assert_ne!(compute_hash("hello"), compute_hash("world"));
    }

    #[test]
    fn test_canonicalize_url() {
        let a = canonicalize_url("https://WWW.NDTV.com/india/story?utm_source=x&b=2&a=1#top").unwrap();
        let b = canonicalize_url("https://www.ndtv.com/india/story?a=1&b=2").unwrap();
        assert_eq!(a, b);
        assert!(!a.contains("utm_source"));
        assert!(!a.contains('#'));
    }

    #[test]
    fn test_title_fingerprint_ignores_case_and_punctuation() {
        assert_eq!(
            title_fingerprint("Sensex rises 500 points!"),
            title_fingerprint("  sensex RISES 500 points ")
        );
    }

    #[test]
    fn test_dedup_items_keeps_first() {
        let items = vec![
            item("Monsoon reaches Kerala early", "https://a.example/1"),
            item("Monsoon reaches Kerala early!", "https://b.example/2"),
            item("Different story", "https://a.example/1?utm_medium=rss"),
            item("Another story entirely", ""),
        ];
        let kept = dedup_items(items);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].url, "https://a.example/1");
        assert_eq!(kept[1].title, "Another story entirely");
    }
}
