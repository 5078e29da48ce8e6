//! Relevance Ranker
//!
//! Heuristic news gate, query keyword extraction and keyword-overlap scoring.

use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;

use crate::schemas::NewsItem;

static RE_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w+\b").expect("valid word regex"));

const NEWS_INDICATORS: &[&str] = &[
    "breaking", "update", "report", "announces", "says", "according to",
    "sources", "confirmed", "latest", "news", "today", "yesterday",
];

const PROMO_PHRASES: &[&str] = &["buy now", "subscribe", "follow us", "download app"];

const STOP_WORDS: &[&str] = &[
    "what", "how", "when", "where", "why", "who", "is", "are", "was", "were", "the", "a", "an",
    "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "about",
    "kya", "hai", "hua", "bhai", "news", "update", "today",
];

const MAX_KEYWORDS: usize = 5;
const MIN_NEWS_WORDS: usize = 8;

/// Social posts must look like reporting, be substantial and not be promos.
pub fn is_news_like(text: &str) -> bool {
    let lower = text.to_lowercase();
    let has_indicator = NEWS_INDICATORS.iter().any(|i| lower.contains(i));
    let substantial = lower.split_whitespace().count() > MIN_NEWS_WORDS;
    let promotional = PROMO_PHRASES.iter().any(|p| lower.contains(p));

    has_indicator && substantial && !promotional
}

/// Up to five query keywords in order, without stop-words or duplicates.
pub fn extract_keywords(query: &str) -> Vec<String> {
    let lower = query.to_lowercase();
    let mut keywords: Vec<String> = Vec::new();

    for m in RE_WORD.find_iter(&lower) {
        let word = m.as_str();
        if word.chars().count() <= 2 || STOP_WORDS.contains(&word) {
            continue;
        }
        if keywords.iter().any(|k| k == word) {
            continue;
        }
        keywords.push(word.to_string());
        if keywords.len() == MAX_KEYWORDS {
            break;
        }
    }

    keywords
}

/// Mean per-keyword score: 1 for a substring hit, 1.5 when it is also a
/// whole word. Zero keywords score 0.
pub fn relevance_score(text: &str, keywords: &[String]) -> f64 {
    if keywords.is_empty() {
        return 0.0;
    }

    let lower = text.to_lowercase();
    let words: Vec<&str> = RE_WORD.find_iter(&lower).map(|m| m.as_str()).collect();

    let total: f64 = keywords
        .iter()
        .map(|keyword| {
            if !lower.contains(keyword.as_str()) {
                0.0
            } else if words.contains(&keyword.as_str()) {
                1.5
            } else {
                1.0
            }
        })
        .sum();

    total / keywords.len() as f64
}

/// Scores every item against the keywords, drops zero scores, and orders by
/// score then recency.
pub fn rank_by_relevance(items: Vec<NewsItem>, keywords: &[String]) -> Vec<NewsItem> {
    let mut scored: Vec<NewsItem> = items
        .into_iter()
        .map(|item| {
            let score = item
                .relevance_score
                .unwrap_or_else(|| relevance_score(&format!("{} {}", item.title, item.content), keywords));
            item.with_relevance(score)
        })
        .filter(|item| item.relevance_score.unwrap_or(0.0) > 0.0)
        .collect();

    scored.sort_by(|a, b| {
        let sa = a.relevance_score.unwrap_or(0.0);
        let sb = b.relevance_score.unwrap_or(0.0);
        sb.partial_cmp(&sa)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.published_at.cmp(&a.published_at))
    });
    scored
}

/// Newest first, then cut. Used per source, per topic and overall.
pub fn sort_by_recency_and_truncate(mut items: Vec<NewsItem>, limit: usize) -> Vec<NewsItem> {
    items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    items.truncate(limit);
    items
}
