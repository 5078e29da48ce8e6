//! Digest request and output shapes

use serde::{Deserialize, Serialize};

use super::common::Language;
use super::news_item::Topic;

/// Blank line between digest blocks
pub const BLOCK_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DigestRequest {
    pub topics: Vec<Topic>,
    pub language: Language,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

impl DigestRequest {
    pub fn new(topics: impl IntoIterator<Item = Topic>, language: Language) -> Self {
        let mut deduped: Vec<Topic> = Vec::new();
        for topic in topics {
            if !deduped.contains(&topic) {
                deduped.push(topic);
            }
        }
        if deduped.is_empty() {
            deduped.push(Topic::General);
        }

        Self {
            topics: deduped,
            language,
            max_length: None,
            query: None,
        }
    }

    pub fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        let query = query.into();
        self.query = if query.trim().is_empty() { None } else { Some(query) };
        self
    }
}

fn default_separator() -> String {
    BLOCK_SEPARATOR.to_string()
}

/// Assembled digest: intro, one block per topic group, outro.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Digest {
    pub intro: String,
    pub blocks: Vec<String>,
    pub outro: String,
    /// Only narrower than a blank line when a tight length budget forced it
    #[serde(default = "default_separator")]
    pub separator: String,
}

impl Digest {
    pub fn new(intro: impl Into<String>, blocks: Vec<String>, outro: impl Into<String>) -> Self {
        Self {
            intro: intro.into(),
            blocks,
            outro: outro.into(),
            separator: default_separator(),
        }
    }

    pub fn with_separator(mut self, separator: &str) -> Self {
        self.separator = separator.to_string();
        self
    }

    pub fn text(&self) -> String {
        self.text_with_separator(&self.separator)
    }

    pub(crate) fn text_with_separator(&self, separator: &str) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(self.blocks.len() + 2);
        if !self.intro.is_empty() {
            parts.push(&self.intro);
        }
        parts.extend(self.blocks.iter().map(String::as_str));
        parts.push(&self.outro);
        parts.join(separator)
    }

    /// Length in chars of the rendered text
    pub fn char_len(&self) -> usize {
        self.text().chars().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_dedups_topics_and_defaults_to_general() {
        let req = DigestRequest::new([Topic::Sports, Topic::Sports, Topic::Health], Language::Hindi);
        assert_eq!(req.topics, vec![Topic::Sports, Topic::Health]);

        let empty = DigestRequest::new([], Language::English);
        assert_eq!(empty.topics, vec![Topic::General]);
    }

    #[test]
    fn test_blank_query_is_dropped() {
        let req = DigestRequest::new([Topic::General], Language::English).query("   ");
        assert!(req.query.is_none());
    }

    #[test]
    fn test_digest_text_joins_with_blank_lines() {
        let digest = Digest::new("Hi", vec!["A".to_string(), "B".to_string()], "Bye");
        assert_eq!(digest.text(), "Hi\n\nA\n\nB\n\nBye");
        assert_eq!(digest.char_len(), 13);

        let tight = digest.with_separator("\n");
        assert_eq!(tight.text(), "Hi\nA\nB\nBye");
    }
}
