//! Digest Synthesizer
//!
//! Turns ranked items into one speakable digest: items are grouped by topic,
//! each group is reduced to a one-line summary behind its topic label, and
//! the blocks are framed by a localized intro and outro. Synthesis never
//! fails; every error degrades to a deterministic fallback.

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::circuit_breaker::BreakerRegistry;
use crate::config::Config;
use crate::error::{DigestError, Result};
use crate::http_client::{HttpClientConfig, ResilientHttpClient, SourceHttpClient};
use crate::localization::{localize, phrases, query_echo, topic_label, Phrase, PhraseSet};
use crate::metrics;
use crate::retry::RetryPolicy;
use crate::schemas::{Digest, Language, NewsItem, Topic, BLOCK_SEPARATOR};
use crate::text::{clean_social_text, normalize_whitespace, take_chars, truncate_chars};

/// Items per topic group fed to the summarizer
const ITEMS_PER_GROUP: usize = 5;
/// Items at or below this length add nothing worth summarizing
const MIN_ITEM_CHARS: usize = 50;
/// Hard cap on summarizer input
const MAX_GROUP_TEXT_CHARS: usize = 1000;
/// Shorter group text goes straight to the title fallback
const MIN_SUMMARIZABLE_CHARS: usize = 100;
const FALLBACK_CONTENT_CHARS: usize = 100;
/// Titles listed by the whole-digest fallback
const FALLBACK_TITLES: usize = 3;
/// A truncated block shorter than this is dropped instead
const MIN_BLOCK_CHARS: usize = 16;

/// Separators tried in order when a budget is tight
const SEPARATORS: [&str; 3] = [BLOCK_SEPARATOR, "\n", ""];

/// Target length of a summary, in words
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryBounds {
    pub min_words: usize,
    pub max_words: usize,
}

impl Default for SummaryBounds {
    fn default() -> Self {
        Self {
            min_words: 20,
            max_words: 80,
        }
    }
}

/// Text reduction capability
#[async_trait]
pub trait Summarizer: Send + Sync {
    fn name(&self) -> &str;

    async fn summarize(&self, text: &str, bounds: SummaryBounds) -> Result<String>;
}

/// In-process lead-sentence summarizer.
///
/// Takes whole sentences from the start until `min_words` is reached, never
/// going past `max_words`.
#[derive(Debug, Default, Clone)]
pub struct ExtractiveSummarizer;

impl ExtractiveSummarizer {
    fn sentences(text: &str) -> Vec<&str> {
        text.split_inclusive(['.', '!', '?', '।'])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[async_trait]
impl Summarizer for ExtractiveSummarizer {
    fn name(&self) -> &str {
        "extractive"
    }

    async fn summarize(&self, text: &str, bounds: SummaryBounds) -> Result<String> {
        let mut picked: Vec<&str> = Vec::new();
        let mut words = 0usize;

        for sentence in Self::sentences(text) {
            let sentence_words = sentence.split_whitespace().count();
            if words + sentence_words > bounds.max_words {
                if picked.is_empty() {
                    // A single run-on sentence: cut it at the word limit
                    let cut: Vec<&str> = sentence.split_whitespace().take(bounds.max_words).collect();
                    return Ok(cut.join(" "));
                }
                break;
            }
            picked.push(sentence);
            words += sentence_words;
            if words >= bounds.min_words {
                break;
            }
        }

        if picked.is_empty() {
            return Err(DigestError::SummarizationFailed("no sentences in input".to_string()));
        }
        Ok(picked.join(" "))
    }
}

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    parameters: InferenceParameters,
}

#[derive(Debug, Serialize)]
struct InferenceParameters {
    min_length: usize,
    max_length: usize,
}

#[derive(Debug, Deserialize)]
struct InferenceSummary {
    summary_text: String,
}

/// Hosted abstractive model behind an inference-style JSON endpoint
pub struct HttpSummarizer {
    client: Arc<SourceHttpClient>,
    endpoint: String,
    token: Option<String>,
    timeout: Duration,
}

impl HttpSummarizer {
    pub fn new(client: Arc<SourceHttpClient>, endpoint: impl Into<String>, token: Option<String>, timeout: Duration) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            token,
            timeout,
        }
    }
}

#[async_trait]
impl Summarizer for HttpSummarizer {
    fn name(&self) -> &str {
        "http"
    }

    async fn summarize(&self, text: &str, bounds: SummaryBounds) -> Result<String> {
        let request = InferenceRequest {
            inputs: text,
            parameters: InferenceParameters {
                min_length: bounds.min_words,
                max_length: bounds.max_words,
            },
        };
        let client = &self.client;
        let endpoint = self.endpoint.as_str();
        let token = self.token.as_deref();
        let request = &request;

        let response: Vec<InferenceSummary> = RetryPolicy::once(self.timeout)
            .run(endpoint, move |_| async move { client.post_json(endpoint, request, token).await })
            .await?;

        response
            .into_iter()
            .next()
            .map(|s| s.summary_text)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| DigestError::SummarizationFailed("empty summary from model".to_string()))
    }
}

pub struct DigestSynthesizer {
    summarizer: Option<Arc<dyn Summarizer>>,
    bounds: SummaryBounds,
    rng: Mutex<StdRng>,
}

impl Default for DigestSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

impl DigestSynthesizer {
    /// Title-only synthesizer with an entropy-seeded phrase picker
    pub fn new() -> Self {
        Self {
            summarizer: None,
            bounds: SummaryBounds::default(),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Reproducible phrase choice
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            ..Self::new()
        }
    }

    /// Hosted summarizer when an endpoint is configured, extractive otherwise
    pub fn from_config(config: &Config) -> Result<Self> {
        let summarizer: Arc<dyn Summarizer> = match &config.summarizer_url {
            Some(url) => {
                let http = Arc::new(ResilientHttpClient::new(HttpClientConfig::from(config))?);
                let breakers = Arc::new(BreakerRegistry::new(
                    config.circuit_breaker_failure_threshold,
                    Duration::from_secs(config.circuit_breaker_open_duration_secs),
                ));
                let client = Arc::new(SourceHttpClient::new(http, "summarizer", config.feed_rate_limit_rpm, breakers));
                Arc::new(HttpSummarizer::new(
                    client,
                    url.clone(),
                    config.summarizer_token.clone(),
                    Duration::from_secs(config.summarizer_timeout_secs),
                ))
            }
            None => Arc::new(ExtractiveSummarizer),
        };
        debug!(summarizer = summarizer.name(), "Summarizer selected");
        Ok(Self::new().with_summarizer(summarizer))
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    pub fn bounds(mut self, bounds: SummaryBounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn has_summarizer(&self) -> bool {
        self.summarizer.is_some()
    }

    /// Scheduled digest text. Empty input yields the no-news message.
    pub async fn synthesize(&self, items: &[NewsItem], language: Language, max_length: Option<usize>) -> String {
        match self.build(items, language, None, max_length).await {
            Some(digest) => digest.text(),
            None => no_news(language, max_length),
        }
    }

    /// Direct answer to a user question; the intro echoes the query.
    pub async fn answer_query(&self, items: &[NewsItem], language: Language, query: &str, max_length: Option<usize>) -> String {
        match self.build(items, language, Some(query_echo(query, language)), max_length).await {
            Some(digest) => digest.text(),
            None => no_news(language, max_length),
        }
    }

    /// Structured digest, `None` when there is nothing to say.
    #[instrument(skip(self, items, intro), fields(items = items.len()))]
    pub async fn build(
        &self,
        items: &[NewsItem],
        language: Language,
        intro: Option<String>,
        max_length: Option<usize>,
    ) -> Option<Digest> {
        if items.is_empty() {
            return None;
        }

        // Phrases are picked before any await so the RNG lock is never held across one
        let intro = intro.unwrap_or_else(|| self.pick(PhraseSet::Intro, language).to_string());
        let outro = self.pick(PhraseSet::Outro, language).to_string();
        let connector = self.pick(PhraseSet::Connector, language);

        let mut blocks: Vec<String> = Vec::new();
        for (topic, group) in group_by_topic(items) {
            let summary = self.summarize_group(topic, &group).await;
            if summary.is_empty() {
                continue;
            }
            let (emoji, name) = topic_label(topic, language);
            blocks.push(format!("{} **{}**: {}", emoji, name, summary));
        }

        if blocks.is_empty() {
            warn!("Every group summary came out empty, listing top titles");
            metrics::record_summarizer_fallback("whole_digest");
            blocks = vec![fallback_titles(items, connector)];
        }

        debug!(blocks = blocks.len(), "Assembled digest blocks");
        let digest = match max_length {
            Some(max_chars) => fit_to_budget(&intro, blocks, &outro, max_chars),
            None => Digest::new(intro, blocks, outro),
        };
        Some(digest)
    }

    fn pick(&self, set: PhraseSet, language: Language) -> &'static str {
        let pool = phrases(set, language);
        let mut rng = self.rng.lock();
        pool.choose(&mut *rng).copied().unwrap_or_default()
    }

    async fn summarize_group(&self, topic: Topic, group: &[&NewsItem]) -> String {
        let text = prepare_group_text(group);

        match &self.summarizer {
            Some(summarizer) if text.chars().count() > MIN_SUMMARIZABLE_CHARS => {
                match summarizer.summarize(&text, self.bounds).await {
                    Ok(summary) => {
                        let summary = normalize_whitespace(&summary);
                        if !summary.is_empty() {
                            return summary;
                        }
                        metrics::record_summarizer_fallback("empty");
                    }
                    Err(e) => {
                        warn!(topic = %topic, summarizer = summarizer.name(), error = %e, "Summarization failed, using lead title");
                        metrics::record_summarizer_fallback("error");
                    }
                }
            }
            Some(_) => metrics::record_summarizer_fallback("short_input"),
            None => metrics::record_summarizer_fallback("unavailable"),
        }

        group.first().map(|lead| lead_summary(lead)).unwrap_or_default()
    }
}

/// Groups in order of each topic's first appearance
fn group_by_topic(items: &[NewsItem]) -> Vec<(Topic, Vec<&NewsItem>)> {
    let mut groups: Vec<(Topic, Vec<&NewsItem>)> = Vec::new();
    for item in items {
        match groups.iter_mut().find(|(topic, _)| *topic == item.topic) {
            Some((_, members)) => members.push(item),
            None => groups.push((item.topic, vec![item])),
        }
    }
    groups
}

/// Summarizer input for one group: cleaned, joined, capped.
pub fn prepare_group_text(group: &[&NewsItem]) -> String {
    let joined = group
        .iter()
        .take(ITEMS_PER_GROUP)
        .map(|item| clean_social_text(&item.content))
        .filter(|text| text.chars().count() > MIN_ITEM_CHARS)
        .collect::<Vec<_>>()
        .join(" ");

    if joined.chars().count() > MAX_GROUP_TEXT_CHARS {
        format!("{}...", take_chars(&joined, MAX_GROUP_TEXT_CHARS))
    } else {
        joined
    }
}

/// Deterministic summary: the lead title, else the start of its content
fn lead_summary(item: &NewsItem) -> String {
    let title = clean_social_text(&item.title);
    if !title.is_empty() {
        return title;
    }
    take_chars(&clean_social_text(&item.content), FALLBACK_CONTENT_CHARS)
}

fn fallback_titles(items: &[NewsItem], connector: &str) -> String {
    items
        .iter()
        .take(FALLBACK_TITLES)
        .map(|item| {
            if item.title.trim().is_empty() {
                item.content.split('.').next().unwrap_or_default().trim().to_string()
            } else {
                item.title.trim().to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(&format!("{}{} ", BLOCK_SEPARATOR, connector))
}

fn no_news(language: Language, max_length: Option<usize>) -> String {
    let message = localize(Phrase::NoNews, language);
    match max_length {
        Some(max_chars) => truncate_chars(message, max_chars),
        None => message.to_string(),
    }
}

/// Lays out intro, blocks and outro within `max_chars` chars.
///
/// Blocks are kept whole while they fit, the first one that does not is
/// truncated (or dropped when too little room is left) and the rest are
/// dropped. Intro and outro stay intact whenever the budget covers them.
/// Below that, the outro wins over the intro.
pub fn fit_to_budget(intro: &str, blocks: Vec<String>, outro: &str, max_chars: usize) -> Digest {
    let intro_len = intro.chars().count();
    let outro_len = outro.chars().count();
    let mut bare_frame: Option<Digest> = None;

    for separator in SEPARATORS {
        let sep_len = separator.chars().count();
        let frame = intro_len + sep_len + outro_len;
        if frame > max_chars {
            continue;
        }

        let mut remaining = max_chars - frame;
        let mut kept: Vec<String> = Vec::new();
        for block in &blocks {
            let needed = block.chars().count() + sep_len;
            if needed <= remaining {
                kept.push(block.clone());
                remaining -= needed;
                continue;
            }
            if remaining >= sep_len + MIN_BLOCK_CHARS {
                kept.push(truncate_chars(block, remaining - sep_len));
            }
            break;
        }

        let digest = Digest::new(intro, kept, outro).with_separator(separator);
        if !digest.blocks.is_empty() || blocks.is_empty() {
            return digest;
        }
        // Nothing fit; a narrower separator may make room for a block
        bare_frame.get_or_insert(digest);
    }

    if let Some(digest) = bare_frame {
        return digest;
    }

    if outro_len <= max_chars {
        Digest::new(truncate_chars(intro, max_chars - outro_len), Vec::new(), outro).with_separator("")
    } else {
        Digest::new("", Vec::new(), truncate_chars(outro, max_chars)).with_separator("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};

    fn item(title: &str, content: &str, topic: Topic, minutes_ago: i64) -> NewsItem {
        NewsItem::new(
            title,
            content,
            "Test",
            "",
            Some(Utc::now() - ChronoDuration::minutes(minutes_ago)),
            topic,
        )
        .unwrap()
    }

    fn sample_items() -> Vec<NewsItem> {
        vec![
            item(
                "India beat Australia in the third ODI",
                "India beat Australia by six wickets in the third ODI at Rajkot on Sunday, sealing the series 2-1 with a strong chase.",
                Topic::Sports,
                5,
            ),
            item(
                "New smartphone launched in Delhi",
                "A new smartphone with a larger battery and faster charging was launched in Delhi on Monday at a starting price of Rs 15,000.",
                Topic::Technology,
                10,
            ),
            item(
                "Kohli scores century",
                "Virat Kohli scored his 50th ODI century during the match, becoming the first batter to reach the milestone in the format.",
                Topic::Sports,
                15,
            ),
        ]
    }

    struct FailingSummarizer;

    #[async_trait]
    impl Summarizer for FailingSummarizer {
        fn name(&self) -> &str {
            "failing"
        }

        async fn summarize(&self, _text: &str, _bounds: SummaryBounds) -> Result<String> {
            Err(DigestError::SummarizationFailed("model offline".to_string()))
        }
    }

    struct FixedSummarizer(&'static str);

    #[async_trait]
    impl Summarizer for FixedSummarizer {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn summarize(&self, _text: &str, _bounds: SummaryBounds) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn test_empty_input_gives_exact_no_news_message() {
        let synth = DigestSynthesizer::with_seed(1);
        for language in Language::ALL {
            assert_eq!(synth.synthesize(&[], language, None).await, localize(Phrase::NoNews, language));
        }
        assert_eq!(
            synth.synthesize(&[], Language::Hindi, None).await,
            "अरे भाई, अभी कोई खास खबर नहीं मिली। थोड़ी देर बाद ट्राई करना! 😅"
        );
    }

    #[tokio::test]
    async fn test_groups_follow_first_appearance_with_title_fallback() {
        let synth = DigestSynthesizer::with_seed(7);
        let digest = synth.build(&sample_items(), Language::English, None, None).await.unwrap();

        assert_eq!(digest.blocks.len(), 2);
        assert_eq!(digest.blocks[0], "⚽ **Sports**: India beat Australia in the third ODI");
        assert_eq!(digest.blocks[1], "💻 **Technology**: New smartphone launched in Delhi");
        assert!(phrases(PhraseSet::Intro, Language::English).contains(&digest.intro.as_str()));
        assert!(phrases(PhraseSet::Outro, Language::English).contains(&digest.outro.as_str()));
    }

    #[tokio::test]
    async fn test_hindi_labels() {
        let synth = DigestSynthesizer::with_seed(7);
        let digest = synth.build(&sample_items(), Language::Hindi, None, None).await.unwrap();
        assert!(digest.blocks[0].starts_with("⚽ **खेल**: "));
    }

    #[tokio::test]
    async fn test_summarizer_output_is_used_and_failure_falls_back() {
        let items = sample_items();

        let good = DigestSynthesizer::with_seed(3).with_summarizer(Arc::new(FixedSummarizer("  Team India   won the series.  ")));
        let digest = good.build(&items, Language::English, None, None).await.unwrap();
        assert_eq!(digest.blocks[0], "⚽ **Sports**: Team India won the series.");

        let bad = DigestSynthesizer::with_seed(3).with_summarizer(Arc::new(FailingSummarizer));
        let digest = bad.build(&items, Language::English, None, None).await.unwrap();
        assert_eq!(digest.blocks[0], "⚽ **Sports**: India beat Australia in the third ODI");
    }

    #[tokio::test]
    async fn test_short_group_text_skips_summarizer() {
        let items = vec![item("Short news", "Short news", Topic::Health, 1)];
        let synth = DigestSynthesizer::with_seed(3).with_summarizer(Arc::new(FixedSummarizer("should not appear")));
        let digest = synth.build(&items, Language::English, None, None).await.unwrap();
        assert_eq!(digest.blocks[0], "🏥 **Health**: Short news");
    }

    #[tokio::test]
    async fn test_same_seed_same_text() {
        let items = sample_items();
        let a = DigestSynthesizer::with_seed(42).synthesize(&items, Language::Hinglish, None).await;
        let b = DigestSynthesizer::with_seed(42).synthesize(&items, Language::Hinglish, None).await;
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_query_answer_echoes_query() {
        let synth = DigestSynthesizer::with_seed(5);
        let text = synth
            .answer_query(&sample_items(), Language::English, "  cricket  ", None)
            .await;
        assert!(text.starts_with("You asked about 'cricket', so here's what I found -"));
    }

    #[tokio::test]
    async fn test_budget_is_respected_for_every_length() {
        let synth = DigestSynthesizer::with_seed(11);
        let items = sample_items();
        let full = synth.build(&items, Language::English, None, None).await.unwrap();
        let frame = full.intro.chars().count() + full.outro.chars().count();

        for max in frame..full.char_len() + 5 {
            let synth = DigestSynthesizer::with_seed(11);
            let digest = synth.build(&items, Language::English, None, Some(max)).await.unwrap();
            assert!(digest.char_len() <= max, "budget {} produced {}", max, digest.char_len());
            assert_eq!(digest.intro, full.intro);
            assert_eq!(digest.outro, full.outro);
        }
    }

    #[test]
    fn test_fit_truncates_then_drops_blocks() {
        let blocks = vec!["A".repeat(30), "B".repeat(30)];
        let digest = fit_to_budget("Hi", blocks, "Bye", 2 + 2 + 30 + 2 + 20 + 3);

        assert_eq!(digest.separator, BLOCK_SEPARATOR);
        assert_eq!(digest.blocks[0], "A".repeat(30));
        assert_eq!(digest.blocks.len(), 2);
        assert!(digest.blocks[1].ends_with('…'));
        assert_eq!(digest.char_len(), 59);
    }

    #[test]
    fn test_fit_shrinks_separator_when_frame_is_tight() {
        let digest = fit_to_budget("Hi", vec!["Block".to_string()], "Bye", 6);
        assert_eq!(digest.text(), "Hi\nBye");

        let digest = fit_to_budget("Hi", vec!["Block".to_string()], "Bye", 5);
        assert_eq!(digest.text(), "HiBye");

        let digest = fit_to_budget("Hi", vec!["Block".to_string()], "Bye", 4);
        assert_eq!(digest.outro, "Bye");
        assert!(digest.char_len() <= 4);

        let digest = fit_to_budget("Hi", vec![], "Bye", 2);
        assert!(digest.char_len() <= 2);
    }

    #[tokio::test]
    async fn test_noise_only_items_use_title_list() {
        let items = vec![
            item("#breaking @ndtv", "https://t.co/abc", Topic::General, 1),
            item("#live", "https://t.co/def #live", Topic::Politics, 2),
        ];
        let synth = DigestSynthesizer::with_seed(9);
        let digest = synth.build(&items, Language::English, None, None).await.unwrap();

        assert_eq!(digest.blocks.len(), 1);
        assert!(digest.blocks[0].starts_with("#breaking @ndtv\n\n"));
        assert!(digest.blocks[0].ends_with(" #live"));
    }

    #[test]
    fn test_prepare_group_text_filters_and_caps() {
        let long = "word ".repeat(400);
        let items = vec![
            item("t", "tiny", Topic::General, 1),
            item("t", &format!("{} https://t.co/x @someone", long), Topic::General, 2),
        ];
        let refs: Vec<&NewsItem> = items.iter().collect();
        let text = prepare_group_text(&refs);

        assert!(!text.contains("tiny"));
        assert!(!text.contains("https://"));
        assert_eq!(text.chars().count(), MAX_GROUP_TEXT_CHARS + 3);
    }

    #[tokio::test]
    async fn test_extractive_summarizer_takes_lead_sentences() {
        let text = "The monsoon reached Kerala on Friday, two days ahead of schedule. \
                    IMD expects normal rainfall this year across most regions of the country. \
                    Farmers welcomed the news.";
        let bounds = SummaryBounds { min_words: 10, max_words: 40 };
        let summary = ExtractiveSummarizer.summarize(text, bounds).await.unwrap();
        assert_eq!(summary, "The monsoon reached Kerala on Friday, two days ahead of schedule.");

        let run_on = "word ".repeat(100);
        let cut = ExtractiveSummarizer.summarize(&run_on, bounds).await.unwrap();
        assert_eq!(cut.split_whitespace().count(), 40);

        assert!(ExtractiveSummarizer.summarize("   ", bounds).await.is_err());
    }
}
