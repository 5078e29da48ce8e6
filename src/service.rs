//! News Service
//!
//! Glue between the digest core and the bot's collaborators: read a user's
//! preferences, fetch, synthesize, deliver the text, then try speech. Each
//! build runs in its own span with a correlation id.

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::collaborators::{
    DeliveryChannel, NoSpeech, PreferenceStore, SpeechSynthesizer, SpeechTranscriber, UserId, UserPreferences,
};
use crate::config::Config;
use crate::error::Result;
use crate::fetcher::NewsFetcher;
use crate::localization::{localize, Phrase};
use crate::metrics::{self, BuildTimer};
use crate::schemas::{DigestRequest, Frequency, Language, NewsItem, Topic, UpdateKind, BLOCK_SEPARATOR};
use crate::sources::FetchOptions;
use crate::synthesizer::DigestSynthesizer;

/// Items fetched to answer one question
const QUERY_ITEM_LIMIT: usize = 10;

/// Phrases that mark a typed message as a news question
const NEWS_QUERY_MARKERS: &[&str] = &["news", "kya hua", "what happened", "update", "bhai", "खबर", "समाचार"];

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceOptions {
    pub auto_fetch: bool,
    pub max_length: Option<usize>,
    pub max_audio: Duration,
    /// Pause between users in a cohort delivery
    pub delivery_delay: Duration,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            auto_fetch: true,
            max_length: None,
            max_audio: Duration::from_secs(60),
            delivery_delay: Duration::from_secs(1),
        }
    }
}

impl From<&Config> for ServiceOptions {
    fn from(config: &Config) -> Self {
        Self {
            auto_fetch: config.auto_fetch_enabled,
            max_length: config.digest_max_chars,
            max_audio: Duration::from_secs(config.max_audio_secs),
            delivery_delay: Duration::from_millis(config.delivery_delay_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Sent,
    /// Scheduled update with nothing to say
    Skipped,
    Failed,
}

impl DeliveryStatus {
    fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Skipped => "skipped",
            DeliveryStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryReport {
    pub user_id: UserId,
    pub kind: UpdateKind,
    pub status: DeliveryStatus,
    pub items: usize,
    pub text: String,
    pub audio_sent: bool,
}

/// Outcome of one cadence burst
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BurstReport {
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Fetch then synthesis for one request. A query switches both to search
/// mode: relevance-ranked items and an intro echoing the question.
pub async fn run_request(
    fetcher: &NewsFetcher,
    synthesizer: &DigestSynthesizer,
    request: &DigestRequest,
    limit: usize,
    options: &FetchOptions,
) -> (Vec<NewsItem>, String) {
    match &request.query {
        Some(query) => {
            let items = fetcher.search(query, &request.topics, limit, options).await;
            let text = synthesizer
                .answer_query(&items, request.language, query, request.max_length)
                .await;
            (items, text)
        }
        None => {
            let items = fetcher.fetch(&request.topics, limit, options).await;
            let text = synthesizer.synthesize(&items, request.language, request.max_length).await;
            (items, text)
        }
    }
}

/// True when a typed message reads like a request for news
pub fn is_news_query(message: &str) -> bool {
    let lowered = message.to_lowercase();
    NEWS_QUERY_MARKERS.iter().any(|marker| lowered.contains(marker))
}

pub struct NewsService {
    fetcher: Arc<NewsFetcher>,
    synthesizer: Arc<DigestSynthesizer>,
    preferences: Arc<dyn PreferenceStore>,
    channel: Arc<dyn DeliveryChannel>,
    speech: Arc<dyn SpeechSynthesizer>,
    transcriber: Arc<dyn SpeechTranscriber>,
    options: ServiceOptions,
}

impl NewsService {
    pub fn new(
        fetcher: Arc<NewsFetcher>,
        synthesizer: Arc<DigestSynthesizer>,
        preferences: Arc<dyn PreferenceStore>,
        channel: Arc<dyn DeliveryChannel>,
    ) -> Self {
        Self {
            fetcher,
            synthesizer,
            preferences,
            channel,
            speech: Arc::new(NoSpeech),
            transcriber: Arc::new(NoSpeech),
            options: ServiceOptions::default(),
        }
    }

    pub fn with_speech(mut self, speech: Arc<dyn SpeechSynthesizer>) -> Self {
        self.speech = speech;
        self
    }

    pub fn with_transcriber(mut self, transcriber: Arc<dyn SpeechTranscriber>) -> Self {
        self.transcriber = transcriber;
        self
    }

    pub fn options(mut self, options: ServiceOptions) -> Self {
        self.options = options;
        self
    }

    fn fetch_options(&self) -> FetchOptions {
        FetchOptions::new().auto_fetch(self.options.auto_fetch)
    }

    /// Builds and sends one digest for `user_id`.
    ///
    /// Scheduled kinds skip users when nothing was found. On-demand requests
    /// always get an answer, even if it is the no-news message.
    pub async fn deliver_digest(&self, user_id: UserId, kind: UpdateKind) -> Result<DeliveryReport> {
        let correlation_id = Uuid::new_v4();
        let span = info_span!("digest_build", %correlation_id, user_id = user_id, kind = kind.as_str());

        async move {
            let prefs = self.preferences.get_preferences(user_id).await?;
            let language = prefs.language;

            if prefs.topics.is_empty() && !kind.is_scheduled() {
                let text = localize(Phrase::NoTopicsSelected, language).to_string();
                self.channel.send_text(user_id, &text).await?;
                return Ok(self.finish(user_id, kind, 0, text, false));
            }

            let topics = topics_or_general(&prefs);
            let _timer = BuildTimer::new(kind.as_str());

            let items = self
                .fetcher
                .fetch(&topics, kind.item_limit(), &self.fetch_options())
                .await;

            if items.is_empty() && kind.is_scheduled() {
                info!("Nothing fetched, skipping scheduled update");
                metrics::record_delivery(kind.as_str(), DeliveryStatus::Skipped.as_str());
                return Ok(DeliveryReport {
                    user_id,
                    kind,
                    status: DeliveryStatus::Skipped,
                    items: 0,
                    text: String::new(),
                    audio_sent: false,
                });
            }

            // The char budget covers the greeting too; it is dropped when it alone would not fit
            let greeting = localize(Phrase::greeting(kind), language);
            let frame = greeting.chars().count() + BLOCK_SEPARATOR.chars().count();
            let (greeting, budget) = match self.options.max_length {
                Some(max) if max <= frame => (None, Some(max)),
                Some(max) => (Some(greeting), Some(max - frame)),
                None => (Some(greeting), None),
            };

            let digest = self.synthesizer.synthesize(&items, language, budget).await;
            let text = match greeting {
                Some(greeting) => format!("{}{}{}", greeting, BLOCK_SEPARATOR, digest),
                None => digest.clone(),
            };

            let audio_sent = self.send_text_and_audio(user_id, &text, &digest, language).await?;
            Ok(self.finish(user_id, kind, items.len(), text, audio_sent))
        }
        .instrument(span)
        .await
    }

    /// Answers a free-text question with items ranked against it.
    pub async fn answer_query(&self, user_id: UserId, query: &str) -> Result<String> {
        let correlation_id = Uuid::new_v4();
        let span = info_span!("query_answer", %correlation_id, user_id = user_id);

        async move {
            let prefs = self.preferences.get_preferences(user_id).await?;
            let mut request = DigestRequest::new(topics_or_general(&prefs), prefs.language).query(query);
            request.max_length = self.options.max_length;
            let _timer = BuildTimer::new(UpdateKind::OnDemand.as_str());

            let (items, answer) = run_request(
                &self.fetcher,
                &self.synthesizer,
                &request,
                QUERY_ITEM_LIMIT,
                &self.fetch_options(),
            )
            .await;

            self.send_text_and_audio(user_id, &answer, &answer, prefs.language).await?;
            metrics::record_delivery(UpdateKind::OnDemand.as_str(), DeliveryStatus::Sent.as_str());
            info!(items = items.len(), chars = answer.chars().count(), "Answered query");
            Ok(answer)
        }
        .instrument(span)
        .await
    }

    /// Typed message entry point: news questions are answered, anything else
    /// gets a nudge.
    pub async fn handle_text(&self, user_id: UserId, message: &str) -> Result<String> {
        if is_news_query(message) {
            return self.answer_query(user_id, message).await;
        }

        let prefs = self.preferences.get_preferences(user_id).await?;
        let reply = localize(Phrase::NotNewsQuery, prefs.language);
        self.channel.send_text(user_id, reply).await?;
        Ok(reply.to_string())
    }

    /// Voice message entry point: transcribe, echo what was heard, answer.
    pub async fn handle_voice(&self, user_id: UserId, audio: &[u8]) -> Result<String> {
        let prefs = self.preferences.get_preferences(user_id).await?;

        let transcript = self
            .transcriber
            .transcribe(audio)
            .await
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        let Some(transcript) = transcript else {
            warn!(user_id = user_id, bytes = audio.len(), "Transcription produced nothing");
            let reply = localize(Phrase::TranscriptionFailed, prefs.language);
            self.channel.send_text(user_id, reply).await?;
            return Ok(reply.to_string());
        };

        self.channel
            .send_text(user_id, &format!("🎤 \"{}\"", transcript))
            .await?;
        self.answer_query(user_id, &transcript).await
    }

    /// Sends the scheduled update to every user on `frequency`.
    ///
    /// One user failing does not stop the burst.
    pub async fn deliver_to_frequency(&self, frequency: Frequency) -> Result<BurstReport> {
        let kind = UpdateKind::for_frequency(frequency);
        let users = self.preferences.get_users_by_frequency(frequency).await?;
        info!(frequency = ?frequency, kind = kind.as_str(), users = users.len(), "Starting delivery burst");

        let mut report = BurstReport::default();
        for (i, user_id) in users.iter().enumerate() {
            if i > 0 && !self.options.delivery_delay.is_zero() {
                tokio::time::sleep(self.options.delivery_delay).await;
            }

            match self.deliver_digest(*user_id, kind).await {
                Ok(delivery) => match delivery.status {
                    DeliveryStatus::Sent => report.sent += 1,
                    DeliveryStatus::Skipped => report.skipped += 1,
                    DeliveryStatus::Failed => report.failed += 1,
                },
                Err(e) => {
                    error!(user_id = *user_id, error = %e, "Delivery failed");
                    metrics::record_delivery(kind.as_str(), DeliveryStatus::Failed.as_str());
                    report.failed += 1;
                }
            }
        }

        info!(sent = report.sent, skipped = report.skipped, failed = report.failed, "Delivery burst finished");
        Ok(report)
    }

    /// Text first; speech is best effort and never fails the delivery.
    async fn send_text_and_audio(
        &self,
        user_id: UserId,
        text: &str,
        spoken: &str,
        language: Language,
    ) -> Result<bool> {
        self.channel.send_text(user_id, text).await?;

        let Some(audio) = self.speech.synthesize(spoken, language, self.options.max_audio).await else {
            return Ok(false);
        };
        match self.channel.send_audio(user_id, &audio).await {
            Ok(()) => Ok(true),
            Err(e) => {
                warn!(user_id = user_id, error = %e, "Audio delivery failed, text already sent");
                Ok(false)
            }
        }
    }

    fn finish(&self, user_id: UserId, kind: UpdateKind, items: usize, text: String, audio_sent: bool) -> DeliveryReport {
        metrics::record_delivery(kind.as_str(), DeliveryStatus::Sent.as_str());
        info!(items = items, chars = text.chars().count(), audio = audio_sent, "Digest delivered");
        DeliveryReport {
            user_id,
            kind,
            status: DeliveryStatus::Sent,
            items,
            text,
            audio_sent,
        }
    }
}

fn topics_or_general(prefs: &UserPreferences) -> Vec<Topic> {
    if prefs.topics.is_empty() {
        vec![Topic::General]
    } else {
        prefs.topics.clone()
    }
}
