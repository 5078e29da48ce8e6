//! Interfaces to the bot's surrounding systems
//!
//! Preferences, speech and delivery are owned elsewhere; the digest core only
//! talks to them through these traits. The implementations here cover local
//! runs and tests.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::schemas::{Frequency, Language, Topic};

pub type UserId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreferences {
    pub language: Language,
    pub topics: Vec<Topic>,
    pub frequency: Frequency,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            language: Language::English,
            topics: Vec::new(),
            frequency: Frequency::Daily,
        }
    }
}

/// Synthesized speech ready to hand to a delivery channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioHandle {
    pub path: PathBuf,
    pub duration: Duration,
    pub language: Language,
}

#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Stored preferences, or the defaults for an unknown user
    async fn get_preferences(&self, user_id: UserId) -> Result<UserPreferences>;

    async fn get_users_by_frequency(&self, frequency: Frequency) -> Result<Vec<UserId>>;
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// `None` means no audio this time; text delivery goes ahead regardless.
    async fn synthesize(&self, text: &str, language: Language, max_duration: Duration) -> Option<AudioHandle>;
}

#[async_trait]
pub trait SpeechTranscriber: Send + Sync {
    async fn transcribe(&self, audio: &[u8]) -> Option<String>;
}

#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn send_text(&self, user_id: UserId, text: &str) -> Result<()>;

    async fn send_audio(&self, user_id: UserId, audio: &AudioHandle) -> Result<()>;
}

#[derive(Default)]
pub struct InMemoryPreferenceStore {
    users: RwLock<HashMap<UserId, UserPreferences>>,
}

impl InMemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, user_id: UserId, preferences: UserPreferences) -> Self {
        self.set_preferences(user_id, preferences);
        self
    }

    pub fn set_preferences(&self, user_id: UserId, preferences: UserPreferences) {
        self.users.write().insert(user_id, preferences);
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }
}

#[async_trait]
impl PreferenceStore for InMemoryPreferenceStore {
    async fn get_preferences(&self, user_id: UserId) -> Result<UserPreferences> {
        Ok(self.users.read().get(&user_id).cloned().unwrap_or_default())
    }

    async fn get_users_by_frequency(&self, frequency: Frequency) -> Result<Vec<UserId>> {
        let mut users: Vec<UserId> = self
            .users
            .read()
            .iter()
            .filter(|(_, prefs)| prefs.frequency == frequency)
            .map(|(id, _)| *id)
            .collect();
        users.sort_unstable();
        Ok(users)
    }
}

/// On-disk record; keys are kept loose so one bad entry does not sink the file
#[derive(Debug, Deserialize)]
struct StoredPreferences {
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    topics: Vec<String>,
    #[serde(default)]
    frequency: Option<String>,
}

impl From<StoredPreferences> for UserPreferences {
    fn from(stored: StoredPreferences) -> Self {
        let mut topics: Vec<Topic> = Vec::new();
        for key in &stored.topics {
            let topic = Topic::from_key_or_general(key);
            if !topics.contains(&topic) {
                topics.push(topic);
            }
        }

        Self {
            language: stored
                .language
                .as_deref()
                .map(Language::from_key_or_default)
                .unwrap_or_default(),
            topics,
            frequency: stored
                .frequency
                .as_deref()
                .and_then(Frequency::from_key)
                .unwrap_or(Frequency::Daily),
        }
    }
}

/// Read-only snapshot of a JSON file mapping user ids to preferences:
///
/// ```json
/// { "42": { "language": "hindi", "topics": ["sports"], "frequency": "weekly" } }
/// ```
pub struct JsonFilePreferenceStore {
    path: PathBuf,
    inner: InMemoryPreferenceStore,
}

impl JsonFilePreferenceStore {
    /// Loads the file. A missing file is an empty store.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let inner = InMemoryPreferenceStore::new();

        match tokio::fs::read_to_string(&path).await {
            Ok(body) => {
                let raw: HashMap<String, StoredPreferences> = serde_json::from_str(&body)?;
                for (key, stored) in raw {
                    match key.trim().parse::<UserId>() {
                        Ok(user_id) => inner.set_preferences(user_id, stored.into()),
                        Err(_) => warn!(path = %path.display(), key = %key, "Skipping non-numeric user id"),
                    }
                }
                info!(path = %path.display(), users = inner.len(), "Loaded preferences");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Preferences file not found, starting empty");
            }
            Err(e) => return Err(e.into()),
        }

        Ok(Self { path, inner })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PreferenceStore for JsonFilePreferenceStore {
    async fn get_preferences(&self, user_id: UserId) -> Result<UserPreferences> {
        self.inner.get_preferences(user_id).await
    }

    async fn get_users_by_frequency(&self, frequency: Frequency) -> Result<Vec<UserId>> {
        self.inner.get_users_by_frequency(frequency).await
    }
}

/// No speech engine configured
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSpeech;

#[async_trait]
impl SpeechSynthesizer for NoSpeech {
    async fn synthesize(&self, _text: &str, language: Language, _max_duration: Duration) -> Option<AudioHandle> {
        debug!(language = %language, "Speech synthesis not configured");
        None
    }
}

#[async_trait]
impl SpeechTranscriber for NoSpeech {
    async fn transcribe(&self, _audio: &[u8]) -> Option<String> {
        None
    }
}

/// Returns the same transcript for any audio
#[derive(Debug, Clone)]
pub struct FixedTranscriber(pub Option<String>);

impl FixedTranscriber {
    pub fn hearing(text: impl Into<String>) -> Self {
        Self(Some(text.into()))
    }

    pub fn silent() -> Self {
        Self(None)
    }
}

#[async_trait]
impl SpeechTranscriber for FixedTranscriber {
    async fn transcribe(&self, _audio: &[u8]) -> Option<String> {
        self.0.clone()
    }
}

/// Prints deliveries; used by the CLI
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutChannel;

#[async_trait]
impl DeliveryChannel for StdoutChannel {
    async fn send_text(&self, user_id: UserId, text: &str) -> Result<()> {
        println!("--- to {} ---\n{}\n", user_id, text);
        Ok(())
    }

    async fn send_audio(&self, user_id: UserId, audio: &AudioHandle) -> Result<()> {
        println!("--- audio to {} --- {} ({}s)", user_id, audio.path.display(), audio.duration.as_secs());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Text { user_id: UserId, text: String },
    Audio { user_id: UserId, audio: AudioHandle },
}

/// Keeps every delivery in order for later inspection
#[derive(Debug, Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<Delivery>>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.sent.lock().clone()
    }

    pub fn texts_for(&self, user_id: UserId) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter_map(|d| match d {
                Delivery::Text { user_id: to, text } if *to == user_id => Some(text.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl DeliveryChannel for RecordingChannel {
    async fn send_text(&self, user_id: UserId, text: &str) -> Result<()> {
        self.sent.lock().push(Delivery::Text {
            user_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_audio(&self, user_id: UserId, audio: &AudioHandle) -> Result<()> {
        self.sent.lock().push(Delivery::Audio {
            user_id,
            audio: audio.clone(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_unknown_user_gets_defaults() {
        let store = InMemoryPreferenceStore::new();
        let prefs = store.get_preferences(7).await.unwrap();
        assert_eq!(prefs, UserPreferences::default());
        assert!(prefs.topics.is_empty());
    }

    #[tokio::test]
    async fn test_users_by_frequency() {
        let weekly = UserPreferences {
            frequency: Frequency::Weekly,
            ..Default::default()
        };
        let store = InMemoryPreferenceStore::new()
            .with_user(3, weekly.clone())
            .with_user(1, weekly)
            .with_user(2, UserPreferences::default());

        assert_eq!(store.get_users_by_frequency(Frequency::Weekly).await.unwrap(), vec![1, 3]);
        assert_eq!(store.get_users_by_frequency(Frequency::Daily).await.unwrap(), vec![2]);
        assert!(store.get_users_by_frequency(Frequency::TwiceDaily).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_json_store_loads_and_normalizes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "42": {{"language": "hindi", "topics": ["sports", "cricket", "sports"], "frequency": "twice_daily"}},
                "43": {{"topics": []}},
                "not-a-user": {{"language": "english"}}
            }}"#
        )
        .unwrap();

        let store = JsonFilePreferenceStore::load(file.path()).await.unwrap();
        let prefs = store.get_preferences(42).await.unwrap();
        assert_eq!(prefs.language, Language::Hindi);
        assert_eq!(prefs.topics, vec![Topic::Sports, Topic::General]);
        assert_eq!(prefs.frequency, Frequency::TwiceDaily);

        assert_eq!(store.get_preferences(43).await.unwrap(), UserPreferences::default());
        assert_eq!(store.get_users_by_frequency(Frequency::Daily).await.unwrap(), vec![43]);
    }

    #[tokio::test]
    async fn test_missing_json_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFilePreferenceStore::load(dir.path().join("absent.json")).await.unwrap();
        assert!(store.get_users_by_frequency(Frequency::Daily).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recording_channel_keeps_order() {
        let channel = RecordingChannel::new();
        channel.send_text(1, "first").await.unwrap();
        channel.send_text(2, "other").await.unwrap();
        channel.send_text(1, "second").await.unwrap();

        assert_eq!(channel.texts_for(1), vec!["first".to_string(), "second".to_string()]);
        assert_eq!(channel.deliveries().len(), 3);
    }
}
