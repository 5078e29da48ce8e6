//! Common Schema Primitives
//!
//! Shared enums used across the pipeline: language, delivery cadence and the
//! kind of update being assembled.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// User-facing language / register of a digest
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Hindi,
    English,
    Hinglish,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::Hindi, Language::English, Language::Hinglish];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Hindi => "hindi",
            Language::English => "english",
            Language::Hinglish => "hinglish",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_lowercase().as_str() {
            "hindi" | "hi" => Some(Language::Hindi),
            "english" | "en" => Some(Language::English),
            "hinglish" => Some(Language::Hinglish),
            _ => None,
        }
    }

    /// Unknown keys fall back to English, the default preference for new users
    pub fn from_key_or_default(key: &str) -> Self {
        Self::from_key(key).unwrap_or_else(|| {
            warn!(language = %key, "Unknown language key, using english");
            Language::English
        })
    }

    /// ISO code handed to speech engines. Hinglish is spoken as English.
    pub fn speech_code(&self) -> &'static str {
        match self {
            Language::Hindi => "hi",
            Language::English | Language::Hinglish => "en",
        }
    }
}

impl Default for Language {
    fn default() -> Self {
        Language::English
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How often a user wants scheduled digests
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    TwiceDaily,
    Weekly,
}

impl Frequency {
    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_lowercase().as_str() {
            "daily" => Some(Frequency::Daily),
            "twice_daily" | "twice-daily" => Some(Frequency::TwiceDaily),
            "weekly" => Some(Frequency::Weekly),
            _ => None,
        }
    }
}

impl Default for Frequency {
    fn default() -> Self {
        Frequency::Daily
    }
}

/// Which delivery an update belongs to. Drives the greeting and item budget.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    Morning,
    Evening,
    Weekly,
    OnDemand,
}

impl UpdateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateKind::Morning => "morning",
            UpdateKind::Evening => "evening",
            UpdateKind::Weekly => "weekly",
            UpdateKind::OnDemand => "on_demand",
        }
    }

    /// Scheduled update sent to a cadence cohort
    pub fn for_frequency(frequency: Frequency) -> Self {
        match frequency {
            Frequency::Daily => UpdateKind::Morning,
            Frequency::TwiceDaily => UpdateKind::Evening,
            Frequency::Weekly => UpdateKind::Weekly,
        }
    }

    pub fn is_scheduled(&self) -> bool {
        !matches!(self, UpdateKind::OnDemand)
    }

    pub fn item_limit(&self) -> usize {
        match self {
            UpdateKind::Morning | UpdateKind::Evening => 8,
            UpdateKind::Weekly => 15,
            UpdateKind::OnDemand => 10,
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_lowercase().as_str() {
            "morning" | "daily" => Some(UpdateKind::Morning),
            "evening" => Some(UpdateKind::Evening),
            "weekly" => Some(UpdateKind::Weekly),
            "on_demand" | "now" => Some(UpdateKind::OnDemand),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_parsing() {
        assert_eq!(Language::from_key("Hindi"), Some(Language::Hindi));
        assert_eq!(Language::from_key(" hinglish "), Some(Language::Hinglish));
        assert_eq!(Language::from_key("klingon"), None);
        assert_eq!(Language::from_key_or_default("klingon"), Language::English);
    }

    #[test]
    fn test_language_serialization() {
        let json = serde_json::to_string(&Language::Hinglish).unwrap();
        assert_eq!(json, "\"hinglish\"");
    }

    #[test]
    fn test_frequency_serialization() {
        let parsed: Frequency = serde_json::from_str("\"twice_daily\"").unwrap();
        assert_eq!(parsed, Frequency::TwiceDaily);
    }

    #[test]
    fn test_update_kind_limits() {
        assert_eq!(UpdateKind::Morning.item_limit(), 8);
        assert_eq!(UpdateKind::Weekly.item_limit(), 15);
        assert_eq!(UpdateKind::for_frequency(Frequency::TwiceDaily), UpdateKind::Evening);
        assert!(!UpdateKind::OnDemand.is_scheduled());
    }
}
