//! Language Localization Table
//!
//! Every lookup is an exhaustive `match` over `(key, Language)`, so a missing
//! language is a compile error rather than a silent English fallback.
//! [`verify_complete`] additionally guards against empty entries and broken
//! templates and runs once at startup.

use crate::error::{DigestError, Result};
use crate::schemas::{Language, Topic, UpdateKind};

/// Placeholder substituted into [`Phrase::QueryEcho`]
pub const QUERY_PLACEHOLDER: &str = "{query}";

/// Single localized strings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phrase {
    NoNews,
    QueryEcho,
    GreetingMorning,
    GreetingEvening,
    GreetingWeekly,
    GreetingGeneral,
    TranscriptionFailed,
    NotNewsQuery,
    NoTopicsSelected,
}

impl Phrase {
    pub const ALL: [Phrase; 9] = [
        Phrase::NoNews,
        Phrase::QueryEcho,
        Phrase::GreetingMorning,
        Phrase::GreetingEvening,
        Phrase::GreetingWeekly,
        Phrase::GreetingGeneral,
        Phrase::TranscriptionFailed,
        Phrase::NotNewsQuery,
        Phrase::NoTopicsSelected,
    ];

    pub fn greeting(kind: UpdateKind) -> Self {
        match kind {
            UpdateKind::Morning => Phrase::GreetingMorning,
            UpdateKind::Evening => Phrase::GreetingEvening,
            UpdateKind::Weekly => Phrase::GreetingWeekly,
            UpdateKind::OnDemand => Phrase::GreetingGeneral,
        }
    }
}

/// Casual phrase pools a digest picks from at random
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhraseSet {
    Intro,
    Connector,
    Outro,
}

impl PhraseSet {
    pub const ALL: [PhraseSet; 3] = [PhraseSet::Intro, PhraseSet::Connector, PhraseSet::Outro];
}

pub fn localize(phrase: Phrase, language: Language) -> &'static str {
    use Language::*;
    match (phrase, language) {
        (Phrase::NoNews, Hindi) => "अरे भाई, अभी कोई खास खबर नहीं मिली। थोड़ी देर बाद ट्राई करना! 😅",
        (Phrase::NoNews, English) => "Hey bro, couldn't find any news right now. Try again later! 😅",
        (Phrase::NoNews, Hinglish) => "Arre bhai, abhi koi khaas news nahi mili. Thodi der baad try karna! 😅",

        (Phrase::QueryEcho, Hindi) => "तुमने पूछा था '{query}' के बारे में, तो सुनो -",
        (Phrase::QueryEcho, English) => "You asked about '{query}', so here's what I found -",
        (Phrase::QueryEcho, Hinglish) => "Tumne pucha tha '{query}' ke baare mein, toh sun -",

        (Phrase::GreetingMorning, Hindi) => "🌅 सुप्रभात! आज की ताज़ा खबरें:",
        (Phrase::GreetingMorning, English) => "🌅 Good morning! Here's your daily news update:",
        (Phrase::GreetingMorning, Hinglish) => "🌅 Good morning bhai! Aaj ki fresh news:",

        (Phrase::GreetingEvening, Hindi) => "🌆 शुभ संध्या! आज की शाम की खबरें:",
        (Phrase::GreetingEvening, English) => "🌆 Good evening! Here's your evening news update:",
        (Phrase::GreetingEvening, Hinglish) => "🌆 Good evening bhai! Shaam ki news:",

        (Phrase::GreetingWeekly, Hindi) => "📅 सप्ताहिक समाचार सारांश:",
        (Phrase::GreetingWeekly, English) => "📅 Your weekly news digest:",
        (Phrase::GreetingWeekly, Hinglish) => "📅 Weekly news digest, bhai:",

        (Phrase::GreetingGeneral, Hindi) => "📰 समाचार अपडेट:",
        (Phrase::GreetingGeneral, English) => "📰 News Update:",
        (Phrase::GreetingGeneral, Hinglish) => "📰 News update, bhai:",

        (Phrase::TranscriptionFailed, Hindi) => "😅 माफ़ करना भाई, आवाज़ समझ नहीं आई। फिर से भेजो या लिखकर पूछो।",
        (Phrase::TranscriptionFailed, English) => "😅 Sorry, I couldn't understand the audio. Please try again or send a text message.",
        (Phrase::TranscriptionFailed, Hinglish) => "😅 Sorry bhai, audio samajh nahi aaya. Phir se bhejo ya text karo.",

        (Phrase::NotNewsQuery, Hindi) => "🤔 मैं सिर्फ खबरों का उस्ताद हूँ! किसी ताज़ा घटना के बारे में पूछो।",
        (Phrase::NotNewsQuery, English) => "🤔 I'm specialized in news updates! Try asking about current events.",
        (Phrase::NotNewsQuery, Hinglish) => "🤔 Main sirf news ka expert hoon bhai! Kisi current event ke baare mein pucho.",

        (Phrase::NoTopicsSelected, Hindi) => "तुमने अभी तक अपनी पसंद के टॉपिक नहीं चुने। पहले सेटिंग्स पूरी करो!",
        (Phrase::NoTopicsSelected, English) => "You haven't set your news preferences yet. Set them up to get personalized news!",
        (Phrase::NoTopicsSelected, Hinglish) => "Bhai, tumne abhi tak topics select nahi kiye. Pehle preferences set karo!",
    }
}

pub fn phrases(set: PhraseSet, language: Language) -> &'static [&'static str] {
    use Language::*;
    match (set, language) {
        (PhraseSet::Intro, Hindi) => &[
            "अरे भाई, आज की खबर सुनो -",
            "भाई पता है आज क्या हुआ?",
            "सुनो भाई, ये हुआ है आज -",
            "अरे यार, आज की बड़ी खबर ये है -",
        ],
        (PhraseSet::Intro, English) => &[
            "Hey bro, here's what happened today -",
            "Bhai, you know what's going on?",
            "Listen up, here's the latest -",
            "Yo, big news today -",
        ],
        (PhraseSet::Intro, Hinglish) => &[
            "Arre bhai, aaj ki news sun -",
            "Bhai pata hai aaj kya hua?",
            "Sun yaar, aaj ka update -",
            "Arre, aaj ki badi news ye hai -",
        ],

        (PhraseSet::Connector, Hindi) => &["और फिर", "इसके बाद", "अब बात ये है", "और सुनो"],
        (PhraseSet::Connector, English) => &["And then", "Also", "Plus", "Oh and"],
        (PhraseSet::Connector, Hinglish) => &["Aur phir", "Aur sun", "Plus yaar", "Arre aur"],

        (PhraseSet::Outro, Hindi) => &[
            "बस यही था आज का अपडेट! 👍",
            "और कुछ चाहिए तो बताना भाई! 😊",
            "हो गया आज का न्यूज़! 📰",
        ],
        (PhraseSet::Outro, English) => &[
            "That's your update for today! 👍",
            "Let me know if you need anything else, bro! 😊",
            "That's all for now! 📰",
        ],
        (PhraseSet::Outro, Hinglish) => &[
            "Bass yahi tha aaj ka update! 👍",
            "Aur kuch chahiye toh batana bhai! 😊",
            "Ho gaya aaj ka news! 📰",
        ],
    }
}

/// Emoji and localized display name for a topic. Pure and total.
pub fn topic_label(topic: Topic, language: Language) -> (&'static str, &'static str) {
    let (emoji, hindi, english) = match topic {
        Topic::Politics => ("🏛️", "राजनीति", "Politics"),
        Topic::Technology => ("💻", "तकनीक", "Technology"),
        Topic::Sports => ("⚽", "खेल", "Sports"),
        Topic::Finance => ("💰", "वित्त", "Finance"),
        Topic::Entertainment => ("🎬", "मनोरंजन", "Entertainment"),
        Topic::Health => ("🏥", "स्वास्थ्य", "Health"),
        Topic::International => ("🌍", "अंतर्राष्ट्रीय", "International"),
        Topic::Business => ("🏢", "व्यापार", "Business"),
        Topic::General => ("📰", "सामान्य", "General"),
        Topic::CurrentAffairs => ("🗞️", "करंट अफेयर्स", "Current Affairs"),
    };

    // Hinglish readers get the English topic names
    let name = match language {
        Language::Hindi => hindi,
        Language::English | Language::Hinglish => english,
    };
    (emoji, name)
}

/// Localized intro that echoes the user's question back
pub fn query_echo(query: &str, language: Language) -> String {
    localize(Phrase::QueryEcho, language).replace(QUERY_PLACEHOLDER, query.trim())
}

/// Fails fast when any table entry is empty or a template lost its placeholder.
pub fn verify_complete() -> Result<()> {
    let mut missing: Vec<String> = Vec::new();

    for language in Language::ALL {
        for phrase in Phrase::ALL {
            let text = localize(phrase, language);
            if text.trim().is_empty() {
                missing.push(format!("{:?}/{}", phrase, language));
            }
            if phrase == Phrase::QueryEcho && !text.contains(QUERY_PLACEHOLDER) {
                missing.push(format!("{:?}/{} lacks {}", phrase, language, QUERY_PLACEHOLDER));
            }
        }
        for set in PhraseSet::ALL {
            let pool = phrases(set, language);
            if pool.is_empty() || pool.iter().any(|p| p.trim().is_empty()) {
                missing.push(format!("{:?}/{}", set, language));
            }
        }
        for topic in Topic::ALL {
            let (emoji, name) = topic_label(topic, language);
            if emoji.is_empty() || name.is_empty() {
                missing.push(format!("topic {}/{}", topic, language));
            }
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(DigestError::LocalizationIncomplete(missing.join(", ")))
    }
}
