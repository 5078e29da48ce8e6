//! Text cleanup helpers shared by every source tier and the synthesizer.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<[^>]+>").expect("valid tag regex"));

static RE_SOCIAL_NOISE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://\S+|www\.\S+|@\w+|#\w+").expect("valid social noise regex"));

/// Collapses runs of whitespace to a single space and trims.
pub fn normalize_whitespace(s: &str) -> String {
    RE_WS.replace_all(s, " ").trim().to_string()
}

/// Turns an HTML fragment (feed description, scraped snippet) into plain text.
pub fn strip_html(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s);
    let without_tags = RE_TAGS.replace_all(&decoded, " ");
    let quotes = without_tags
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace('\u{00A0}', " ");
    normalize_whitespace(&quotes)
}

/// Removes links, @mentions and #hashtags so the text reads well aloud.
pub fn clean_social_text(s: &str) -> String {
    normalize_whitespace(&RE_SOCIAL_NOISE.replace_all(s, " "))
}

/// Truncates to at most `max_chars` chars, marking the cut with `…`.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }
    let kept: String = s.chars().take(max_chars - 1).collect();
    format!("{}…", kept.trim_end())
}

/// Hard cut without a marker, used where downstream limits are strict.
pub fn take_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Picks a headline out of free-form content.
///
/// First sentence when it is long enough to stand alone, otherwise the first
/// 100 chars.
pub fn derive_title(content: &str) -> String {
    let clean = clean_social_text(content);
    if let Some(first) = clean.split('.').next() {
        let first = first.trim();
        if first.chars().count() > 20 {
            return format!("{}.", first);
        }
    }
    if clean.chars().count() > 100 {
        format!("{}...", take_chars(&clean, 100))
    } else {
        clean
    }
}

/// "hindustantimes" -> "Hindustantimes", "the-hindu" -> "The Hindu"
pub fn title_case(s: &str) -> String {
    s.split(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_html() {
        let s = "<p>Sensex&nbsp;rises <b>500</b> points</p>\n\n<a href=\"x\">Read more</a>";
        assert_eq!(strip_html(s), "Sensex rises 500 points Read more");
    }

    #[test]
    fn test_clean_social_text() {
        let s = "BREAKING: Monsoon hits Kerala @IMDWeather #monsoon https://t.co/abc   today";
        assert_eq!(clean_social_text(s), "BREAKING: Monsoon hits Kerala today");
    }

    #[test]
    fn test_truncate_chars_is_char_safe() {
        let hindi = "अरे भाई, आज की खबर सुनो";
        let cut = truncate_chars(hindi, 5);
        assert!(cut.chars().count() <= 5);
        assert!(cut.ends_with('…'));
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("anything", 0), "");
    }

    #[test]
    fn test_derive_title_short_sentence_uses_prefix() {
        assert_eq!(derive_title("Rain today. More later."), "Rain today. More later.");
        let long = format!("Short one. {}", "word ".repeat(40));
        assert_eq!(derive_title(&long).chars().count(), 103);
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("thehindu"), "Thehindu");
        assert_eq!(title_case("the-hindu"), "The Hindu");
    }
}
