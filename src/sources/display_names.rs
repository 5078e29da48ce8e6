//! Human-readable names for feed and page hosts

use crate::text::title_case;

/// Host fragment -> display name. First match wins, so more specific
/// fragments come first.
const KNOWN_OUTLETS: &[(&str, &str)] = &[
    ("gadgets.ndtv", "NDTV Gadgets"),
    ("sports.ndtv", "NDTV Sports"),
    ("ndtv", "NDTV"),
    ("feedburner", "NDTV"),
    ("health.economictimes", "ET HealthWorld"),
    ("economictimes", "Economic Times"),
    ("timesofindia", "Times of India"),
    ("hindustantimes", "Hindustan Times"),
    ("indiatoday", "India Today"),
    ("news18", "News18"),
    ("thehindu", "The Hindu"),
    ("theverge", "The Verge"),
    ("digit.in", "Digit"),
    ("espn", "ESPN"),
    ("sportskeeda", "Sportskeeda"),
    ("livemint", "Mint"),
    ("moneycontrol", "Moneycontrol"),
    ("business-standard", "Business Standard"),
    ("filmfare", "Filmfare"),
    ("bollywoodhungama", "Bollywood Hungama"),
    ("indianexpress", "Indian Express"),
    ("healthline", "Healthline"),
    ("who.int", "WHO"),
    ("bbc", "BBC"),
    ("cnn", "CNN"),
    ("reuters", "Reuters"),
    ("aljazeera", "Al Jazeera"),
];

/// Display name for the outlet behind a URL.
///
/// Unknown hosts fall back to the title-cased bare domain: `www.` and the
/// TLD are removed, so `https://www.deccanherald.com/rss` gives `Deccanherald`.
pub fn display_name_for(url: &str) -> String {
    let host = match url::Url::parse(url) {
        Ok(parsed) => match parsed.host() {
            Some(url::Host::Domain(domain)) => domain.to_lowercase(),
            Some(ip) => return ip.to_string(),
            None => return "Web".to_string(),
        },
        Err(_) => url.to_lowercase(),
    };

    if let Some((_, name)) = KNOWN_OUTLETS.iter().find(|(fragment, _)| host.contains(fragment)) {
        return (*name).to_string();
    }

    bare_domain_name(&host)
}

fn bare_domain_name(host: &str) -> String {
    let host = host.strip_prefix("www.").unwrap_or(host);
    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();

    let name = match labels.len() {
        0 => return "Web".to_string(),
        1 => labels[0],
        // example.co.in -> example
        n if n >= 3 && labels[n - 2].len() <= 3 && labels[n - 1].len() == 2 => labels[n - 3],
        n => labels[n - 2],
    };
    title_case(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_outlets() {
        assert_eq!(display_name_for("https://timesofindia.indiatimes.com/rssfeedstopstories.cms"), "Times of India");
        assert_eq!(display_name_for("https://feeds.feedburner.com/ndtvnews-top-stories"), "NDTV");
        assert_eq!(display_name_for("https://gadgets.ndtv.com/rss/feeds"), "NDTV Gadgets");
        assert_eq!(display_name_for("https://www.livemint.com/rss/markets"), "Mint");
    }

    #[test]
    fn test_fallback_is_title_cased_bare_domain() {
        assert_eq!(display_name_for("https://www.deccanherald.com/rss"), "Deccanherald");
        assert_eq!(display_name_for("https://news.example.co.in/feed"), "Example");
        assert_eq!(display_name_for("http://127.0.0.1:8080/feed"), "127.0.0.1");
    }
}
