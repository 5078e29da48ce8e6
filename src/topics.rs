//! Topic Source Configuration
//!
//! Per-topic social handles and feed URLs plus the current-affairs page list.
//! Built-in defaults can be overridden from a TOML file at startup; the
//! resulting table is read-only.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{DigestError, Result};
use crate::schemas::Topic;

static NO_SOURCES: TopicSources = TopicSources {
    handles: Vec::new(),
    feeds: Vec::new(),
};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopicSources {
    #[serde(default)]
    pub handles: Vec<String>,
    #[serde(default)]
    pub feeds: Vec<String>,
}

impl TopicSources {
    pub fn new<H, F>(handles: H, feeds: F) -> Self
    where
        H: IntoIterator,
        H::Item: Into<String>,
        F: IntoIterator,
        F::Item: Into<String>,
    {
        Self {
            handles: handles.into_iter().map(Into::into).collect(),
            feeds: feeds.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty() && self.feeds.is_empty()
    }
}

/// On-disk shape, keyed by raw topic strings so bad keys can be reported
#[derive(Debug, Deserialize)]
struct SourcesFile {
    #[serde(default)]
    topics: HashMap<String, TopicSources>,
    #[serde(default)]
    current_affairs_pages: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopicSourceConfig {
    topics: HashMap<Topic, TopicSources>,
    current_affairs_pages: Vec<String>,
}

impl Default for TopicSourceConfig {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TopicSourceConfig {
    /// Empty table, used by tests and callers that assemble sources by hand
    pub fn empty() -> Self {
        Self {
            topics: HashMap::new(),
            current_affairs_pages: Vec::new(),
        }
    }

    pub fn with_topic(mut self, topic: Topic, sources: TopicSources) -> Self {
        self.topics.insert(topic, sources);
        self
    }

    pub fn with_current_affairs_pages<I, S>(mut self, pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.current_affairs_pages = pages.into_iter().map(Into::into).collect();
        self
    }

    /// Sources for a topic; topics without an entry use `general`.
    pub fn sources_for(&self, topic: Topic) -> &TopicSources {
        self.topics
            .get(&topic)
            .or_else(|| self.topics.get(&Topic::General))
            .unwrap_or(&NO_SOURCES)
    }

    pub fn current_affairs_pages(&self) -> &[String] {
        &self.current_affairs_pages
    }

    /// Topics with an explicit entry, in canonical order
    pub fn configured_topics(&self) -> Vec<Topic> {
        Topic::ALL
            .into_iter()
            .filter(|t| self.topics.contains_key(t))
            .collect()
    }

    /// Loads overrides from a TOML file on top of the built-in table.
    ///
    /// ```toml
    /// current_affairs_pages = ["https://www.indiatoday.in/india"]
    ///
    /// [topics.sports]
    /// handles = ["cricbuzz"]
    /// feeds = ["https://www.espn.in/espn/rss/cricket/news"]
    /// ```
    pub fn load(path: &Path) -> Result<Self> {
        let raw = config::Config::builder()
            .add_source(config::File::new(&path.to_string_lossy(), config::FileFormat::Toml))
            .build()?;
        let file: SourcesFile = raw.try_deserialize()?;

        let mut cfg = Self::builtin();
        for (key, sources) in file.topics {
            match Topic::from_key(&key) {
                Some(topic) => {
                    cfg.topics.insert(topic, sources);
                }
                None => warn!(topic = %key, "Ignoring sources for unknown topic"),
            }
        }
        if let Some(pages) = file.current_affairs_pages {
            cfg.current_affairs_pages = pages;
        }

        cfg.validate()?;
        info!(path = %path.display(), topics = cfg.topics.len(), "Loaded topic sources");
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        for (topic, sources) in &self.topics {
            for feed in sources.feeds.iter() {
                url::Url::parse(feed)
                    .map_err(|e| DigestError::InvalidConfig(format!("{} feed {}: {}", topic, feed, e)))?;
            }
        }
        for page in &self.current_affairs_pages {
            url::Url::parse(page)
                .map_err(|e| DigestError::InvalidConfig(format!("current affairs page {}: {}", page, e)))?;
        }
        Ok(())
    }

    /// Default Indian news handles and feeds per topic
    pub fn builtin() -> Self {
        let entries: [(Topic, &[&str], &[&str]); 9] = [
            (
                Topic::General,
                &["ANI", "ndtv", "timesofindia", "IndianExpress", "htTweets"],
                &[
                    "https://feeds.feedburner.com/ndtvnews-top-stories",
                    "https://timesofindia.indiatimes.com/rssfeedstopstories.cms",
                    "https://www.hindustantimes.com/feeds/rss/news/latest.xml",
                    "https://www.indiatoday.in/rss/home",
                    "https://www.news18.com/rss/india.xml",
                ],
            ),
            (
                Topic::Politics,
                &["ANI", "ndtv", "IndianExpress", "republic", "aajtak"],
                &[
                    "https://timesofindia.indiatimes.com/rssfeeds/1898055.cms",
                    "https://www.thehindu.com/news/national/feeder/default.rss",
                    "https://www.indiatoday.in/rss/1206514",
                    "https://www.news18.com/rss/politics.xml",
                ],
            ),
            (
                Topic::Technology,
                &["ETtech", "YourStory", "Inc42", "Medianama", "trak_in"],
                &[
                    "https://economictimes.indiatimes.com/tech/rss/feedsdefault.cms",
                    "https://www.theverge.com/rss/index.xml",
                    "https://www.digit.in/feed",
                    "https://gadgets.ndtv.com/rss/feeds",
                ],
            ),
            (
                Topic::Sports,
                &["ESPNcricinfo", "cricbuzz", "KhelNow", "IndiaToday_SPO"],
                &[
                    "https://timesofindia.indiatimes.com/rssfeeds/4719148.cms",
                    "https://www.espn.in/espn/rss/cricket/news",
                    "https://sports.ndtv.com/rss/all",
                    "https://www.sportskeeda.com/feed",
                ],
            ),
            (
                Topic::Finance,
                &["ETMarkets", "BloombergQuint", "moneycontrolcom", "livemint"],
                &[
                    "https://economictimes.indiatimes.com/markets/rss/rssfeeds.cms",
                    "https://www.livemint.com/rss/markets",
                    "https://www.moneycontrol.com/rss/latestnews.xml",
                    "https://www.business-standard.com/rss/markets-106.rss",
                ],
            ),
            (
                Topic::Entertainment,
                &["filmfare", "BollywoodHungama", "PinkvillaNews", "ETimes"],
                &[
                    "https://timesofindia.indiatimes.com/rssfeeds/1081479906.cms",
                    "https://www.filmfare.com/feed",
                    "https://www.bollywoodhungama.com/rss/news",
                    "https://indianexpress.com/section/entertainment/feed/",
                ],
            ),
            (
                Topic::Health,
                &["MoHFW_INDIA", "WHO", "timesofindia", "ndtv"],
                &[
                    "https://timesofindia.indiatimes.com/rssfeeds/3908999.cms",
                    "https://health.economictimes.indiatimes.com/rss",
                    "https://www.healthline.com/nutrition/feed",
                    "https://www.who.int/india/rss",
                ],
            ),
            (
                Topic::International,
                &["BBCWorld", "Reuters", "CNN", "AlJazeera"],
                &[
                    "https://timesofindia.indiatimes.com/rssfeeds/296589292.cms",
                    "https://www.bbc.com/news/world/asia/india/rss.xml",
                    "https://rss.cnn.com/rss/edition_world.rss",
                    "https://feeds.feedburner.com/ndtvnews-world-news",
                ],
            ),
            (
                Topic::Business,
                &["ETNow", "CNBCTV18News", "BloombergQuint", "BusinessLine"],
                &[
                    "https://economictimes.indiatimes.com/industry/rss/industry.cms",
                    "https://www.livemint.com/rss/companies",
                    "https://www.business-standard.com/rss/companies-101.rss",
                    "https://www.moneycontrol.com/rss/business.xml",
                ],
            ),
        ];

        let topics = entries
            .into_iter()
            .map(|(topic, handles, feeds)| (topic, TopicSources::new(handles.iter().copied(), feeds.iter().copied())))
            .collect();

        Self {
            topics,
            current_affairs_pages: vec![
                "https://www.indiatoday.in/india".to_string(),
                "https://timesofindia.indiatimes.com/india".to_string(),
                "https://www.hindustantimes.com/india-news".to_string(),
            ],
        }
    }
}
