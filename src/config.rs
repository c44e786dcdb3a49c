//! Runtime configuration.
//!
//! Everything that varies between deployments (sources, noise phrases, the
//! category rule table, the gazetteer, destination mapping, calendar colors)
//! lives in one [`AppConfig`] value. It is loaded once from YAML, validated,
//! and then handed by reference to the components that need it; nothing reads
//! configuration from global state.
//!
//! Every section is `#[serde(default)]`, so a YAML file only has to spell out
//! what differs from the built-in Clay County setup.

use crate::error::ConfigError;
use crate::models::Category;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{info, instrument};

/// How the classifier turns gazetteer matches into locality tags.
///
/// Sources disagree on what to do with a story that names several towns, so
/// this is an explicit setting rather than an incidental behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalityPolicy {
    /// Exactly one match tags that town; zero or several tag the sentinel.
    #[default]
    Exclusive,
    /// Every match is a tag; the sentinel only when nothing matched.
    All,
    /// The first match in gazetteer order; the sentinel when nothing matched.
    First,
}

/// One ordered rule of the category table.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CategoryRule {
    pub category: Category,
    /// Case-insensitive regular expressions; any match selects the rule.
    pub patterns: Vec<String>,
}

impl CategoryRule {
    fn new(category: Category, patterns: &[&str]) -> Self {
        Self {
            category,
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// A recognized place name and the pattern that detects it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Locality {
    pub name: String,
    /// Case-insensitive regular expression, word-bounded.
    pub pattern: String,
}

impl Locality {
    fn new(name: &str, pattern: &str) -> Self {
        Self {
            name: name.to_string(),
            pattern: pattern.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Maximum slug length in characters.
    pub max_len: usize,
    /// Append the primary locality to the title when it is not the sentinel.
    pub include_locality: bool,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            max_len: 50,
            include_locality: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub path: String,
    pub max_entries: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: "history.json".to_string(),
            max_entries: 500,
        }
    }
}

/// A syndication feed whose items may embed the full article.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeedSourceConfig {
    pub name: String,
    pub url: String,
    #[serde(default = "default_feed_max_items")]
    pub max_items: usize,
    /// Fetch the article page when the feed item has no embedded content.
    #[serde(default = "default_true")]
    pub fetch_full_article: bool,
    #[serde(default = "default_article_selector")]
    pub article_selector: String,
}

/// A keyword-driven search results page.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchSourceConfig {
    pub name: String,
    /// Base used to resolve relative result links.
    pub base_url: String,
    /// Results URL with a `{query}` placeholder.
    pub search_url: String,
    pub queries: Vec<String>,
    #[serde(default = "default_search_max_items")]
    pub max_items_per_query: usize,
    #[serde(default = "default_query_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
    #[serde(default = "default_result_selector")]
    pub result_selector: String,
    #[serde(default = "default_title_selector")]
    pub title_selector: String,
    #[serde(default = "default_summary_selector")]
    pub summary_selector: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    Feed(FeedSourceConfig),
    Search(SearchSourceConfig),
}

impl SourceConfig {
    pub fn name(&self) -> &str {
        match self {
            SourceConfig::Feed(f) => &f.name,
            SourceConfig::Search(s) => &s.name,
        }
    }
}

/// A content-management endpoint that accepts posts.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DestinationConfig {
    pub id: String,
    pub endpoint: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DistributionConfig {
    /// Destination id of the shared hub.
    pub hub: String,
    pub destinations: Vec<DestinationConfig>,
    /// Locality name to dedicated destination id. Unlisted localities and
    /// the sentinel go to the hub.
    pub localities: BTreeMap<String, String>,
    pub publish_delay_ms: u64,
    pub jitter_ms: u64,
    /// Number of items routed at the same time.
    pub concurrency: usize,
    pub brief_len: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Theme {
    pub bg: String,
    pub text: String,
}

impl Theme {
    fn new(bg: &str, text: &str) -> Self {
        Self {
            bg: bg.to_string(),
            text: text.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CalendarConfig {
    /// Page every calendar entry links to.
    pub url: String,
    pub themes: BTreeMap<String, Theme>,
    pub fallback: Theme,
}

impl CalendarConfig {
    pub fn theme_for(&self, locality: &str) -> &Theme {
        self.themes.get(locality).unwrap_or(&self.fallback)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FeedExportConfig {
    pub title: String,
    pub link: String,
    pub description: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub sentinel_locality: String,
    pub locality_policy: LocalityPolicy,
    pub identity: IdentityConfig,
    pub history: HistoryConfig,
    /// Time budget for one source's whole fetch, pauses included.
    pub source_timeout_secs: u64,
    /// Limit for a single HTTP request. Kept well below the source budget so
    /// one slow page cannot use it all.
    pub request_timeout_secs: u64,
    pub noise_patterns: Vec<String>,
    pub blacklist: Vec<String>,
    /// When non-empty, an item must mention a gazetteer locality or one of
    /// these keywords to be admitted.
    pub relevance_keywords: Vec<String>,
    pub categories: Vec<CategoryRule>,
    pub gazetteer: Vec<Locality>,
    pub sources: Vec<SourceConfig>,
    pub distribution: DistributionConfig,
    pub calendar: CalendarConfig,
    pub feed: FeedExportConfig,
}

fn default_true() -> bool {
    true
}
fn default_feed_max_items() -> usize {
    20
}
fn default_search_max_items() -> usize {
    3
}
fn default_query_delay_ms() -> u64 {
    2_000
}
fn default_jitter_ms() -> u64 {
    1_500
}
fn default_article_selector() -> String {
    "div.entry-content".to_string()
}
fn default_result_selector() -> String {
    "article".to_string()
}
fn default_title_selector() -> String {
    "h3".to_string()
}
fn default_summary_selector() -> String {
    "p, .description, .summary".to_string()
}

const HUB_ENDPOINT: &str = "https://supportmylocalcommunity.com";

impl Default for DistributionConfig {
    fn default() -> Self {
        let towns = [
            ("Flora", "flora"),
            ("Louisville", "louisville"),
            ("Clay City", "clay-city"),
            ("Xenia", "xenia"),
        ];
        let mut destinations = vec![DestinationConfig {
            id: "hub".to_string(),
            endpoint: HUB_ENDPOINT.to_string(),
        }];
        let mut localities = BTreeMap::new();
        for (town, slug) in towns {
            destinations.push(DestinationConfig {
                id: slug.to_string(),
                endpoint: format!("https://{slug}.supportmylocalcommunity.com"),
            });
            localities.insert(town.to_string(), slug.to_string());
        }
        Self {
            hub: "hub".to_string(),
            destinations,
            localities,
            publish_delay_ms: 1_000,
            jitter_ms: 1_000,
            concurrency: 1,
            brief_len: 180,
        }
    }
}

impl Default for CalendarConfig {
    fn default() -> Self {
        let themes = [
            ("Clay City", Theme::new("#ADD8E6", "#000000")),
            ("Sailor Springs", Theme::new("#367C2B", "#FFDE00")),
            ("Xenia", Theme::new("#0077BE", "#FFC0CB")),
            ("Flora", Theme::new("#FFFFFF", "#000000")),
            ("Louisville", Theme::new("#FFFFFF", "#000000")),
            ("Iola", Theme::new("#FFFFFF", "#000000")),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        Self {
            url: format!("{HUB_ENDPOINT}/clay-county-news-center/"),
            themes,
            fallback: Theme::new("#808080", "#FFFFFF"),
        }
    }
}

impl Default for FeedExportConfig {
    fn default() -> Self {
        Self {
            title: "Clay County News".to_string(),
            link: format!("{HUB_ENDPOINT}/clay-county-news-center/"),
            description: "Local news for Flora, Louisville, Clay City, Xenia, Sailor Springs and Iola"
                .to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let towns = ["Flora", "Louisville", "Clay City", "Xenia", "Sailor Springs", "Iola"];
        Self {
            sentinel_locality: "County News".to_string(),
            locality_policy: LocalityPolicy::Exclusive,
            identity: IdentityConfig::default(),
            history: HistoryConfig::default(),
            source_timeout_secs: 30,
            request_timeout_secs: 10,
            noise_patterns: vec![
                r"wnoi".to_string(),
                r"103\.9/99\.3".to_string(),
                r"local\s*--".to_string(),
                r"by\s+tom\s+lavine".to_string(),
                r"^\d{1,2}/\d{1,2}/\d{2,4}\s*".to_string(),
            ],
            blacklist: vec![
                "Cisne".to_string(),
                "Fairfield".to_string(),
                "Wayne County".to_string(),
            ],
            relevance_keywords: vec!["Clay County".to_string()],
            categories: vec![
                CategoryRule::new(
                    Category::Obituary,
                    &[r"\bobituar(y|ies)\b", r"\bpassed away\b", r"\bvisitation will be\b", r"\bfuneral services?\b"],
                ),
                CategoryRule::new(
                    Category::FireRescue,
                    &[
                        r"\b(structure|house|grass|field|vehicle|barn) fire\b",
                        r"\bfirefighters (responded|battled|were called)\b",
                        r"\bfire crews?\b",
                        r"\bextricat(ed|ion)\b",
                        r"\bwater rescue\b",
                    ],
                ),
                CategoryRule::new(
                    Category::PoliceReport,
                    &[
                        r"\barrest(ed)?\b",
                        r"\bsheriff'?s? (office|department|deputies)\b",
                        r"\bcharged with\b",
                        r"\bpolice report\b",
                        r"\bbooked into\b",
                    ],
                ),
                CategoryRule::new(
                    Category::SchoolNews,
                    &[
                        r"\bschool board\b",
                        r"\bboard of education\b",
                        r"\b(high|grade|middle|elementary) school\b",
                        r"\bstudents?\b",
                        r"\bhonor roll\b",
                    ],
                ),
                CategoryRule::new(
                    Category::StateRegional,
                    &[
                        r"\bgovernor\b",
                        r"\bstatewide\b",
                        r"\bgeneral assembly\b",
                        r"\billinois state police\b",
                        r"\bidot\b",
                    ],
                ),
                CategoryRule::new(
                    Category::ArtsEntertainment,
                    &[
                        r"\bconcert\b",
                        r"\bfestival\b",
                        r"\btheat(er|re)\b",
                        r"\bart (show|exhibit)\b",
                        r"\blive music\b",
                    ],
                ),
            ],
            gazetteer: towns
                .iter()
                .map(|t| {
                    let words: Vec<String> = t.split_whitespace().map(regex::escape).collect();
                    Locality::new(t, &format!(r"\b{}\b", words.join(r"\s*")))
                })
                .collect(),
            sources: vec![
                SourceConfig::Feed(FeedSourceConfig {
                    name: "wnoi-local".to_string(),
                    url: "https://www.wnoi.com/category/local/feed".to_string(),
                    max_items: default_feed_max_items(),
                    fetch_full_article: true,
                    article_selector: default_article_selector(),
                }),
                SourceConfig::Search(SearchSourceConfig {
                    name: "newsbreak".to_string(),
                    base_url: "https://www.newsbreak.com".to_string(),
                    search_url: "https://www.newsbreak.com/search?q={query}".to_string(),
                    queries: towns.iter().map(|t| format!("{t} IL")).collect(),
                    max_items_per_query: default_search_max_items(),
                    delay_ms: default_query_delay_ms(),
                    jitter_ms: default_jitter_ms(),
                    result_selector: default_result_selector(),
                    title_selector: default_title_selector(),
                    summary_selector: default_summary_selector(),
                }),
            ],
            distribution: DistributionConfig::default(),
            calendar: CalendarConfig::default(),
            feed: FeedExportConfig::default(),
        }
    }
}

impl AppConfig {
    /// Parse a YAML document, then validate it.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, or use the built-in defaults when no path is given.
    #[instrument(level = "info")]
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            info!("No config file given; using built-in defaults");
            let config = AppConfig::default();
            config.validate()?;
            return Ok(config);
        };
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        let config = Self::from_yaml(&yaml)?;
        info!(
            sources = config.sources.len(),
            localities = config.gazetteer.len(),
            rules = config.categories.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Cross-field checks that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sentinel_locality.trim().is_empty() {
            return Err(ConfigError::invalid("sentinel_locality must not be empty"));
        }
        if self.history.max_entries == 0 {
            return Err(ConfigError::invalid("history.max_entries must be at least 1"));
        }
        if self.identity.max_len == 0 {
            return Err(ConfigError::invalid("identity.max_len must be at least 1"));
        }
        if self.request_timeout_secs == 0 || self.request_timeout_secs > self.source_timeout_secs {
            return Err(ConfigError::invalid(
                "request_timeout_secs must be between 1 and source_timeout_secs",
            ));
        }
        if self.distribution.concurrency == 0 {
            return Err(ConfigError::invalid("distribution.concurrency must be at least 1"));
        }

        let mut names = HashSet::new();
        for source in &self.sources {
            if !names.insert(source.name()) {
                return Err(ConfigError::invalid(format!(
                    "duplicate source name '{}'",
                    source.name()
                )));
            }
        }

        let ids: HashSet<&str> = self
            .distribution
            .destinations
            .iter()
            .map(|d| d.id.as_str())
            .collect();
        if !self.distribution.destinations.is_empty() && !ids.contains(self.distribution.hub.as_str()) {
            return Err(ConfigError::invalid(format!(
                "hub '{}' is not a configured destination",
                self.distribution.hub
            )));
        }
        for (locality, id) in &self.distribution.localities {
            if !ids.contains(id.as_str()) {
                return Err(ConfigError::invalid(format!(
                    "locality '{locality}' maps to unknown destination '{id}'"
                )));
            }
        }
        Ok(())
    }
}
