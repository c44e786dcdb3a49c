//! RSS feed adapter.
//!
//! Reads an RSS 2.0 channel and turns each `<item>` into a [`RawItem`]. The
//! body is the item's `content:encoded` payload when present. Otherwise, if
//! configured, the article page is fetched and the text of its content block
//! (`div.entry-content` by default) is used, falling back to `<description>`.
//! Article pages left unfetched when the source's time budget runs out also
//! fall back to `<description>`.

use crate::config::FeedSourceConfig;
use crate::error::SourceError;
use crate::models::RawItem;
use crate::sources::{Richness, SourceAdapter, get_text, selector};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use reqwest::Client;
use scraper::Html;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<FeedEntry>,
}

/// One `<item>` of the channel, before any cleanup.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "encoded", alias = "content:encoded")]
    pub content: Option<String>,
    #[serde(rename = "pubDate")]
    pub pub_date: Option<String>,
}

impl FeedEntry {
    fn embedded_content(&self) -> Option<&str> {
        self.content.as_deref().filter(|c| !c.trim().is_empty())
    }

    fn into_raw(self, source: &str, body: Option<String>) -> RawItem {
        let body_text = body
            .or_else(|| self.embedded_content().map(str::to_string))
            .or(self.description)
            .unwrap_or_default();
        RawItem {
            source: source.to_string(),
            title: self.title.unwrap_or_default(),
            body_text,
            source_link: self.link.unwrap_or_default(),
            published_at: self.pub_date.as_deref().and_then(parse_pub_date),
        }
    }
}

/// Parse an RFC 2822 `pubDate`; unparseable dates are dropped.
pub fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse the channel's items, keeping at most `cap` of them.
pub fn parse_entries(xml: &str, cap: usize) -> Result<Vec<FeedEntry>, SourceError> {
    let rss: Rss = quick_xml::de::from_str(xml).map_err(|e| SourceError::Parse(e.to_string()))?;
    Ok(rss.channel.items.into_iter().take(cap).collect())
}

/// Text of every element matching `css`, joined with spaces so adjacent
/// blocks (and email/link text) do not run together.
pub fn extract_article_text(html: &str, css: &str) -> Result<Option<String>, SourceError> {
    let document = Html::parse_document(html);
    let sel = selector(css)?;
    let text = document
        .select(&sel)
        .map(|el| el.text().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join(" ");
    Ok((!text.trim().is_empty()).then_some(text))
}

pub struct FeedAdapter {
    config: FeedSourceConfig,
    client: Client,
}

impl FeedAdapter {
    pub fn new(config: FeedSourceConfig, client: Client) -> Self {
        Self { config, client }
    }

    #[instrument(level = "debug", skip(self))]
    async fn fetch_article_text(&self, url: &str) -> Option<String> {
        let html = match get_text(&self.client, url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(%url, error = %e, "Article fetch failed; using feed description");
                return None;
            }
        };
        match extract_article_text(&html, &self.config.article_selector) {
            Ok(text) => text,
            Err(e) => {
                warn!(%url, error = %e, "Article parse failed; using feed description");
                None
            }
        }
    }
}

#[async_trait]
impl SourceAdapter for FeedAdapter {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn richness(&self) -> Richness {
        Richness::FullArticle
    }

    fn max_items(&self) -> usize {
        self.config.max_items
    }

    #[instrument(level = "info", skip_all, fields(source = %self.config.name))]
    async fn fetch(&self, budget: Duration) -> Result<Vec<RawItem>, SourceError> {
        let deadline = Instant::now() + budget;
        let xml = timeout_at(deadline, get_text(&self.client, &self.config.url))
            .await
            .map_err(|_| SourceError::Timeout {
                source_name: self.config.name.clone(),
                secs: budget.as_secs(),
            })??;
        let entries = parse_entries(&xml, self.config.max_items)?;
        info!(count = entries.len(), url = %self.config.url, "Parsed feed items");

        let items: Vec<RawItem> = stream::iter(entries)
            .then(|entry| async move {
                let needs_page = self.config.fetch_full_article && entry.embedded_content().is_none();
                let body = match (&entry.link, needs_page) {
                    (Some(link), true) => timeout_at(deadline, self.fetch_article_text(link))
                        .await
                        .unwrap_or_else(|_| {
                            debug!(%link, "Source budget spent; using feed description");
                            None
                        }),
                    _ => None,
                };
                debug!(title = ?entry.title, full_page = body.is_some(), "Feed item");
                entry.into_raw(&self.config.name, body)
            })
            .collect()
            .await;
        Ok(items)
    }
}
