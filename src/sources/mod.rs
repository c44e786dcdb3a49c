//! Source adapters that produce raw candidate items.
//!
//! Each adapter talks to one upstream host and yields a bounded batch of
//! [`RawItem`]s per run. Adapters never classify or deduplicate; that is the
//! aggregation driver's job.
//!
//! # Supported Sources
//!
//! | Kind | Module | Method | Body text |
//! |------|--------|--------|-----------|
//! | Feed | [`feed`] | RSS 2.0 + `content:encoded` | Full article |
//! | Search | [`search`] | Results page scraping | Teaser |
//!
//! Adapters are queried concurrently; a failing adapter is skipped for the
//! run. Full-article sources are processed before teaser sources so a richer
//! copy of a story wins over a later snippet of the same story.

use crate::config::SourceConfig;
use crate::error::SourceError;
use crate::models::RawItem;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

pub mod feed;
pub mod search;

/// How much of a story a source's items carry. Richer sources sort first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Richness {
    FullArticle,
    Teaser,
}

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn name(&self) -> &str;

    fn richness(&self) -> Richness;

    /// Upper bound on candidates taken from this source per run.
    fn max_items(&self) -> usize;

    /// Pull the current batch within `budget`. An empty batch is not an error.
    ///
    /// When the budget runs out part way, the items collected so far are
    /// returned; only a source that produced nothing in time fails with
    /// [`SourceError::Timeout`].
    async fn fetch(&self, budget: Duration) -> Result<Vec<RawItem>, SourceError>;
}

/// Build one adapter per configured source, in configuration order.
pub fn build_adapters(sources: &[SourceConfig], client: &Client) -> Vec<Box<dyn SourceAdapter>> {
    sources
        .iter()
        .map(|source| -> Box<dyn SourceAdapter> {
            match source {
                SourceConfig::Feed(cfg) => Box::new(feed::FeedAdapter::new(cfg.clone(), client.clone())),
                SourceConfig::Search(cfg) => {
                    Box::new(search::SearchAdapter::new(cfg.clone(), client.clone()))
                }
            }
        })
        .collect()
}

/// GET `url` and return the body, treating non-success statuses as errors.
pub(crate) async fn get_text(client: &Client, url: &str) -> Result<String, SourceError> {
    let resp = client.get(url).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(SourceError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(resp.text().await?)
}

pub(crate) fn selector(css: &str) -> Result<scraper::Selector, SourceError> {
    scraper::Selector::parse(css)
        .map_err(|e| SourceError::Parse(format!("invalid selector '{css}': {e:?}")))
}
