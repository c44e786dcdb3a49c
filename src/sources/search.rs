//! Keyword search results adapter.
//!
//! For each configured query, fetches a search results page and pulls the
//! first few result blocks: headline, link and a short summary. Results only
//! carry teasers, so this adapter ranks below full-article feeds.
//!
//! Queries run one after another with a jittered pause in between, since they
//! all hit the same host. A query that fails is logged and skipped; the
//! source only counts as unavailable when every query failed. When the
//! source's time budget runs out, the remaining queries are dropped and the
//! results gathered so far are kept.

use crate::config::SearchSourceConfig;
use crate::error::SourceError;
use crate::models::RawItem;
use crate::sources::{Richness, SourceAdapter, get_text, selector};
use crate::utils::{brief, polite_delay};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html};
use std::time::Duration;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, instrument, warn};
use url::Url;

const DEFAULT_SUMMARY: &str = "Latest community update.";
const SUMMARY_LEN: usize = 180;

/// CSS selectors describing one results page layout.
#[derive(Debug, Clone, Copy)]
pub struct ResultLayout<'a> {
    pub result: &'a str,
    pub title: &'a str,
    pub summary: &'a str,
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ").trim().to_string()
}

/// Parse up to `cap` usable results out of a results page.
///
/// Blocks without a headline or a link are skipped and do not count
/// against the cap. Relative links are resolved against `base`.
pub fn parse_results(
    html: &str,
    base: &Url,
    layout: ResultLayout<'_>,
    source: &str,
    cap: usize,
) -> Result<Vec<RawItem>, SourceError> {
    let document = Html::parse_document(html);
    let result_sel = selector(layout.result)?;
    let title_sel = selector(layout.title)?;
    let summary_sel = selector(layout.summary)?;
    let link_sel = selector("a[href]")?;

    let mut items = Vec::new();
    for block in document.select(&result_sel) {
        if items.len() >= cap {
            break;
        }
        let Some(title) = block.select(&title_sel).next().map(element_text) else {
            continue;
        };
        if title.is_empty() {
            continue;
        }
        let Some(href) = block
            .select(&link_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
        else {
            continue;
        };
        let Ok(link) = base.join(href) else {
            debug!(%href, "Unresolvable result link");
            continue;
        };
        let summary = block
            .select(&summary_sel)
            .next()
            .map(element_text)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_SUMMARY.to_string());

        items.push(RawItem {
            source: source.to_string(),
            title,
            body_text: brief(&summary, SUMMARY_LEN),
            source_link: link.to_string(),
            published_at: None,
        });
    }
    Ok(items)
}

pub struct SearchAdapter {
    config: SearchSourceConfig,
    client: Client,
}

impl SearchAdapter {
    pub fn new(config: SearchSourceConfig, client: Client) -> Self {
        Self { config, client }
    }

    fn query_url(&self, query: &str) -> String {
        self.config
            .search_url
            .replace("{query}", &urlencoding::encode(query))
    }

    fn layout(&self) -> ResultLayout<'_> {
        ResultLayout {
            result: &self.config.result_selector,
            title: &self.config.title_selector,
            summary: &self.config.summary_selector,
        }
    }

    #[instrument(level = "info", skip(self, base))]
    async fn run_query(&self, base: &Url, query: &str) -> Result<Vec<RawItem>, SourceError> {
        let url = self.query_url(query);
        let html = get_text(&self.client, &url).await?;
        let items = parse_results(
            &html,
            base,
            self.layout(),
            &self.config.name,
            self.config.max_items_per_query,
        )?;
        info!(count = items.len(), %url, "Parsed search results");
        Ok(items)
    }
}

#[async_trait]
impl SourceAdapter for SearchAdapter {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn richness(&self) -> Richness {
        Richness::Teaser
    }

    fn max_items(&self) -> usize {
        self.config.max_items_per_query * self.config.queries.len()
    }

    #[instrument(level = "info", skip_all, fields(source = %self.config.name))]
    async fn fetch(&self, budget: Duration) -> Result<Vec<RawItem>, SourceError> {
        let deadline = Instant::now() + budget;
        let base = Url::parse(&self.config.base_url)?;
        let mut items = Vec::new();
        let mut last_error = None;
        let mut succeeded = 0usize;

        for (i, query) in self.config.queries.iter().enumerate() {
            let step = async {
                if i > 0 {
                    polite_delay(self.config.delay_ms, self.config.jitter_ms).await;
                }
                self.run_query(&base, query).await
            };
            match timeout_at(deadline, step).await {
                Ok(Ok(batch)) => {
                    succeeded += 1;
                    items.extend(batch);
                }
                Ok(Err(e)) => {
                    warn!(%query, error = %e, "Search query failed; skipping");
                    last_error = Some(e);
                }
                Err(_) => {
                    warn!(%query, collected = items.len(), "Source budget spent; keeping results so far");
                    if succeeded == 0 {
                        last_error = Some(SourceError::Timeout {
                            source_name: self.config.name.clone(),
                            secs: budget.as_secs(),
                        });
                    }
                    break;
                }
            }
        }

        match last_error {
            Some(e) if succeeded == 0 => Err(e),
            _ => Ok(items),
        }
    }
}
