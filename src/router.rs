//! Distribution of admitted items to publish destinations.
//!
//! Every item has one primary destination: the dedicated site of its primary
//! locality, or the shared hub when the locality has no site of its own (the
//! county-wide sentinel included). Delivery is an explicit two-step protocol:
//!
//! 1. publish to the primary destination;
//! 2. only if that succeeded, and the primary is not the hub, mirror to the hub.
//!
//! An item is written to history once at least one destination accepted it.
//! An item nobody accepted stays out of history so the next run retries it.
//! Publishing is not idempotent upstream, so a retry may double-post; losing
//! a story silently would be worse.

use crate::config::DistributionConfig;
use crate::error::{ConfigError, PublishError};
use crate::history::HistoryStore;
use crate::models::AdmittedItem;
use crate::utils::{brief, polite_delay};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use quick_xml::escape::escape;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{info, instrument, warn};
use url::Url;

/// What a destination receives for one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostRequest {
    pub title: String,
    pub body: String,
    pub link: String,
}

impl From<&AdmittedItem> for PostRequest {
    fn from(item: &AdmittedItem) -> Self {
        Self {
            title: item.title().to_string(),
            body: item.body().to_string(),
            link: item.link().to_string(),
        }
    }
}

/// A sink that can accept a post.
#[async_trait]
pub trait Destination: Send + Sync {
    fn id(&self) -> &str;

    async fn publish(&self, post: &PostRequest) -> Result<(), PublishError>;
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub app_password: String,
}

/// A WordPress site reached through its REST posts endpoint.
///
/// Only `201 Created` counts as success.
pub struct WordPressDestination {
    id: String,
    posts_url: Url,
    credentials: Option<Credentials>,
    brief_len: usize,
    client: Client,
}

#[derive(Debug, Serialize)]
struct WordPressPost<'a> {
    title: &'a str,
    content: String,
    status: &'static str,
}

impl WordPressDestination {
    pub fn new(
        id: &str,
        endpoint: &str,
        credentials: Option<Credentials>,
        brief_len: usize,
        client: Client,
    ) -> Result<Self, ConfigError> {
        let mut base = Url::parse(endpoint).map_err(|e| {
            ConfigError::invalid(format!("destination '{id}' has a bad endpoint '{endpoint}': {e}"))
        })?;
        // A site installed under a sub-path keeps that path when joined.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let posts_url = base
            .join("wp-json/wp/v2/posts")
            .map_err(|e| ConfigError::invalid(format!("destination '{id}': {e}")))?;
        Ok(Self {
            id: id.to_string(),
            posts_url,
            credentials,
            brief_len,
            client,
        })
    }
}

/// Post body: a teaser and a link to the full story, both HTML-escaped.
pub fn render_content(post: &PostRequest, brief_len: usize) -> String {
    format!(
        "<p>{}</p>\n<p><a href=\"{}\">Read the full story</a></p>",
        escape(&brief(&post.body, brief_len)),
        escape(&post.link)
    )
}

#[async_trait]
impl Destination for WordPressDestination {
    fn id(&self) -> &str {
        &self.id
    }

    #[instrument(level = "info", skip_all, fields(destination = %self.id))]
    async fn publish(&self, post: &PostRequest) -> Result<(), PublishError> {
        let Some(creds) = &self.credentials else {
            return Err(PublishError::MissingCredentials(self.id.clone()));
        };
        let body = WordPressPost {
            title: &post.title,
            content: render_content(post, self.brief_len),
            status: "publish",
        };
        let resp = self
            .client
            .post(self.posts_url.clone())
            .basic_auth(&creds.username, Some(&creds.app_password))
            .json(&body)
            .send()
            .await?;
        match resp.status() {
            StatusCode::CREATED => Ok(()),
            status => Err(PublishError::Rejected {
                destination: self.id.clone(),
                status: status.as_u16(),
            }),
        }
    }
}

/// Where an item goes: its primary destination and, when different, the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePlan {
    pub primary: String,
    pub mirror: Option<String>,
}

#[derive(Debug)]
pub struct DeliveryAttempt {
    pub destination: String,
    pub outcome: Result<(), PublishError>,
}

/// Per-destination results for one item, in attempt order.
#[derive(Debug, Default)]
pub struct DeliveryReport {
    pub attempts: Vec<DeliveryAttempt>,
}

impl DeliveryReport {
    /// Destination ids that accepted the item.
    pub fn delivered(&self) -> Vec<String> {
        self.attempts
            .iter()
            .filter(|a| a.outcome.is_ok())
            .map(|a| a.destination.clone())
            .collect()
    }

    pub fn attempted(&self) -> Vec<&str> {
        self.attempts.iter().map(|a| a.destination.as_str()).collect()
    }
}

pub struct Router {
    destinations: HashMap<String, Box<dyn Destination>>,
    localities: BTreeMap<String, String>,
    hub: String,
    delay_ms: u64,
    jitter_ms: u64,
    concurrency: usize,
}

impl Router {
    pub fn new(destinations: Vec<Box<dyn Destination>>, config: &DistributionConfig) -> Self {
        Self {
            destinations: destinations
                .into_iter()
                .map(|d| (d.id().to_string(), d))
                .collect(),
            localities: config.localities.clone(),
            hub: config.hub.clone(),
            delay_ms: config.publish_delay_ms,
            jitter_ms: config.jitter_ms,
            concurrency: config.concurrency.max(1),
        }
    }

    /// One WordPress destination per configured endpoint.
    pub fn from_config(
        config: &DistributionConfig,
        credentials: Option<Credentials>,
        client: &Client,
    ) -> Result<Self, ConfigError> {
        let destinations = config
            .destinations
            .iter()
            .map(|d| -> Result<Box<dyn Destination>, ConfigError> {
                Ok(Box::new(WordPressDestination::new(
                    &d.id,
                    &d.endpoint,
                    credentials.clone(),
                    config.brief_len,
                    client.clone(),
                )?))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(destinations, config))
    }

    pub fn plan(&self, item: &AdmittedItem) -> RoutePlan {
        let primary = if item.localities().is_sentinel() {
            self.hub.clone()
        } else {
            self.localities
                .get(item.localities().primary())
                .cloned()
                .unwrap_or_else(|| self.hub.clone())
        };
        let mirror = (primary != self.hub).then(|| self.hub.clone());
        RoutePlan { primary, mirror }
    }

    async fn send(&self, destination: &str, post: &PostRequest) -> Result<(), PublishError> {
        let Some(dest) = self.destinations.get(destination) else {
            return Err(PublishError::UnknownDestination(destination.to_string()));
        };
        polite_delay(self.delay_ms, self.jitter_ms).await;
        dest.publish(post).await
    }

    /// Deliver one item: primary first, then the hub if the primary accepted.
    #[instrument(level = "info", skip_all, fields(key = %item.key))]
    pub async fn route(&self, item: &AdmittedItem) -> DeliveryReport {
        let plan = self.plan(item);
        let post = PostRequest::from(item);
        let mut report = DeliveryReport::default();

        let primary = self.send(&plan.primary, &post).await;
        match &primary {
            Ok(()) => info!(destination = %plan.primary, "Published"),
            Err(e) => warn!(destination = %plan.primary, error = %e, "Publish failed; not mirroring"),
        }
        let primary_ok = primary.is_ok();
        report.attempts.push(DeliveryAttempt {
            destination: plan.primary,
            outcome: primary,
        });

        if let (true, Some(hub)) = (primary_ok, plan.mirror) {
            let mirrored = self.send(&hub, &post).await;
            match &mirrored {
                Ok(()) => info!(destination = %hub, "Mirrored to hub"),
                Err(e) => warn!(destination = %hub, error = %e, "Hub mirror failed"),
            }
            report.attempts.push(DeliveryAttempt {
                destination: hub,
                outcome: mirrored,
            });
        }
        report
    }

    /// Route every item and record the delivered ones in `history`.
    ///
    /// Items are routed with bounded concurrency; history is appended here,
    /// afterwards, in admission order, by this single writer. Returns the
    /// items that reached at least one destination.
    #[instrument(level = "info", skip_all, fields(items = items.len()))]
    pub async fn distribute(
        &self,
        items: Vec<AdmittedItem>,
        history: &mut HistoryStore,
    ) -> Vec<AdmittedItem> {
        let reports: Vec<DeliveryReport> = stream::iter(items.iter())
            .map(|item| self.route(item))
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut delivered = Vec::new();
        let mut unrecorded = 0usize;
        for (mut item, report) in items.into_iter().zip(reports) {
            let accepted = report.delivered();
            if accepted.is_empty() {
                warn!(key = %item.key, attempted = ?report.attempted(), "No destination accepted item; will retry next run");
                unrecorded += 1;
                continue;
            }
            history.record(item.key.clone());
            item.delivered_to = accepted;
            delivered.push(item);
        }

        info!(delivered = delivered.len(), unrecorded, "Distribution complete");
        delivered
    }
}
