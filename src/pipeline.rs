//! The aggregation driver.
//!
//! A run pulls every source concurrently, then walks the batches one source
//! at a time, richest first, and pushes each candidate through
//! normalize → classify → identify → dedup. Candidates that survive become
//! [`AdmittedItem`]s, ready for the router.
//!
//! ```text
//! Fetched → Normalized → Classified{Rejected | Accepted}
//!         → DuplicateChecked{Duplicate | Novel} → admitted
//! ```
//!
//! Nothing a single candidate does can stop the rest of its batch, and a
//! source that fails or times out only loses its own batch.

use crate::classify::{Classifier, Rejection, Verdict};
use crate::config::IdentityConfig;
use crate::dedup::{DedupEngine, SeenStore, identify_item};
use crate::error::SourceError;
use crate::models::{AdmittedItem, ClassifiedItem, IdentityKey, RawItem};
use crate::normalize::Normalizer;
use crate::sources::SourceAdapter;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use itertools::Itertools;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

/// What happened to one candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// No usable title or link.
    Malformed,
    Rejected(Rejection),
    Duplicate(IdentityKey),
    Admitted(Box<AdmittedItem>),
}

/// Per-source counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub source: String,
    pub unavailable: bool,
    pub fetched: usize,
    pub malformed: usize,
    pub rejected: usize,
    pub duplicates: usize,
    pub admitted: usize,
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub admitted: Vec<AdmittedItem>,
    /// One entry per source, in processing order.
    pub stats: Vec<SourceStats>,
}

pub struct Aggregator<'a> {
    normalizer: &'a Normalizer,
    classifier: &'a Classifier,
    identity: &'a IdentityConfig,
    source_timeout: Duration,
}

impl<'a> Aggregator<'a> {
    pub fn new(
        normalizer: &'a Normalizer,
        classifier: &'a Classifier,
        identity: &'a IdentityConfig,
        source_timeout: Duration,
    ) -> Self {
        Self {
            normalizer,
            classifier,
            identity,
            source_timeout,
        }
    }

    /// Run every adapter and return the admitted set.
    ///
    /// `history` holds the keys of stories distributed in earlier runs.
    #[instrument(level = "info", skip_all, fields(sources = adapters.len()))]
    pub async fn run<H: SeenStore>(
        &self,
        adapters: &[Box<dyn SourceAdapter>],
        history: H,
    ) -> RunReport {
        let batches = join_all(adapters.iter().map(|a| self.fetch_source(a.as_ref()))).await;
        let now = Utc::now();

        let mut dedup = DedupEngine::new(history);
        let mut report = RunReport::default();

        // Stable sort: richer sources first, configuration order within a tier.
        for (adapter, batch) in adapters
            .iter()
            .zip(batches)
            .sorted_by_key(|(adapter, _)| adapter.richness())
        {
            let stats = match batch {
                Ok(items) => self.process_batch(
                    adapter.name(),
                    items,
                    adapter.max_items(),
                    &mut dedup,
                    now,
                    &mut report.admitted,
                ),
                Err(e) => {
                    warn!(source = %adapter.name(), error = %e, "Source unavailable; skipping for this run");
                    SourceStats {
                        source: adapter.name().to_string(),
                        unavailable: true,
                        ..SourceStats::default()
                    }
                }
            };
            report.stats.push(stats);
        }

        info!(admitted = dedup.admitted_this_run(), "Aggregation complete");
        report
    }

    /// Adapters are expected to stop at their budget and hand back a partial
    /// batch. The outer limit only catches an adapter that ignores it.
    async fn fetch_source(&self, adapter: &dyn SourceAdapter) -> Result<Vec<RawItem>, SourceError> {
        let hard_limit = self.source_timeout + self.source_timeout / 4;
        match timeout(hard_limit, adapter.fetch(self.source_timeout)).await {
            Ok(result) => result,
            Err(_) => Err(SourceError::Timeout {
                source_name: adapter.name().to_string(),
                secs: self.source_timeout.as_secs(),
            }),
        }
    }

    /// Push one source's batch through the admission steps.
    pub fn process_batch<H: SeenStore>(
        &self,
        source: &str,
        batch: Vec<RawItem>,
        cap: usize,
        dedup: &mut DedupEngine<H>,
        now: DateTime<Utc>,
        admitted: &mut Vec<AdmittedItem>,
    ) -> SourceStats {
        let mut stats = SourceStats {
            source: source.to_string(),
            ..SourceStats::default()
        };

        for raw in batch.into_iter().take(cap) {
            stats.fetched += 1;
            match self.process_candidate(&raw, dedup, now) {
                Outcome::Malformed => {
                    debug!(source, link = %raw.source_link, "Dropping malformed candidate");
                    stats.malformed += 1;
                }
                Outcome::Rejected(reason) => {
                    debug!(source, title = %raw.title, %reason, "Rejected by policy");
                    stats.rejected += 1;
                }
                Outcome::Duplicate(key) => {
                    debug!(source, %key, "Skipping duplicate");
                    stats.duplicates += 1;
                }
                Outcome::Admitted(item) => {
                    debug!(
                        source,
                        key = %item.key,
                        category = %item.category(),
                        localities = ?item.localities().as_slice(),
                        "Admitted"
                    );
                    stats.admitted += 1;
                    admitted.push(*item);
                }
            }
        }

        info!(
            source,
            fetched = stats.fetched,
            admitted = stats.admitted,
            duplicates = stats.duplicates,
            rejected = stats.rejected,
            malformed = stats.malformed,
            "Processed source batch"
        );
        stats
    }

    pub fn process_candidate<H: SeenStore>(
        &self,
        raw: &RawItem,
        dedup: &mut DedupEngine<H>,
        now: DateTime<Utc>,
    ) -> Outcome {
        let item = self.normalizer.normalize_item(raw);
        if item.title.is_empty() || item.source_link.is_empty() {
            return Outcome::Malformed;
        }

        let (category, localities) = match self.classifier.classify(&item.combined_text()) {
            Verdict::Rejected(reason) => return Outcome::Rejected(reason),
            Verdict::Accepted {
                category,
                localities,
            } => (category, localities),
        };

        let classified = ClassifiedItem {
            item,
            category,
            localities,
        };
        let key = identify_item(&classified, self.identity);
        if key.is_empty() {
            return Outcome::Malformed;
        }
        if !dedup.admit(&key) {
            return Outcome::Duplicate(key);
        }

        Outcome::Admitted(Box::new(AdmittedItem {
            key,
            classified,
            delivered_to: Vec::new(),
            admitted_at: now,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::history::HistoryStore;
    use crate::models::Category;
    use crate::sources::Richness;
    use async_trait::async_trait;
    use std::collections::HashSet;

    struct FakeSource {
        name: String,
        richness: Richness,
        items: Vec<RawItem>,
        fail: bool,
        stall: bool,
    }

    impl FakeSource {
        fn new(name: &str, richness: Richness, items: Vec<RawItem>) -> Self {
            Self {
                name: name.to_string(),
                richness,
                items,
                fail: false,
                stall: false,
            }
        }
    }

    #[async_trait]
    impl SourceAdapter for FakeSource {
        fn name(&self) -> &str {
            &self.name
        }

        fn richness(&self) -> Richness {
            self.richness
        }

        fn max_items(&self) -> usize {
            20
        }

        async fn fetch(&self, _budget: Duration) -> Result<Vec<RawItem>, SourceError> {
            if self.stall {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            if self.fail {
                return Err(SourceError::Parse("broken feed".to_string()));
            }
            Ok(self.items.clone())
        }
    }

    fn raw(source: &str, title: &str, body: &str, link: &str) -> RawItem {
        RawItem {
            source: source.to_string(),
            title: title.to_string(),
            body_text: body.to_string(),
            source_link: link.to_string(),
            published_at: None,
        }
    }

    struct Fixture {
        config: AppConfig,
        normalizer: Normalizer,
        classifier: Classifier,
    }

    impl Fixture {
        fn new() -> Self {
            let config = AppConfig::default();
            Self {
                normalizer: Normalizer::new(&config.noise_patterns).unwrap(),
                classifier: Classifier::from_config(&config).unwrap(),
                config,
            }
        }

        fn aggregator(&self) -> Aggregator<'_> {
            Aggregator::new(
                &self.normalizer,
                &self.classifier,
                &self.config.identity,
                Duration::from_millis(200),
            )
        }
    }

    fn boxed(sources: Vec<FakeSource>) -> Vec<Box<dyn SourceAdapter>> {
        sources
            .into_iter()
            .map(|s| Box::new(s) as Box<dyn SourceAdapter>)
            .collect()
    }

    #[tokio::test]
    async fn test_full_article_source_wins_over_teaser() {
        let fx = Fixture::new();
        // The teaser source is listed first but must be processed second.
        let adapters = boxed(vec![
            FakeSource::new(
                "search",
                Richness::Teaser,
                vec![raw("search", "Crews battle structure fire", "Latest community update from Xenia.", "https://s/1")],
            ),
            FakeSource::new(
                "feed",
                Richness::FullArticle,
                vec![raw(
                    "feed",
                    "Crews battle structure fire!",
                    "<p>The structure fire near Xenia started Monday.</p>",
                    "https://f/1",
                )],
            ),
        ]);

        let report = fx.aggregator().run(&adapters, HashSet::<IdentityKey>::new()).await;
        assert_eq!(report.admitted.len(), 1);
        let item = &report.admitted[0];
        assert_eq!(item.classified.item.source, "feed");
        assert_eq!(item.category(), Category::FireRescue);
        assert_eq!(item.localities().as_slice(), &["Xenia".to_string()]);

        assert_eq!(report.stats[0].source, "feed");
        assert_eq!(report.stats[1].source, "search");
        assert_eq!(report.stats[1].duplicates, 1);
    }

    #[tokio::test]
    async fn test_identical_titles_admitted_once() {
        let fx = Fixture::new();
        let adapters = boxed(vec![FakeSource::new(
            "feed",
            Richness::FullArticle,
            vec![
                raw("feed", "Flora council meets", "a", "https://f/1"),
                raw("feed", "WNOI Flora Council Meets", "b", "https://f/2"),
                raw("feed", "Flora council meets.", "c", "https://f/3"),
            ],
        )]);
        let report = fx.aggregator().run(&adapters, HashSet::<IdentityKey>::new()).await;
        assert_eq!(report.admitted.len(), 1);
        assert_eq!(report.stats[0].duplicates, 2);
        let keys: HashSet<_> = report.admitted.iter().map(|a| a.key.clone()).collect();
        assert_eq!(keys.len(), report.admitted.len());
    }

    #[tokio::test]
    async fn test_blacklisted_never_admitted() {
        let fx = Fixture::new();
        let adapters = boxed(vec![FakeSource::new(
            "feed",
            Richness::FullArticle,
            vec![raw(
                "feed",
                "House fire in Flora",
                "Firefighters from Cisne responded to the house fire.",
                "https://f/1",
            )],
        )]);
        let report = fx.aggregator().run(&adapters, HashSet::<IdentityKey>::new()).await;
        assert!(report.admitted.is_empty());
        assert_eq!(report.stats[0].rejected, 1);
    }

    #[tokio::test]
    async fn test_malformed_candidates_dropped() {
        let fx = Fixture::new();
        let adapters = boxed(vec![FakeSource::new(
            "feed",
            Richness::FullArticle,
            vec![
                raw("feed", "<b></b>", "body", "https://f/1"),
                raw("feed", "Good title", "body", ""),
                raw("feed", "!!!", "body", "https://f/3"),
                raw("feed", "Usable story", "Flora body", "https://f/4"),
            ],
        )]);
        let report = fx.aggregator().run(&adapters, HashSet::<IdentityKey>::new()).await;
        assert_eq!(report.admitted.len(), 1);
        assert_eq!(report.stats[0].malformed, 3);
    }

    #[tokio::test]
    async fn test_failed_and_stalled_sources_are_skipped() {
        let fx = Fixture::new();
        let mut broken = FakeSource::new("broken", Richness::FullArticle, vec![]);
        broken.fail = true;
        let mut stalled = FakeSource::new(
            "stalled",
            Richness::FullArticle,
            vec![raw("stalled", "Never seen", "x", "https://x/1")],
        );
        stalled.stall = true;
        let healthy = FakeSource::new(
            "healthy",
            Richness::Teaser,
            vec![raw("healthy", "Xenia library hours", "x", "https://h/1")],
        );

        let adapters = boxed(vec![broken, stalled, healthy]);
        let report = fx.aggregator().run(&adapters, HashSet::<IdentityKey>::new()).await;
        assert_eq!(report.admitted.len(), 1);
        assert_eq!(report.admitted[0].title(), "Xenia library hours");
        assert!(report.stats[0].unavailable);
        assert!(report.stats[1].unavailable);
        assert!(!report.stats[2].unavailable);
    }

    #[tokio::test]
    async fn test_empty_source_is_not_an_error() {
        let fx = Fixture::new();
        let adapters = boxed(vec![FakeSource::new("quiet", Richness::Teaser, vec![])]);
        let report = fx.aggregator().run(&adapters, HashSet::<IdentityKey>::new()).await;
        assert!(report.admitted.is_empty());
        assert!(!report.stats[0].unavailable);
        assert_eq!(report.stats[0].fetched, 0);
    }

    #[test]
    fn test_batch_cap() {
        let fx = Fixture::new();
        let batch: Vec<RawItem> = (0..10)
            .map(|i| raw("feed", &format!("Story number {i}"), "Clay County", &format!("https://f/{i}")))
            .collect();
        let mut dedup = DedupEngine::new(HashSet::<IdentityKey>::new());
        let mut admitted = Vec::new();
        let stats = fx
            .aggregator()
            .process_batch("feed", batch, 4, &mut dedup, Utc::now(), &mut admitted);
        assert_eq!(stats.fetched, 4);
        assert_eq!(admitted.len(), 4);
    }

    #[tokio::test]
    async fn test_second_run_suppresses_recorded_story() {
        let fx = Fixture::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let story = || {
            boxed(vec![FakeSource::new(
                "feed",
                Richness::FullArticle,
                vec![raw("feed", "Xenia water main break", "Crews repaired it.", "https://f/x")],
            )])
        };

        let mut history = HistoryStore::load(&path, 500).await;
        let first = fx.aggregator().run(&story(), history.view()).await;
        assert_eq!(first.admitted.len(), 1);
        history.record(first.admitted[0].key.clone());
        history.save().await.unwrap();

        let history = HistoryStore::load(&path, 500).await;
        let second = fx.aggregator().run(&story(), history.view()).await;
        assert!(second.admitted.is_empty());
        assert_eq!(second.stats[0].duplicates, 1);
    }
}
