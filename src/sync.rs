//! One synchronization run: every feed, every entry, in order.
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

use crate::blocks;
use crate::config::Config;
use crate::extract::Extractor;
use crate::feed::FeedSource;
use crate::model::{FeedCounts, FeedEntry};
use crate::notion::NotionService;
use crate::properties::PropertyMapper;
use crate::retry::RetryPolicy;
use crate::schema::SchemaCache;
use crate::upsert::{Reconciler, UpsertOutcome};

/// Totals for a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub feeds_ok: usize,
    pub feeds_failed: usize,
    pub totals: FeedCounts,
}

impl RunSummary {
    pub fn upserted(&self) -> usize {
        self.totals.upserted()
    }

    fn add(&mut self, counts: FeedCounts) {
        self.feeds_ok += 1;
        self.totals.new += counts.new;
        self.totals.updated += counts.updated;
        self.totals.skipped += counts.skipped;
        self.totals.failed += counts.failed;
    }
}

pub struct Syncer {
    notion: Arc<dyn NotionService>,
    feeds: Arc<dyn FeedSource>,
    extractor: Extractor,
    reconciler: Reconciler,
    mapper: PropertyMapper,
    schema: SchemaCache,
    database_id: String,
    policy: RetryPolicy,
    max_items_per_feed: usize,
    allow_updates: bool,
}

impl Syncer {
    pub fn new(
        cfg: &Config,
        notion: Arc<dyn NotionService>,
        feeds: Arc<dyn FeedSource>,
        extractor: Extractor,
    ) -> Self {
        let reconciler = Reconciler::new(
            notion.clone(),
            cfg.notion.database_id.clone(),
            cfg.notion.properties.url.clone(),
        );
        Self {
            notion,
            feeds,
            extractor,
            reconciler,
            mapper: PropertyMapper::new(
                cfg.notion.properties.clone(),
                cfg.sync.include_summary,
                cfg.sync.content_property.clone(),
            ),
            schema: SchemaCache::new(),
            database_id: cfg.notion.database_id.clone(),
            policy: RetryPolicy::default(),
            max_items_per_feed: cfg.feeds.max_items_per_feed,
            allow_updates: cfg.sync.allow_updates,
        }
    }

    /// Replace the retry policy used for every remote call.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self.reconciler = self.reconciler.with_retry_policy(policy);
        self
    }

    /// Pause after every page write; zero disables it.
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.reconciler = self.reconciler.with_write_delay(delay);
        self
    }

    /// Process every feed. A failing feed is logged and does not stop the
    /// others.
    pub async fn run(&mut self, feed_urls: &[String]) -> RunSummary {
        self.schema.reset();
        let mut summary = RunSummary::default();
        for url in feed_urls.iter().map(|u| u.trim()).filter(|u| !u.is_empty()) {
            match self.harvest_feed(url).await {
                Ok(counts) => summary.add(counts),
                Err(err) => {
                    summary.feeds_failed += 1;
                    error!(feed = url, error = %format!("{err:#}"), "feed failed");
                }
            }
        }
        info!(
            upserted = summary.upserted(),
            feeds_ok = summary.feeds_ok,
            feeds_failed = summary.feeds_failed,
            "[done] pages upserted: {}",
            summary.upserted()
        );
        summary
    }

    #[instrument(skip(self))]
    pub async fn harvest_feed(&mut self, url: &str) -> Result<FeedCounts> {
        let feed = self.feeds.fetch(url).await?;
        let mut counts = FeedCounts::default();

        for entry in feed.entries.iter().take(self.max_items_per_feed) {
            let Some(link) = entry.link() else {
                counts.skipped += 1;
                continue;
            };
            match self.sync_entry(entry, link, &feed.source_name).await {
                Ok(UpsertOutcome::Created) => counts.new += 1,
                Ok(UpsertOutcome::Updated) => counts.updated += 1,
                Ok(UpsertOutcome::Skipped) => counts.skipped += 1,
                Err(err) => {
                    counts.failed += 1;
                    warn!(link, error = %format!("{err:#}"), "entry failed");
                }
            }
        }

        info!(
            "[{}] new={} updated={} skipped={} failed={}",
            feed.source_name, counts.new, counts.updated, counts.skipped, counts.failed
        );
        Ok(counts)
    }

    async fn sync_entry(
        &mut self,
        entry: &FeedEntry,
        link: &str,
        source_name: &str,
    ) -> Result<UpsertOutcome> {
        self.schema
            .get_or_fetch(self.notion.as_ref(), &self.database_id, &self.policy)
            .await
            .context("failed to load database schema")?;

        let markdown = self.extractor.extract_or_stub(entry).await;
        let blocks = blocks::compile(&markdown);
        let properties = self
            .mapper
            .build(entry, source_name, &markdown, &mut self.schema);
        self.reconciler
            .upsert(link, &properties, &blocks, self.allow_updates)
            .await
    }
}
