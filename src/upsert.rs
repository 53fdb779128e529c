//! Idempotent page reconciliation keyed by the entry URL.
use anyhow::Result;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::blocks::DocumentBlock;
use crate::notion::model::BlockRef;
use crate::notion::NotionService;
use crate::properties::PageProperties;
use crate::retry::{self, RetryPolicy};

/// Most children Notion accepts in one append (and inline on create).
pub const APPEND_BATCH: usize = 50;

pub const DEFAULT_WRITE_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
    Skipped,
}

pub struct Reconciler {
    notion: Arc<dyn NotionService>,
    database_id: String,
    url_property: String,
    policy: RetryPolicy,
    write_delay: Duration,
}

impl Reconciler {
    pub fn new(notion: Arc<dyn NotionService>, database_id: String, url_property: String) -> Self {
        Self {
            notion,
            database_id,
            url_property,
            policy: RetryPolicy::default(),
            write_delay: DEFAULT_WRITE_DELAY,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Pause after every page create/replace.
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = delay;
        self
    }

    pub async fn find_by_url(&self, url: &str) -> Result<Option<String>> {
        retry::with_backoff(&self.policy, "query database", || {
            self.notion
                .query_page_by_url(&self.database_id, &self.url_property, url)
        })
        .await
    }

    /// Create a page; the first batch of blocks goes inline, the rest is
    /// appended afterwards.
    #[instrument(skip_all)]
    pub async fn create(&self, properties: &PageProperties, blocks: &[DocumentBlock]) -> Result<String> {
        let children = to_notion(blocks);
        let split = children.len().min(APPEND_BATCH);
        let (inline, rest) = children.split_at(split);
        let page_id = retry::with_backoff(&self.policy, "create page", || {
            self.notion
                .create_page(&self.database_id, properties.as_map(), inline)
        })
        .await?;
        self.append_batched(&page_id, rest).await?;
        info!(page_id = %page_id, blocks = children.len(), "created page");
        self.pause().await;
        Ok(page_id)
    }

    /// Overwrite properties and body of an existing page. Sub-pages and
    /// inline databases are left in place.
    #[instrument(skip_all, fields(page_id = %page_id))]
    pub async fn replace(
        &self,
        page_id: &str,
        properties: &PageProperties,
        blocks: &[DocumentBlock],
    ) -> Result<()> {
        retry::with_backoff(&self.policy, "update page", || {
            self.notion.update_page(page_id, properties.as_map())
        })
        .await?;

        let existing = self.list_children(page_id).await?;
        let mut removed = 0usize;
        for block in existing.iter().filter(|b| b.is_deletable()) {
            let deleted = retry::with_backoff(&self.policy, "delete block", || {
                self.notion.delete_block(&block.id)
            })
            .await;
            match deleted {
                Ok(()) => removed += 1,
                Err(err) => {
                    warn!(block_id = %block.id, error = %format!("{err:#}"), "failed to delete block; leaving it")
                }
            }
        }

        let children = to_notion(blocks);
        self.append_batched(page_id, &children).await?;
        info!(removed, appended = children.len(), "replaced page content");
        self.pause().await;
        Ok(())
    }

    /// Create, replace or skip depending on whether `link` already has a page.
    pub async fn upsert(
        &self,
        link: &str,
        properties: &PageProperties,
        blocks: &[DocumentBlock],
        allow_updates: bool,
    ) -> Result<UpsertOutcome> {
        match self.find_by_url(link).await? {
            None => {
                self.create(properties, blocks).await?;
                Ok(UpsertOutcome::Created)
            }
            Some(page_id) if allow_updates => {
                self.replace(&page_id, properties, blocks).await?;
                Ok(UpsertOutcome::Updated)
            }
            Some(page_id) => {
                debug!(link, page_id = %page_id, "page exists and updates are disabled");
                Ok(UpsertOutcome::Skipped)
            }
        }
    }

    async fn list_children(&self, page_id: &str) -> Result<Vec<BlockRef>> {
        let mut blocks = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = retry::with_backoff(&self.policy, "list block children", || {
                self.notion.list_block_children(page_id, cursor.as_deref())
            })
            .await?;
            blocks.extend(page.results);
            match page.next_cursor {
                Some(next) if page.has_more => cursor = Some(next),
                _ => break,
            }
        }
        Ok(blocks)
    }

    async fn append_batched(&self, page_id: &str, children: &[Value]) -> Result<()> {
        for batch in children.chunks(APPEND_BATCH) {
            retry::with_backoff(&self.policy, "append block children", || {
                self.notion.append_block_children(page_id, batch)
            })
            .await?;
        }
        Ok(())
    }

    async fn pause(&self) {
        if !self.write_delay.is_zero() {
            tokio::time::sleep(self.write_delay).await;
        }
    }
}

fn to_notion(blocks: &[DocumentBlock]) -> Vec<Value> {
    blocks.iter().map(DocumentBlock::to_notion).collect()
}
