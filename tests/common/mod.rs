#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use notion_rss_sync::config::{self, Config};
use notion_rss_sync::extract::{ArticleFetcher, Extractor};
use notion_rss_sync::feed::FeedSource;
use notion_rss_sync::model::{ContentFragment, FeedEntry, ParsedFeed};
use notion_rss_sync::notion::model::{
    BlockChildrenResp, BlockRef, DatabaseProperty, RetrieveDatabaseResp,
};
use notion_rss_sync::notion::NotionService;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    RetrieveDatabase,
    Query(String),
    Create { url: String, inline: usize },
    Update(String),
    List { page_id: String, cursor: Option<String> },
    Delete(String),
    Append { page_id: String, count: usize },
}

#[derive(Debug, Clone)]
pub struct FakePage {
    pub id: String,
    pub url: String,
    pub properties: Map<String, Value>,
    pub children: Vec<BlockRef>,
}

#[derive(Default)]
struct State {
    schema: Vec<(String, String)>,
    pages: Vec<FakePage>,
    calls: Vec<Call>,
    failures: HashMap<&'static str, usize>,
    next_id: usize,
}

/// In-memory Notion database keyed by the `URL` property.
#[derive(Clone)]
pub struct FakeNotion {
    state: Arc<Mutex<State>>,
    list_page_size: usize,
}

impl FakeNotion {
    pub fn new() -> Self {
        Self::with_schema(&[
            ("Title", "title"),
            ("URL", "url"),
            ("Published", "date"),
            ("Source", "select"),
            ("Author", "rich_text"),
            ("Tags", "multi_select"),
        ])
    }

    pub fn with_schema(props: &[(&str, &str)]) -> Self {
        let state = State {
            schema: props
                .iter()
                .map(|(n, t)| (n.to_string(), t.to_string()))
                .collect(),
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            list_page_size: 2,
        }
    }

    /// Make the next `times` calls of `op` fail.
    pub async fn fail(&self, op: &'static str, times: usize) {
        self.state.lock().await.failures.insert(op, times);
    }

    pub async fn calls(&self) -> Vec<Call> {
        self.state.lock().await.calls.clone()
    }

    pub async fn clear_calls(&self) {
        self.state.lock().await.calls.clear();
    }

    pub async fn pages(&self) -> Vec<FakePage> {
        self.state.lock().await.pages.clone()
    }

    pub async fn add_child(&self, page_id: &str, typ: &str) -> String {
        let mut state = self.state.lock().await;
        state.next_id += 1;
        let id = format!("block-{}", state.next_id);
        if let Some(page) = state.pages.iter_mut().find(|p| p.id == page_id) {
            page.children.push(BlockRef {
                id: id.clone(),
                typ: typ.to_string(),
            });
        }
        id
    }

    async fn enter(&self, op: &'static str, call: Call) -> Result<()> {
        let mut state = self.state.lock().await;
        state.calls.push(call);
        if let Some(left) = state.failures.get_mut(op) {
            if *left > 0 {
                *left -= 1;
                return Err(anyhow!("{op}: simulated 503"));
            }
        }
        Ok(())
    }
}

fn block_refs(state: &mut State, children: &[Value]) -> Vec<BlockRef> {
    children
        .iter()
        .map(|c| {
            state.next_id += 1;
            BlockRef {
                id: format!("block-{}", state.next_id),
                typ: c["type"].as_str().unwrap_or_default().to_string(),
            }
        })
        .collect()
}

#[async_trait]
impl NotionService for FakeNotion {
    async fn retrieve_database(&self, database_id: &str) -> Result<RetrieveDatabaseResp> {
        self.enter("retrieve_database", Call::RetrieveDatabase).await?;
        let state = self.state.lock().await;
        Ok(RetrieveDatabaseResp {
            id: database_id.to_string(),
            title: Vec::new(),
            properties: state
                .schema
                .iter()
                .map(|(name, typ)| {
                    (
                        name.clone(),
                        DatabaseProperty {
                            id: name.to_lowercase(),
                            typ: typ.clone(),
                        },
                    )
                })
                .collect(),
        })
    }

    async fn query_page_by_url(
        &self,
        _database_id: &str,
        _url_property: &str,
        url: &str,
    ) -> Result<Option<String>> {
        self.enter("query", Call::Query(url.to_string())).await?;
        let state = self.state.lock().await;
        Ok(state.pages.iter().find(|p| p.url == url).map(|p| p.id.clone()))
    }

    async fn create_page(
        &self,
        _database_id: &str,
        properties: &Map<String, Value>,
        children: &[Value],
    ) -> Result<String> {
        let url = properties["URL"]["url"].as_str().unwrap_or_default().to_string();
        self.enter(
            "create_page",
            Call::Create {
                url: url.clone(),
                inline: children.len(),
            },
        )
        .await?;
        let mut state = self.state.lock().await;
        state.next_id += 1;
        let id = format!("page-{}", state.next_id);
        let children = block_refs(&mut state, children);
        state.pages.push(FakePage {
            id: id.clone(),
            url,
            properties: properties.clone(),
            children,
        });
        Ok(id)
    }

    async fn update_page(&self, page_id: &str, properties: &Map<String, Value>) -> Result<()> {
        self.enter("update_page", Call::Update(page_id.to_string())).await?;
        let mut state = self.state.lock().await;
        let page = state
            .pages
            .iter_mut()
            .find(|p| p.id == page_id)
            .ok_or_else(|| anyhow!("no page {page_id}"))?;
        page.properties = properties.clone();
        Ok(())
    }

    async fn list_block_children(
        &self,
        block_id: &str,
        start_cursor: Option<&str>,
    ) -> Result<BlockChildrenResp> {
        self.enter(
            "list_block_children",
            Call::List {
                page_id: block_id.to_string(),
                cursor: start_cursor.map(str::to_string),
            },
        )
        .await?;
        let state = self.state.lock().await;
        let page = state
            .pages
            .iter()
            .find(|p| p.id == block_id)
            .ok_or_else(|| anyhow!("no page {block_id}"))?;
        let start: usize = start_cursor.map(|c| c.parse::<usize>()).transpose()?.unwrap_or(0);
        let end = (start + self.list_page_size).min(page.children.len());
        let has_more = end < page.children.len();
        Ok(BlockChildrenResp {
            results: page.children[start..end].to_vec(),
            has_more,
            next_cursor: has_more.then(|| end.to_string()),
        })
    }

    async fn delete_block(&self, block_id: &str) -> Result<()> {
        self.enter("delete_block", Call::Delete(block_id.to_string())).await?;
        let mut state = self.state.lock().await;
        for page in state.pages.iter_mut() {
            page.children.retain(|b| b.id != block_id);
        }
        Ok(())
    }

    async fn append_block_children(&self, block_id: &str, children: &[Value]) -> Result<()> {
        self.enter(
            "append_block_children",
            Call::Append {
                page_id: block_id.to_string(),
                count: children.len(),
            },
        )
        .await?;
        let mut state = self.state.lock().await;
        let refs = block_refs(&mut state, children);
        let page = state
            .pages
            .iter_mut()
            .find(|p| p.id == block_id)
            .ok_or_else(|| anyhow!("no page {block_id}"))?;
        page.children.extend(refs);
        Ok(())
    }
}

/// Feeds served from memory; unknown URLs fail like a network error.
#[derive(Clone, Default)]
pub struct StaticFeeds {
    feeds: Arc<Mutex<HashMap<String, ParsedFeed>>>,
}

impl StaticFeeds {
    pub async fn insert(&self, url: &str, feed: ParsedFeed) {
        self.feeds.lock().await.insert(url.to_string(), feed);
    }
}

#[async_trait]
impl FeedSource for StaticFeeds {
    async fn fetch(&self, url: &str) -> Result<ParsedFeed> {
        self.feeds
            .lock()
            .await
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("connection refused: {url}"))
    }
}

/// Article fetcher returning canned pages and recording requested URLs.
#[derive(Clone, Default)]
pub struct CannedFetcher {
    pages: Arc<Mutex<HashMap<String, String>>>,
    pub requested: Arc<Mutex<Vec<String>>>,
}

impl CannedFetcher {
    pub async fn insert(&self, url: &str, html: &str) {
        self.pages
            .lock()
            .await
            .insert(url.to_string(), html.to_string());
    }

    pub async fn requested(&self) -> Vec<String> {
        self.requested.lock().await.clone()
    }
}

#[async_trait]
impl ArticleFetcher for CannedFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.requested.lock().await.push(url.to_string());
        self.pages
            .lock()
            .await
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("404 for {url}"))
    }
}

pub fn test_config(overrides: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = [
        ("NOTION_API_KEY", "secret"),
        ("NOTION_DATABASE_ID", "db-1"),
        ("RSS_FEEDS", "https://feeds.example/a"),
        ("FETCH_FULL_CONTENT", "false"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (k, v) in overrides {
        vars.insert(k.to_string(), v.to_string());
    }
    config::from_lookup(|name| vars.get(name).cloned()).unwrap()
}

pub fn no_fetch_extractor() -> Extractor {
    Extractor::new(Arc::new(CannedFetcher::default()), false)
}

pub fn entry(link: &str, title: &str, html: &str) -> FeedEntry {
    FeedEntry {
        link: Some(link.to_string()),
        title: Some(title.to_string()),
        published: Some("2024-01-02T10:00:00+00:00".to_string()),
        content: if html.is_empty() {
            Vec::new()
        } else {
            vec![ContentFragment {
                content_type: Some("text/html".to_string()),
                value: html.to_string(),
            }]
        },
        ..Default::default()
    }
}

pub fn feed(source: &str, entries: Vec<FeedEntry>) -> ParsedFeed {
    ParsedFeed {
        source_name: source.to_string(),
        entries,
    }
}
