use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

use crate::notion::model::{
    BlockChildrenResp, CreatePageResponse, QueryDatabaseResp, RetrieveDatabaseResp,
};

pub mod model;

const NOTION_API_BASE: &str = "https://api.notion.com/";

/// Largest page size the block-children listing accepts.
const LIST_PAGE_SIZE: u32 = 100;

#[derive(Clone)]
pub struct NotionClient {
    http: Client,
    base_url: Url,
    token: String,
    version: String,
}

impl fmt::Debug for NotionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotionClient")
            .field("base_url", &self.base_url)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// The subset of the Notion API the sync uses. Every method is a single
/// remote call; retries are layered on top by the caller.
#[async_trait]
pub trait NotionService: Send + Sync {
    async fn retrieve_database(&self, database_id: &str) -> Result<RetrieveDatabaseResp>;

    /// First page whose `url_property` equals `url`, if any.
    async fn query_page_by_url(
        &self,
        database_id: &str,
        url_property: &str,
        url: &str,
    ) -> Result<Option<String>>;

    async fn create_page(
        &self,
        database_id: &str,
        properties: &Map<String, Value>,
        children: &[Value],
    ) -> Result<String>;

    async fn update_page(&self, page_id: &str, properties: &Map<String, Value>) -> Result<()>;

    async fn list_block_children(
        &self,
        block_id: &str,
        start_cursor: Option<&str>,
    ) -> Result<BlockChildrenResp>;

    async fn delete_block(&self, block_id: &str) -> Result<()>;

    async fn append_block_children(&self, block_id: &str, children: &[Value]) -> Result<()>;
}

impl NotionClient {
    pub fn new(token: String, version: String) -> Result<Self> {
        let base_url = Url::parse(NOTION_API_BASE).context("invalid default Notion URL")?;
        Self::with_base_url(token, version, base_url)
    }

    pub fn with_base_url(token: String, version: String, base_url: Url) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("notion-rss-sync/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            .build()
            .context("failed to build Notion HTTP client")?;
        Ok(Self {
            http,
            base_url,
            token,
            version,
        })
    }

    pub fn build_request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Request> {
        let endpoint = self
            .base_url
            .join(path)
            .context("invalid Notion base URL")?;
        let mut builder = self
            .http
            .request(method, endpoint)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Notion-Version", &self.version);
        if let Some(body) = body {
            builder = builder
                .header("Content-Type", "application/json")
                .json(body);
        }
        builder.build().context("failed to build Notion request")
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T> {
        let request = self.build_request(method, path, body)?;
        debug!(method = %request.method(), url = %request.url(), payload = ?body, "sending notion request");

        let res = self
            .http
            .execute(request)
            .await
            .context("failed to reach Notion")?;

        let status = res.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let body = res.text().await.unwrap_or_default();
            warn!("Rate limited by Notion: {}", body);
            return Err(anyhow!("received 429 from Notion: {}", body));
        }
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("notion error {}: {}", status, body));
        }

        let text = res.text().await.context("failed to read Notion response")?;
        debug!(%status, bytes = text.len(), "notion response");
        serde_json::from_str(&text).context("invalid Notion response JSON")
    }
}

#[async_trait]
impl NotionService for NotionClient {
    async fn retrieve_database(&self, database_id: &str) -> Result<RetrieveDatabaseResp> {
        self.execute(Method::GET, &format!("v1/databases/{}", database_id), None)
            .await
            .context("notion retrieve database failed")
    }

    async fn query_page_by_url(
        &self,
        database_id: &str,
        url_property: &str,
        url: &str,
    ) -> Result<Option<String>> {
        let body = build_query_by_url_request(url_property, url);
        let resp: QueryDatabaseResp = self
            .execute(
                Method::POST,
                &format!("v1/databases/{}/query", database_id),
                Some(&body),
            )
            .await?;
        Ok(resp.results.into_iter().next().map(|p| p.id))
    }

    async fn create_page(
        &self,
        database_id: &str,
        properties: &Map<String, Value>,
        children: &[Value],
    ) -> Result<String> {
        let body = build_create_page_request(database_id, properties, children);
        let resp: CreatePageResponse = self.execute(Method::POST, "v1/pages", Some(&body)).await?;
        debug!(page_id = %resp.id, "created notion page");
        Ok(resp.id)
    }

    async fn update_page(&self, page_id: &str, properties: &Map<String, Value>) -> Result<()> {
        let body = build_update_page_request(properties);
        let _: Value = self
            .execute(Method::PATCH, &format!("v1/pages/{}", page_id), Some(&body))
            .await?;
        Ok(())
    }

    async fn list_block_children(
        &self,
        block_id: &str,
        start_cursor: Option<&str>,
    ) -> Result<BlockChildrenResp> {
        let mut path = format!("v1/blocks/{}/children?page_size={}", block_id, LIST_PAGE_SIZE);
        if let Some(cursor) = start_cursor {
            path.push_str("&start_cursor=");
            path.push_str(cursor);
        }
        self.execute(Method::GET, &path, None).await
    }

    async fn delete_block(&self, block_id: &str) -> Result<()> {
        let _: Value = self
            .execute(Method::DELETE, &format!("v1/blocks/{}", block_id), None)
            .await?;
        Ok(())
    }

    async fn append_block_children(&self, block_id: &str, children: &[Value]) -> Result<()> {
        let body = build_append_children_request(children);
        let _: Value = self
            .execute(
                Method::PATCH,
                &format!("v1/blocks/{}/children", block_id),
                Some(&body),
            )
            .await?;
        Ok(())
    }
}

pub fn build_query_by_url_request(url_property: &str, url: &str) -> Value {
    json!({
        "filter": {
            "property": url_property,
            "url": { "equals": url }
        },
        "page_size": 1,
    })
}

pub fn build_create_page_request(
    database_id: &str,
    properties: &Map<String, Value>,
    children: &[Value],
) -> Value {
    let mut body = json!({
        "parent": { "database_id": database_id },
        "properties": Value::Object(properties.clone()),
    });
    if !children.is_empty() {
        body["children"] = Value::Array(children.to_vec());
    }
    body
}

pub fn build_update_page_request(properties: &Map<String, Value>) -> Value {
    json!({ "properties": Value::Object(properties.clone()) })
}

pub fn build_append_children_request(children: &[Value]) -> Value {
    json!({ "children": children })
}
