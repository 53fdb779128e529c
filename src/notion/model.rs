use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Deserialize, Debug, Clone)]
pub struct DatabaseProperty {
    pub id: String,
    #[serde(rename = "type")]
    pub typ: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct RetrieveDatabaseResp {
    pub id: String,
    #[serde(default)]
    pub title: Vec<Value>,
    pub properties: HashMap<String, DatabaseProperty>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct PageRef {
    pub id: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct QueryDatabaseResp {
    #[serde(default)]
    pub results: Vec<PageRef>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BlockRef {
    pub id: String,
    #[serde(rename = "type", default)]
    pub typ: String,
}

impl BlockRef {
    /// Sub-pages and inline databases live as children too; they are never
    /// removed when page content is replaced.
    pub fn is_deletable(&self) -> bool {
        !matches!(self.typ.as_str(), "child_page" | "child_database")
    }
}

/// One page of `GET /v1/blocks/{id}/children`.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct BlockChildrenResp {
    #[serde(default)]
    pub results: Vec<BlockRef>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct CreatePageResponse {
    pub id: String,
}
