//! Feed retrieval and normalization into [`FeedEntry`] values.
use anyhow::{Context, Result};
use async_trait::async_trait;
use feed_rs::model::{Entry, Feed};
use feed_rs::parser;
use reqwest::Client;
use std::time::Duration;
use tracing::{info, warn};

use crate::model::{ContentFragment, FeedEntry, ParsedFeed, SummaryDetail, Tag};

const FALLBACK_SOURCE_NAME: &str = "RSS";

#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Download and parse `url`. Transport failures are errors; a document
    /// that does not parse yields an empty feed.
    async fn fetch(&self, url: &str) -> Result<ParsedFeed>;
}

#[derive(Debug, Clone)]
pub struct HttpFeedSource {
    http: Client,
}

impl HttpFeedSource {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .context("failed to build feed HTTP client")?;
        Ok(Self { http })
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self, url: &str) -> Result<ParsedFeed> {
        let bytes = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("failed to fetch feed {url}"))?
            .error_for_status()
            .with_context(|| format!("bad status fetching feed {url}"))?
            .bytes()
            .await
            .with_context(|| format!("failed to read feed body {url}"))?;
        let parsed = parse_feed(&bytes, url);
        info!(url, source = %parsed.source_name, entries = parsed.entries.len(), "parsed feed");
        Ok(parsed)
    }
}

/// Parse a feed document. Unparseable input is logged and treated as a feed
/// with no entries.
pub fn parse_feed(bytes: &[u8], url: &str) -> ParsedFeed {
    match parser::parse(bytes) {
        Ok(feed) => convert_feed(feed),
        Err(err) => {
            warn!(url, error = %err, "feed could not be parsed; treating as empty");
            ParsedFeed {
                source_name: FALLBACK_SOURCE_NAME.to_string(),
                entries: Vec::new(),
            }
        }
    }
}

fn convert_feed(feed: Feed) -> ParsedFeed {
    let source_name = feed
        .title
        .as_ref()
        .map(|t| t.content.trim().to_string())
        .filter(|t| !t.is_empty())
        .or_else(|| {
            feed.links
                .iter()
                .map(|l| l.href.trim())
                .find(|h| !h.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| FALLBACK_SOURCE_NAME.to_string());
    let entries = feed.entries.iter().map(convert_entry).collect();
    ParsedFeed {
        source_name,
        entries,
    }
}

fn convert_entry(entry: &Entry) -> FeedEntry {
    let (summary, summary_detail) = match entry.summary.as_ref() {
        Some(text) => (
            Some(text.content.clone()),
            Some(SummaryDetail {
                content_type: text.content_type.to_string(),
                value: text.content.clone(),
            }),
        ),
        None => (None, None),
    };
    let content = entry
        .content
        .as_ref()
        .and_then(|c| {
            c.body.as_ref().map(|body| ContentFragment {
                content_type: Some(c.content_type.to_string()),
                value: body.clone(),
            })
        })
        .into_iter()
        .collect();

    FeedEntry {
        link: select_entry_link(entry),
        title: entry.title.as_ref().map(|t| t.content.clone()),
        published: entry.published.map(|d| d.to_rfc3339()),
        updated: entry.updated.map(|d| d.to_rfc3339()),
        created: None,
        author: entry
            .authors
            .iter()
            .map(|p| p.name.trim())
            .find(|n| !n.is_empty())
            .map(str::to_string),
        summary,
        subtitle: None,
        tags: entry
            .categories
            .iter()
            .filter(|c| !c.term.trim().is_empty())
            .map(|c| Tag {
                term: c.term.clone(),
                label: c.label.clone(),
            })
            .collect(),
        content,
        summary_detail,
    }
}

/// The alternate link, any link, or an http(s) id, in that order.
fn select_entry_link(entry: &Entry) -> Option<String> {
    let alternate = entry.links.iter().find(|l| {
        let rel = l.rel.as_deref().unwrap_or("");
        !l.href.trim().is_empty() && (rel.is_empty() || rel.eq_ignore_ascii_case("alternate"))
    });
    if let Some(link) = alternate.or_else(|| entry.links.iter().find(|l| !l.href.trim().is_empty())) {
        return Some(link.href.trim().to_string());
    }
    let id = entry.id.trim();
    (id.starts_with("http://") || id.starts_with("https://")).then(|| id.to_string())
}
