//! Article body extraction with an ordered fallback chain.
//!
//! For each entry the extractor walks a fixed plan: the full article behind
//! `link` (fetched and run through readability), then every HTML fragment the
//! feed itself carried. The first step producing non-empty markdown wins.
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::markdown::html_to_markdown;
use crate::model::FeedEntry;
use crate::sanitize::clean_html;

/// Source of raw article HTML.
#[async_trait]
pub trait ArticleFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Plain HTTP GET with a user agent and a hard timeout.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    http: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .context("failed to build article HTTP client")?;
        Ok(Self { http })
    }
}

#[async_trait]
impl ArticleFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let res = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("failed to fetch {url}"))?
            .error_for_status()
            .with_context(|| format!("bad status fetching {url}"))?;
        let body = res
            .text()
            .await
            .with_context(|| format!("failed to read body of {url}"))?;
        info!(url, chars = body.len(), "fetched article");
        Ok(body)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentOrigin {
    Content,
    SummaryDetail,
    Summary,
}

/// One candidate source of article markdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionStep<'a> {
    FullArticle { url: &'a str },
    FeedHtml { origin: FragmentOrigin, html: &'a str },
}

/// The ordered candidates for `entry`.
pub fn plan(entry: &FeedEntry, fetch_full_content: bool) -> Vec<ExtractionStep<'_>> {
    let mut steps = Vec::new();
    if fetch_full_content {
        if let Some(url) = entry.link() {
            steps.push(ExtractionStep::FullArticle { url });
        }
    }
    steps.extend(
        entry
            .content
            .iter()
            .filter(|c| !c.value.trim().is_empty())
            .map(|c| ExtractionStep::FeedHtml {
                origin: FragmentOrigin::Content,
                html: &c.value,
            }),
    );
    if let Some(detail) = entry
        .summary_detail
        .as_ref()
        .filter(|d| d.is_html() && !d.value.trim().is_empty())
    {
        steps.push(ExtractionStep::FeedHtml {
            origin: FragmentOrigin::SummaryDetail,
            html: &detail.value,
        });
    }
    if let Some(summary) = entry.summary.as_deref().filter(|s| !s.trim().is_empty()) {
        steps.push(ExtractionStep::FeedHtml {
            origin: FragmentOrigin::Summary,
            html: summary,
        });
    }
    steps
}

/// Markdown used when no step produced anything.
pub fn stub_markdown(entry: &FeedEntry) -> String {
    format!(
        "# {}\n\n[Read full article]({})",
        entry.display_title(),
        entry.link().unwrap_or_default()
    )
}

#[derive(Clone)]
pub struct Extractor {
    fetcher: Arc<dyn ArticleFetcher>,
    fetch_full_content: bool,
}

impl Extractor {
    pub fn new(fetcher: Arc<dyn ArticleFetcher>, fetch_full_content: bool) -> Self {
        Self {
            fetcher,
            fetch_full_content,
        }
    }

    /// Markdown for `entry`, or `None` when every step came up empty.
    pub async fn extract(&self, entry: &FeedEntry) -> Option<String> {
        for step in plan(entry, self.fetch_full_content) {
            if let Some(markdown) = self.run(&step, entry).await {
                debug!(?step, chars = markdown.len(), "extraction step succeeded");
                return Some(markdown);
            }
        }
        None
    }

    /// Extracted markdown, or the stub document.
    pub async fn extract_or_stub(&self, entry: &FeedEntry) -> String {
        match self.extract(entry).await {
            Some(markdown) => markdown,
            None => {
                info!(title = entry.display_title(), "no usable content; using stub");
                stub_markdown(entry)
            }
        }
    }

    async fn run(&self, step: &ExtractionStep<'_>, entry: &FeedEntry) -> Option<String> {
        match *step {
            ExtractionStep::FullArticle { url } => {
                if !readability_available() {
                    return None;
                }
                let html = match self.fetcher.fetch(url).await {
                    Ok(html) => html,
                    Err(err) => {
                        warn!(url, error = %format!("{err:#}"), "unable to fetch article content");
                        return None;
                    }
                };
                let article = readable_content(&html, url)?;
                let markdown = html_to_markdown(&clean_html(&article))?;
                info!(
                    title = entry.display_title(),
                    chars = markdown.len(),
                    "extracted full article content"
                );
                Some(markdown)
            }
            ExtractionStep::FeedHtml { origin, html } => {
                let markdown = html_to_markdown(&clean_html(html))?;
                info!(
                    title = entry.display_title(),
                    ?origin,
                    chars = markdown.len(),
                    "using feed-supplied content"
                );
                Some(markdown)
            }
        }
    }
}

static READABILITY_WARNED: AtomicBool = AtomicBool::new(false);

fn readability_available() -> bool {
    if cfg!(feature = "readability") {
        return true;
    }
    if !READABILITY_WARNED.swap(true, Ordering::Relaxed) {
        warn!("readability support not compiled in; full-article extraction disabled");
    }
    false
}

#[cfg(feature = "readability")]
fn readable_content(html: &str, url: &str) -> Option<String> {
    use dom_smoothie::{Config, Readability};

    let cfg = Config {
        max_elements_to_parse: 9000,
        ..Default::default()
    };
    let parsed = Readability::new(html, Some(url), Some(cfg)).and_then(|mut r| r.parse());
    match parsed {
        Ok(article) => {
            let content = article.content.to_string();
            (!content.trim().is_empty()).then_some(content)
        }
        Err(err) => {
            warn!(url, error = %err, "readability extraction failed");
            None
        }
    }
}

#[cfg(not(feature = "readability"))]
fn readable_content(_html: &str, _url: &str) -> Option<String> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContentFragment, SummaryDetail};

    fn rich_entry() -> FeedEntry {
        FeedEntry {
            link: Some("https://example.com/a".into()),
            title: Some("Post".into()),
            summary: Some("<p>summary</p>".into()),
            summary_detail: Some(SummaryDetail {
                content_type: "text/html".into(),
                value: "<p>detail</p>".into(),
            }),
            content: vec![
                ContentFragment {
                    content_type: Some("text/html".into()),
                    value: "<p>first</p>".into(),
                },
                ContentFragment {
                    content_type: None,
                    value: "  ".into(),
                },
                ContentFragment {
                    content_type: None,
                    value: "<p>second</p>".into(),
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn plan_follows_fixed_priority() {
        let entry = rich_entry();
        let steps = plan(&entry, true);
        assert_eq!(
            steps,
            vec![
                ExtractionStep::FullArticle {
                    url: "https://example.com/a"
                },
                ExtractionStep::FeedHtml {
                    origin: FragmentOrigin::Content,
                    html: "<p>first</p>"
                },
                ExtractionStep::FeedHtml {
                    origin: FragmentOrigin::Content,
                    html: "<p>second</p>"
                },
                ExtractionStep::FeedHtml {
                    origin: FragmentOrigin::SummaryDetail,
                    html: "<p>detail</p>"
                },
                ExtractionStep::FeedHtml {
                    origin: FragmentOrigin::Summary,
                    html: "<p>summary</p>"
                },
            ]
        );
    }

    #[test]
    fn plan_skips_full_article_when_disabled_or_linkless() {
        let entry = rich_entry();
        assert!(!plan(&entry, false)
            .iter()
            .any(|s| matches!(s, ExtractionStep::FullArticle { .. })));

        let mut linkless = rich_entry();
        linkless.link = None;
        assert!(!plan(&linkless, true)
            .iter()
            .any(|s| matches!(s, ExtractionStep::FullArticle { .. })));
    }

    #[test]
    fn plan_ignores_non_html_summary_detail() {
        let mut entry = rich_entry();
        entry.summary_detail = Some(SummaryDetail {
            content_type: "text/plain".into(),
            value: "plain".into(),
        });
        assert!(!plan(&entry, false).iter().any(|s| matches!(
            s,
            ExtractionStep::FeedHtml {
                origin: FragmentOrigin::SummaryDetail,
                ..
            }
        )));
    }

    #[test]
    fn stub_has_heading_and_link() {
        let entry = FeedEntry {
            link: Some("https://example.com/x".into()),
            ..Default::default()
        };
        assert_eq!(
            stub_markdown(&entry),
            "# Untitled\n\n[Read full article](https://example.com/x)"
        );
    }
}
