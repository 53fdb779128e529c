use serde::{Deserialize, Serialize};

/// One syndicated item as consumed by the pipeline. Built once by the feed
/// source and never mutated afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedEntry {
    pub link: Option<String>,
    pub title: Option<String>,
    pub published: Option<String>,
    pub updated: Option<String>,
    pub created: Option<String>,
    pub author: Option<String>,
    pub summary: Option<String>,
    pub subtitle: Option<String>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub content: Vec<ContentFragment>,
    pub summary_detail: Option<SummaryDetail>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    pub term: String,
    pub label: Option<String>,
}

impl Tag {
    /// Display name: the label when present, otherwise the term.
    pub fn name(&self) -> &str {
        self.label
            .as_deref()
            .filter(|l| !l.trim().is_empty())
            .unwrap_or(&self.term)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentFragment {
    pub content_type: Option<String>,
    pub value: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SummaryDetail {
    pub content_type: String,
    pub value: String,
}

impl SummaryDetail {
    pub fn is_html(&self) -> bool {
        self.content_type.to_ascii_lowercase().starts_with("text/html")
    }
}

impl FeedEntry {
    /// The identity key, ignoring blank values.
    pub fn link(&self) -> Option<&str> {
        self.link.as_deref().map(str::trim).filter(|l| !l.is_empty())
    }

    /// Title for logs and stub documents.
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or("Untitled")
    }

    /// `summary`, falling back to `subtitle`.
    pub fn summary_or_subtitle(&self) -> Option<&str> {
        self.summary
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.subtitle.as_deref().filter(|s| !s.is_empty()))
    }
}

/// A parsed feed: the name used for the `Source` property plus its entries.
#[derive(Debug, Clone, Default)]
pub struct ParsedFeed {
    pub source_name: String,
    pub entries: Vec<FeedEntry>,
}

/// Per-feed tally reported after each harvest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedCounts {
    pub new: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl FeedCounts {
    pub fn upserted(&self) -> usize {
        self.new + self.updated
    }
}
