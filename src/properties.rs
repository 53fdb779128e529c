//! Feed entry → Notion page properties.
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{json, Map, Value};
use std::collections::HashSet;

use crate::blocks::{rich_text, MAX_TEXT_RUN};
use crate::config::PropertyNames;
use crate::markdown::html_to_text;
use crate::model::FeedEntry;
use crate::schema::SchemaCache;

pub const TITLE_LIMIT: usize = 200;
pub const SELECT_LIMIT: usize = 90;
pub const SUMMARY_LIMIT: usize = 200;
/// Notion caps a rich-text property at 100 text objects.
pub const MAX_PROPERTY_RUNS: usize = 100;

/// Property name → Notion property value, ready for create/update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageProperties(Map<String, Value>);

impl PageProperties {
    pub fn insert(&mut self, name: &str, value: Value) {
        self.0.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Builds page properties according to the configured names and switches.
#[derive(Debug, Clone)]
pub struct PropertyMapper {
    pub names: PropertyNames,
    pub include_summary: bool,
    pub content_property: Option<String>,
}

impl PropertyMapper {
    pub fn new(names: PropertyNames, include_summary: bool, content_property: Option<String>) -> Self {
        Self {
            names,
            include_summary,
            content_property,
        }
    }

    /// Map one entry. Title and URL are always sent; every other property is
    /// sent only when `schema` declares it.
    pub fn build(
        &self,
        entry: &FeedEntry,
        source_name: &str,
        article_markdown: &str,
        schema: &mut SchemaCache,
    ) -> PageProperties {
        let n = &self.names;
        let mut props = PageProperties::default();

        let link = entry.link().unwrap_or_default();
        let title = entry
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .or(entry.link())
            .unwrap_or("Untitled");
        props.insert(
            &n.title,
            json!({ "title": [{ "text": { "content": truncate_chars(title, TITLE_LIMIT) } }] }),
        );
        props.insert(&n.url, json!({ "url": link }));

        if schema.check(&n.published) {
            let published = [&entry.published, &entry.updated, &entry.created]
                .into_iter()
                .flatten()
                .find_map(|raw| parse_date(raw));
            let date = published.map(|start| json!({ "start": start }));
            props.insert(&n.published, json!({ "date": date }));
        }

        if schema.check(&n.source) {
            props.insert(
                &n.source,
                json!({ "select": { "name": option_name(source_name) } }),
            );
        }

        if self.include_summary && schema.check(&n.summary) {
            let summary = entry
                .summary_or_subtitle()
                .map(|raw| summarize(&html_to_text(raw)))
                .unwrap_or_default();
            props.insert(
                &n.summary,
                json!({ "rich_text": rich_text(&summary, MAX_TEXT_RUN) }),
            );
        }

        if schema.check(&n.author) {
            let author = entry.author.as_deref().map(str::trim).unwrap_or_default();
            props.insert(
                &n.author,
                json!({ "rich_text": rich_text(author, MAX_TEXT_RUN) }),
            );
        }

        if !entry.tags.is_empty() && schema.check(&n.tags) {
            let mut seen = HashSet::new();
            let options: Vec<Value> = entry
                .tags
                .iter()
                .map(|t| option_name(t.name()))
                .filter(|name| !name.is_empty() && seen.insert(name.clone()))
                .map(|name| json!({ "name": name }))
                .collect();
            props.insert(&n.tags, json!({ "multi_select": options }));
        }

        if let Some(content_prop) = self.content_property.as_deref() {
            if schema.check(content_prop) {
                let mut runs = rich_text(article_markdown, MAX_TEXT_RUN);
                runs.truncate(MAX_PROPERTY_RUNS);
                props.insert(content_prop, json!({ "rich_text": runs }));
            }
        }

        props
    }
}

/// Select option label: commas are not allowed by Notion, length is capped.
fn option_name(raw: &str) -> String {
    truncate_chars(raw.replace(',', " ").trim(), SELECT_LIMIT)
        .trim()
        .to_string()
}

/// First `max` characters of `s`.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Shorten plain text for the Summary property: at most 200 characters,
/// cut back to a word boundary when one exists, with a trailing `...`.
pub fn summarize(text: &str) -> String {
    if text.chars().count() <= SUMMARY_LIMIT {
        return text.to_string();
    }
    let head = truncate_chars(text, SUMMARY_LIMIT - 3);
    let cut = match head.rsplit_once(' ') {
        Some((before, _)) if !before.trim().is_empty() => before.trim_end(),
        _ => head.as_str(),
    };
    format!("{cut}...")
}

const OFFSET_FORMATS: &[&str] = &[
    "%d %b %Y %H:%M:%S %z",
    "%d %b %Y %H:%M %z",
    "%d %B %Y %H:%M:%S %z",
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%dT%H:%M:%S%z",
];

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%d %b %Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d %b %Y", "%d %B %Y", "%B %d %Y", "%b %d %Y"];

/// Best-effort date parsing into an ISO-8601 string.
///
/// Accepts RFC 3339, RFC 2822 (also with a wrong or missing weekday and
/// textual zones such as `GMT`), and a handful of common numeric and
/// day-month-year layouts. Anything else yields `None`.
pub fn parse_date(raw: &str) -> Option<String> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.to_rfc3339());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.to_rfc3339());
    }

    let normalized = normalize_zone(strip_weekday(s));
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&normalized, fmt) {
            return Some(dt.to_rfc3339());
        }
    }

    let naive = strip_zone_name(strip_weekday(s));
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive, fmt) {
            return Some(dt.format("%Y-%m-%dT%H:%M:%S").to_string());
        }
    }
    let date_only = naive.replace(',', "");
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(&date_only, fmt) {
            return Some(d.format("%Y-%m-%d").to_string());
        }
    }
    None
}

/// `"Tue, 01 Jan 2024 ..."` → `"01 Jan 2024 ..."`.
fn strip_weekday(s: &str) -> &str {
    match s.split_once(',') {
        Some((head, rest)) if !head.is_empty() && head.chars().all(|c| c.is_ascii_alphabetic()) => {
            rest.trim()
        }
        _ => s,
    }
}

const ZONE_NAMES: &[&str] = &["GMT", "UTC", "UT", "Z"];

fn strip_zone_name(s: &str) -> &str {
    for zone in ZONE_NAMES {
        if let Some(rest) = s.strip_suffix(zone) {
            if rest.ends_with(' ') {
                return rest.trim_end();
            }
        }
    }
    s
}

fn normalize_zone(s: &str) -> String {
    let stripped = strip_zone_name(s);
    if stripped.len() != s.len() {
        format!("{stripped} +0000")
    } else {
        s.to_string()
    }
}
