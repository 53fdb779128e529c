//! Configuration loader and validator for the feed→Notion sync.
//!
//! Settings come either from a YAML file (`load`) or from the process
//! environment (`from_env`). Both paths end in the same `validate`.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

pub const DEFAULT_NOTION_VERSION: &str = "2022-06-28";
pub const DEFAULT_USER_AGENT: &str = "notion-rss-bot/1.0";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub notion: Notion,
    pub feeds: Feeds,
    #[serde(default)]
    pub sync: SyncOptions,
}

/// Notion API settings and the target database.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notion {
    pub token: String,
    #[serde(default = "default_version")]
    pub version: String,
    pub database_id: String,
    #[serde(default)]
    pub properties: PropertyNames,
}

/// Names of the database properties the mapper writes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PropertyNames {
    pub title: String,
    pub url: String,
    pub published: String,
    pub source: String,
    pub summary: String,
    pub author: String,
    pub tags: String,
}

impl Default for PropertyNames {
    fn default() -> Self {
        Self {
            title: "Title".into(),
            url: "URL".into(),
            published: "Published".into(),
            source: "Source".into(),
            summary: "Summary".into(),
            author: "Author".into(),
            tags: "Tags".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Feeds {
    pub urls: Vec<String>,
    #[serde(default = "default_max_items")]
    pub max_items_per_feed: usize,
}

/// Per-run behaviour switches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncOptions {
    pub allow_updates: bool,
    pub user_agent: String,
    pub fetch_full_content: bool,
    pub fetch_timeout_secs: f64,
    pub include_summary: bool,
    pub content_property: Option<String>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            allow_updates: true,
            user_agent: DEFAULT_USER_AGENT.into(),
            fetch_full_content: true,
            fetch_timeout_secs: 10.0,
            include_summary: false,
            content_property: None,
        }
    }
}

impl SyncOptions {
    /// Falls back to the default when the value is out of range.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.fetch_timeout_secs)
            .unwrap_or_else(|_| Duration::from_secs_f64(Self::default().fetch_timeout_secs))
    }
}

fn default_version() -> String {
    DEFAULT_NOTION_VERSION.into()
}

fn default_max_items() -> usize {
    30
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Build configuration from the process environment and validate it.
pub fn from_env() -> Result<Config, ConfigError> {
    from_lookup(|name| std::env::var(name).ok())
}

/// Build configuration from an arbitrary variable lookup.
pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| lookup(name).map(|v| v.trim().to_string());
    let defaults = SyncOptions::default();

    let urls = var("RSS_FEEDS")
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(str::to_string)
        .collect();

    let cfg = Config {
        notion: Notion {
            token: var("NOTION_API_KEY").unwrap_or_default(),
            version: var("NOTION_VERSION")
                .filter(|v| !v.is_empty())
                .unwrap_or_else(default_version),
            database_id: var("NOTION_DATABASE_ID").unwrap_or_default(),
            properties: PropertyNames::default(),
        },
        feeds: Feeds {
            urls,
            max_items_per_feed: parse_or("MAX_ITEMS_PER_FEED", var("MAX_ITEMS_PER_FEED"), default_max_items()),
        },
        sync: SyncOptions {
            allow_updates: flag(var("ALLOW_UPDATES"), defaults.allow_updates),
            user_agent: var("USER_AGENT")
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.user_agent),
            fetch_full_content: flag(var("FETCH_FULL_CONTENT"), defaults.fetch_full_content),
            fetch_timeout_secs: parse_or(
                "ARTICLE_FETCH_TIMEOUT",
                var("ARTICLE_FETCH_TIMEOUT"),
                defaults.fetch_timeout_secs,
            ),
            include_summary: flag(var("INCLUDE_SUMMARY"), defaults.include_summary),
            content_property: var("CONTENT_PROPERTY").filter(|v| !v.is_empty()),
        },
    };
    validate(&cfg)?;
    Ok(cfg)
}

fn flag(raw: Option<String>, default: bool) -> bool {
    match raw {
        Some(v) if !v.is_empty() => matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
        _ => default,
    }
}

fn parse_or<T>(name: &str, raw: Option<String>, default: T) -> T
where
    T: std::str::FromStr + Copy + std::fmt::Display,
{
    match raw {
        Some(v) if !v.is_empty() => v.parse().unwrap_or_else(|_| {
            warn!(var = name, value = %v, %default, "invalid value; using default");
            default
        }),
        _ => default,
    }
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.notion.token.trim().is_empty() {
        return Err(ConfigError::Invalid("notion.token (NOTION_API_KEY) must be non-empty"));
    }
    if cfg.notion.database_id.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "notion.database_id (NOTION_DATABASE_ID) must be non-empty",
        ));
    }
    if cfg.notion.version.trim().is_empty() {
        return Err(ConfigError::Invalid("notion.version must be non-empty"));
    }
    if cfg.feeds.urls.iter().all(|u| u.trim().is_empty()) {
        return Err(ConfigError::Invalid("feeds.urls (RSS_FEEDS) must list at least one feed"));
    }
    let timeout = cfg.sync.fetch_timeout_secs;
    if !(timeout > 0.0 && Duration::try_from_secs_f64(timeout).is_ok()) {
        return Err(ConfigError::Invalid(
            "sync.fetch_timeout_secs (ARTICLE_FETCH_TIMEOUT) must be a positive number of seconds",
        ));
    }

    let p = &cfg.notion.properties;
    if p.title.trim().is_empty() || p.url.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "notion.properties.title and notion.properties.url must be non-empty",
        ));
    }

    Ok(())
}

/// Example YAML configuration.
pub fn example() -> &'static str {
    r#"notion:
  token: "YOUR_NOTION_INTEGRATION_TOKEN"
  version: "2022-06-28"
  database_id: "NOTION_DATABASE_ID"
  properties:
    title: "Title"
    url: "URL"
    published: "Published"
    source: "Source"
    summary: "Summary"
    author: "Author"
    tags: "Tags"

feeds:
  urls:
    - "https://blog.rust-lang.org/feed.xml"
    - "https://this-week-in-rust.org/atom.xml"
  max_items_per_feed: 30

sync:
  allow_updates: true
  user_agent: "notion-rss-bot/1.0"
  fetch_full_content: true
  fetch_timeout_secs: 10
  include_summary: false
  content_property: null
"#
}
