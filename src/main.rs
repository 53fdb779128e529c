use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use notion_rss_sync::config;
use notion_rss_sync::extract::{Extractor, HttpFetcher};
use notion_rss_sync::feed::HttpFeedSource;
use notion_rss_sync::notion::NotionClient;
use notion_rss_sync::sync::Syncer;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file; the environment is used when omitted
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = match args.config.as_deref() {
        Some(path) => config::load(Some(path))
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => config::from_env().context("invalid environment configuration")?,
    };

    let notion = Arc::new(NotionClient::new(
        cfg.notion.token.clone(),
        cfg.notion.version.clone(),
    )?);
    let timeout = cfg.sync.fetch_timeout();
    let feeds = Arc::new(HttpFeedSource::new(&cfg.sync.user_agent, timeout)?);
    let fetcher = Arc::new(HttpFetcher::new(&cfg.sync.user_agent, timeout)?);
    let extractor = Extractor::new(fetcher, cfg.sync.fetch_full_content);

    info!(feeds = cfg.feeds.urls.len(), database_id = %cfg.notion.database_id, "starting sync");
    let mut syncer = Syncer::new(&cfg, notion, feeds, extractor);
    syncer.run(&cfg.feeds.urls).await;
    Ok(())
}
