use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use notion_rss_sync::blocks;
use notion_rss_sync::config::DEFAULT_USER_AGENT;
use notion_rss_sync::extract::{Extractor, HttpFetcher};
use notion_rss_sync::model::{ContentFragment, FeedEntry};
use tracing_subscriber::EnvFilter;

/// Show the markdown and Notion blocks an article would produce.
#[derive(Parser, Debug)]
struct Args {
    /// Article URL to fetch and extract
    #[arg(long, conflicts_with = "file")]
    url: Option<String>,

    /// Local HTML file to convert instead of fetching
    #[arg(long)]
    file: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    user_agent: String,

    /// Fetch timeout in seconds
    #[arg(long, default_value_t = 10.0)]
    timeout: f64,

    /// Print the block JSON as well
    #[arg(long)]
    blocks: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let timeout = Duration::try_from_secs_f64(args.timeout)
        .ok()
        .filter(|t| !t.is_zero())
        .with_context(|| format!("--timeout must be a positive number of seconds, got {}", args.timeout))?;
    let fetcher = Arc::new(HttpFetcher::new(&args.user_agent, timeout)?);
    let markdown = match (&args.url, &args.file) {
        (Some(url), _) => {
            let entry = FeedEntry {
                link: Some(url.clone()),
                ..Default::default()
            };
            Extractor::new(fetcher, true).extract_or_stub(&entry).await
        }
        (None, Some(path)) => {
            let html = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            let entry = FeedEntry {
                content: vec![ContentFragment {
                    content_type: Some("text/html".into()),
                    value: html,
                }],
                ..Default::default()
            };
            Extractor::new(fetcher, false).extract_or_stub(&entry).await
        }
        (None, None) => anyhow::bail!("pass --url or --file"),
    };

    println!("{}", markdown);
    let compiled = blocks::compile(&markdown);
    eprintln!("{} blocks", compiled.len());
    if args.blocks {
        let json: Vec<_> = compiled.iter().map(|b| b.to_notion()).collect();
        println!("{}", serde_json::to_string_pretty(&json)?);
    }
    Ok(())
}
