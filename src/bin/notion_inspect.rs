use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use notion_rss_sync::config;
use notion_rss_sync::notion::{NotionClient, NotionService};

/// Print the property schema of the target database.
#[derive(Parser, Debug)]
struct Args {
    /// Path to YAML config; the environment is used when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Database ID to inspect instead of the configured one
    #[arg(long)]
    db_id: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let cfg = match args.config.as_deref() {
        Some(path) => config::load(Some(path))?,
        None => config::from_env()?,
    };
    let client = NotionClient::new(cfg.notion.token.clone(), cfg.notion.version.clone())?;
    let db_id = args.db_id.unwrap_or(cfg.notion.database_id);

    let db = client.retrieve_database(&db_id).await?;
    println!("Database ID: {}", db.id);
    println!("Properties:");
    let mut props: Vec<_> = db.properties.into_iter().collect();
    props.sort_by(|a, b| a.0.cmp(&b.0));
    let names = &cfg.notion.properties;
    for (name, prop) in props {
        let used = [
            &names.title,
            &names.url,
            &names.published,
            &names.source,
            &names.summary,
            &names.author,
            &names.tags,
        ]
        .into_iter()
        .chain(cfg.sync.content_property.as_ref())
        .any(|n| *n == name);
        let marker = if used { "*" } else { " " };
        println!("{} {} -> {{ id: {}, type: {} }}", marker, name, prop.id, prop.typ);
    }
    Ok(())
}
