//! Sync RSS/Atom feed entries into a Notion database.
//!
//! The pipeline per entry is: extract article markdown (`extract`), compile it
//! into Notion blocks (`blocks`), map the entry to page properties
//! (`properties`), then create or replace the page keyed by its URL (`upsert`).
//! `sync` drives that pipeline over every configured feed.

pub mod blocks;
pub mod config;
pub mod extract;
pub mod feed;
pub mod markdown;
pub mod model;
pub mod notion;
pub mod properties;
pub mod retry;
pub mod sanitize;
pub mod schema;
pub mod sync;
pub mod upsert;
