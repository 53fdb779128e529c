//! Lazily fetched database schema, shared by every entry of a run.
use anyhow::Result;
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

use crate::notion::NotionService;
use crate::retry::{self, RetryPolicy};

/// Property name → Notion property type for one database.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseSchema {
    properties: HashMap<String, String>,
}

impl DatabaseSchema {
    pub fn new<I, K, V>(properties: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            properties: properties
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    pub fn property_type(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

/// Schema for the target database, fetched on first use and kept until
/// `reset`. Also remembers which missing properties were already reported.
#[derive(Debug, Default)]
pub struct SchemaCache {
    schema: Option<DatabaseSchema>,
    warned: HashSet<String>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache that is already populated; no remote call will be made.
    pub fn preloaded(schema: DatabaseSchema) -> Self {
        Self {
            schema: Some(schema),
            warned: HashSet::new(),
        }
    }

    /// Forget the cached schema and the warnings issued for it.
    pub fn reset(&mut self) {
        self.schema = None;
        self.warned.clear();
    }

    pub fn is_loaded(&self) -> bool {
        self.schema.is_some()
    }

    pub async fn get_or_fetch(
        &mut self,
        notion: &dyn NotionService,
        database_id: &str,
        policy: &RetryPolicy,
    ) -> Result<&DatabaseSchema> {
        if self.schema.is_none() {
            let db = retry::with_backoff(policy, "retrieve database", || {
                notion.retrieve_database(database_id)
            })
            .await?;
            let schema = DatabaseSchema::new(
                db.properties
                    .into_iter()
                    .map(|(name, prop)| (name, prop.typ)),
            );
            info!(database_id, properties = schema.len(), "loaded database schema");
            self.schema = Some(schema);
        }
        Ok(self.schema.get_or_insert_with(DatabaseSchema::default))
    }

    /// Whether `name` exists in the loaded schema. Logs a warning the first
    /// time a given property is found missing.
    pub fn check(&mut self, name: &str) -> bool {
        let present = self.schema.as_ref().map(|s| s.has(name)).unwrap_or(false);
        if !present && self.warned.insert(name.to_string()) {
            warn!(property = name, "database has no such property; omitting it");
        }
        present
    }
}
