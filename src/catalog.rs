//! Schema catalog fetcher
//!
//! The registry publishes one JSON document listing every schema. It is
//! fetched fresh on each run and never cached.

use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SchemaType {
    TableSchema,
    Other(String),
}

impl SchemaType {
    pub fn parse(raw: &str) -> Self {
        if raw == "tableschema" {
            SchemaType::TableSchema
        } else {
            SchemaType::Other(raw.to_string())
        }
    }
}

impl Default for SchemaType {
    fn default() -> Self {
        SchemaType::Other(String::new())
    }
}

impl<'de> Deserialize<'de> for SchemaType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(SchemaType::parse(raw.as_deref().unwrap_or_default()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaCatalogEntry {
    /// Internal identifier, e.g. `etalab/schema-irve`
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub schema_type: SchemaType,
    #[serde(default)]
    pub schema_url: String,
}

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    schemas: Vec<SchemaCatalogEntry>,
}

pub fn parse_catalog(body: &str) -> Result<Vec<SchemaCatalogEntry>> {
    let doc: CatalogDocument = serde_json::from_str(body)
        .map_err(|e| PipelineError::Catalog(format!("Malformed schema catalog: {}", e)))?;
    Ok(doc.schemas)
}

/// First catalog entry whose internal name is `name`.
pub fn find_by_name<'a>(catalog: &'a [SchemaCatalogEntry], name: &str) -> Option<&'a SchemaCatalogEntry> {
    catalog.iter().find(|entry| entry.name == name)
}

#[async_trait]
pub trait SchemaRegistry: Send + Sync {
    async fn fetch_catalog(&self) -> Result<Vec<SchemaCatalogEntry>>;
}

pub struct HttpSchemaRegistry {
    client: Client,
    catalog_url: String,
}

impl HttpSchemaRegistry {
    pub fn new(catalog_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Catalog(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            catalog_url: catalog_url.into(),
        })
    }
}

#[async_trait]
impl SchemaRegistry for HttpSchemaRegistry {
    async fn fetch_catalog(&self) -> Result<Vec<SchemaCatalogEntry>> {
        let body = self
            .client
            .get(&self.catalog_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| PipelineError::Catalog(format!("GET {} failed: {}", self.catalog_url, e)))?
            .text()
            .await
            .map_err(|e| PipelineError::Catalog(format!("Failed to read catalog body: {}", e)))?;

        let catalog = parse_catalog(&body)?;
        info!("Fetched {} schemas from {}", catalog.len(), self.catalog_url);
        Ok(catalog)
    }
}
