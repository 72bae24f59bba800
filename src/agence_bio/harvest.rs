//! Paginated harvest of the Agence Bio operator API.

use super::records::Operator;
use crate::config::AgenceBioConfig;
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

#[async_trait]
pub trait OperatorSource: Send + Sync {
    /// Operators starting at `offset`; an empty page ends the listing.
    async fn fetch_page(&self, offset: u32) -> Result<Vec<Operator>>;

    fn page_size(&self) -> u32;
}

#[derive(Debug, Deserialize)]
struct OperatorPage {
    #[serde(default)]
    items: Vec<Operator>,
}

pub struct AgenceBioClient {
    client: Client,
    base_url: String,
    page_size: u32,
}

impl AgenceBioClient {
    pub fn new(config: &AgenceBioConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::AgenceBio(format!("Failed to build HTTP client: {}", e)))?;
        let base_url = format!("{}?departements={}", config.api_url, config.departements.join(","));
        Ok(Self {
            client,
            base_url,
            page_size: config.page_size,
        })
    }

    pub fn page_url(&self, offset: u32) -> String {
        format!("{}&nb={}&debut={}", self.base_url, self.page_size, offset)
    }
}

#[async_trait]
impl OperatorSource for AgenceBioClient {
    async fn fetch_page(&self, offset: u32) -> Result<Vec<Operator>> {
        let url = self.page_url(offset);
        let page: OperatorPage = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| PipelineError::AgenceBio(format!("GET {} failed: {}", url, e)))?
            .json()
            .await
            .map_err(|e| PipelineError::AgenceBio(format!("Failed to parse page at {}: {}", offset, e)))?;
        Ok(page.items)
    }

    fn page_size(&self) -> u32 {
        self.page_size
    }
}

/// Fetch pages at increasing offsets until one comes back empty.
pub async fn harvest_all(source: &dyn OperatorSource) -> Result<Vec<Operator>> {
    let step = source.page_size().max(1);
    let mut offset = 0;
    let mut operators = Vec::new();

    loop {
        let page = source.fetch_page(offset).await?;
        debug!("Offset {}: {} operators", offset, page.len());
        if page.is_empty() {
            break;
        }
        operators.extend(page);
        offset += step;
    }

    info!("Harvested {} operators", operators.len());
    Ok(operators)
}
