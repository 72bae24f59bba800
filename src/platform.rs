//! Platform API client
//!
//! Lists recently created objects and fetches dataset detail records.

use crate::checkpoint::PollWindow;
use crate::config::WatcherConfig;
use crate::error::{PipelineError, Result};
use crate::models::{DatasetDetail, ItemKind};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// Raw records of `kind` created inside `window`, newest first.
    async fn recent_items(&self, kind: ItemKind, window: &PollWindow) -> Result<Vec<Value>>;

    /// Detail record of the dataset published at `page`.
    async fn dataset_detail(&self, page: &str) -> Result<DatasetDetail>;
}

/// One page of a platform listing.
#[derive(Debug, Default, Deserialize)]
pub struct ListingPage {
    #[serde(default)]
    pub data: Vec<Value>,
    #[serde(default)]
    pub next_page: Option<String>,
}

pub struct DataGouvClient {
    client: Client,
    api_base_url: String,
    page_segment: String,
    api_segment: String,
    page_size: u32,
}

impl DataGouvClient {
    pub fn new(config: &WatcherConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Platform(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            page_segment: config.page_segment.clone(),
            api_segment: config.api_segment.clone(),
            page_size: config.page_size,
        })
    }

    /// API detail URL for a public page URL.
    pub fn detail_url(&self, page: &str) -> String {
        detail_url(page, &self.page_segment, &self.api_segment)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PipelineError::Platform(format!("GET {} failed: {}", url, e)))?
            .error_for_status()
            .map_err(|e| PipelineError::Platform(format!("GET {} failed: {}", url, e)))?;

        response
            .json::<T>()
            .await
            .map_err(|e| PipelineError::Platform(format!("Failed to parse {}: {}", url, e)))
    }
}

#[async_trait]
impl PlatformApi for DataGouvClient {
    async fn recent_items(&self, kind: ItemKind, window: &PollWindow) -> Result<Vec<Value>> {
        let mut url = format!(
            "{}/{}/?sort=-created&page_size={}",
            self.api_base_url,
            kind.api_path(),
            self.page_size
        );
        let mut items = Vec::new();

        loop {
            let page: ListingPage = self.get_json(&url).await?;
            let (records, next) = filter_page(page, window);
            items.extend(records);
            match next {
                Some(next) => url = next,
                None => break,
            }
        }

        debug!("{} {} created in window", items.len(), kind);
        Ok(items)
    }

    async fn dataset_detail(&self, page: &str) -> Result<DatasetDetail> {
        let url = self.detail_url(page);
        self.get_json(&url).await
    }
}

/// Records of `page` created inside `window`, and the next page to fetch.
///
/// Listings are sorted newest first, so paging stops at the first record
/// older than the window start or at an empty page. Records without a
/// parseable `created_at` are dropped.
pub fn filter_page(page: ListingPage, window: &PollWindow) -> (Vec<Value>, Option<String>) {
    let mut reached_start = page.data.is_empty();
    let mut kept = Vec::new();

    for record in page.data {
        match created_at(&record) {
            Some(ts) if window.contains(ts) => kept.push(record),
            Some(ts) if ts < window.start => reached_start = true,
            Some(_) => {}
            None => debug!("Dropping record without created_at"),
        }
    }

    let next = page.next_page.filter(|_| !reached_start);
    (kept, next)
}

pub fn detail_url(page: &str, page_segment: &str, api_segment: &str) -> String {
    page.replacen(page_segment, api_segment, 1)
}

/// Creation timestamp of a record: RFC 3339, or a naive ISO timestamp taken as UTC.
pub fn created_at(record: &Value) -> Option<DateTime<Utc>> {
    let raw = record.get("created_at")?.as_str()?;
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
