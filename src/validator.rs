//! Remote table-schema validator (Validata).

use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

#[async_trait]
pub trait Validator: Send + Sync {
    /// `report.valid` for `data_url` checked against `schema_url`.
    async fn validate(&self, schema_url: &str, data_url: &str) -> Result<bool>;
}

/// Validation verdict where any validator failure counts as invalid.
pub async fn validate_fail_closed(validator: &dyn Validator, schema_url: &str, data_url: &str) -> bool {
    match validator.validate(schema_url, data_url).await {
        Ok(valid) => valid,
        Err(e) => {
            warn!("Validation of {} failed, reporting it invalid: {}", data_url, e);
            false
        }
    }
}

/// Link to the validator web UI for a resource/schema pair.
pub fn ui_link(ui_url: &str, data_url: &str, schema_url: &str) -> String {
    format!("{}?input=url&url={}&schema_url={}", ui_url, data_url, schema_url)
}

#[derive(Debug, Deserialize)]
struct ValidationResponse {
    report: ValidationReport,
}

#[derive(Debug, Deserialize)]
struct ValidationReport {
    valid: bool,
}

pub struct ValidataClient {
    client: Client,
    api_url: String,
}

impl ValidataClient {
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Validator(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_url: api_url.into(),
        })
    }
}

#[async_trait]
impl Validator for ValidataClient {
    async fn validate(&self, schema_url: &str, data_url: &str) -> Result<bool> {
        let response = self
            .client
            .get(&self.api_url)
            .query(&[("schema", schema_url), ("url", data_url)])
            .send()
            .await
            .map_err(|e| PipelineError::Validator(format!("Validator call failed: {}", e)))?;

        let body = response
            .text()
            .await
            .map_err(|e| PipelineError::Validator(format!("Failed to read validator response: {}", e)))?;

        parse_report(&body)
    }
}

/// `report.valid` of a validator response body.
pub fn parse_report(body: &str) -> Result<bool> {
    let response: ValidationResponse = serde_json::from_str(body)
        .map_err(|e| PipelineError::Validator(format!("Unexpected validator response: {}", e)))?;
    Ok(response.report.valid)
}
