#![allow(dead_code)]

use async_trait::async_trait;
use dgv_pipelines::catalog::{SchemaCatalogEntry, SchemaRegistry, SchemaType};
use dgv_pipelines::checkpoint::PollWindow;
use dgv_pipelines::classifier::SchemaClassifier;
use dgv_pipelines::config::ChannelConfig;
use dgv_pipelines::error::{PipelineError, Result};
use dgv_pipelines::fuzzy_matcher::FuzzyMatcher;
use dgv_pipelines::models::{DatasetDetail, ItemKind};
use dgv_pipelines::notifier::{MessageSink, Notifier};
use dgv_pipelines::platform::PlatformApi;
use dgv_pipelines::validator::Validator;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub const ACTIVITY: &str = "hook://activity";
pub const SCHEMA: &str = "hook://schema";
pub const PIPELINES: &str = "hook://pipelines";
pub const VALIDATOR_UI: &str = "https://validata.fr/table-schema";
pub const PUBLICATION_TOOL: &str = "publier.etalab.studio";

pub fn channels() -> ChannelConfig {
    ChannelConfig {
        activity: ACTIVITY.to_string(),
        schema_activity: SCHEMA.to_string(),
        pipelines: PIPELINES.to_string(),
    }
}

/// Platform serving canned listings and dataset details keyed by page URL.
#[derive(Default)]
pub struct FakePlatform {
    pub listings: HashMap<ItemKind, Vec<Value>>,
    pub details: HashMap<String, std::result::Result<Value, String>>,
    pub listing_calls: Mutex<Vec<(ItemKind, PollWindow)>>,
    pub detail_calls: Mutex<Vec<String>>,
}

impl FakePlatform {
    pub fn with_listing(mut self, kind: ItemKind, records: Vec<Value>) -> Self {
        self.listings.insert(kind, records);
        self
    }

    pub fn with_detail(mut self, page: &str, detail: Value) -> Self {
        self.details.insert(page.to_string(), Ok(detail));
        self
    }

    pub fn with_failing_detail(mut self, page: &str) -> Self {
        self.details
            .insert(page.to_string(), Err("503 Service Unavailable".to_string()));
        self
    }
}

#[async_trait]
impl PlatformApi for FakePlatform {
    async fn recent_items(&self, kind: ItemKind, window: &PollWindow) -> Result<Vec<Value>> {
        self.listing_calls.lock().unwrap().push((kind, *window));
        Ok(self.listings.get(&kind).cloned().unwrap_or_default())
    }

    async fn dataset_detail(&self, page: &str) -> Result<DatasetDetail> {
        self.detail_calls.lock().unwrap().push(page.to_string());
        match self.details.get(page) {
            Some(Ok(value)) => Ok(serde_json::from_value(value.clone())?),
            Some(Err(e)) => Err(PipelineError::Platform(e.clone())),
            None => Err(PipelineError::Platform(format!("404 for {}", page))),
        }
    }
}

#[derive(Default)]
pub struct FakeRegistry {
    pub catalog: Vec<SchemaCatalogEntry>,
    pub fail: bool,
    pub calls: Mutex<usize>,
}

impl FakeRegistry {
    pub fn new(catalog: Vec<SchemaCatalogEntry>) -> Self {
        Self {
            catalog,
            ..Default::default()
        }
    }
}

#[async_trait]
impl SchemaRegistry for FakeRegistry {
    async fn fetch_catalog(&self) -> Result<Vec<SchemaCatalogEntry>> {
        *self.calls.lock().unwrap() += 1;
        if self.fail {
            return Err(PipelineError::Catalog("registry unreachable".to_string()));
        }
        Ok(self.catalog.clone())
    }
}

/// Validator answering per data URL; `None` simulates a failed call.
#[derive(Default)]
pub struct FakeValidator {
    pub verdicts: HashMap<String, Option<bool>>,
    pub calls: Mutex<Vec<(String, String)>>,
}

impl FakeValidator {
    pub fn with(mut self, data_url: &str, verdict: Option<bool>) -> Self {
        self.verdicts.insert(data_url.to_string(), verdict);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Validator for FakeValidator {
    async fn validate(&self, schema_url: &str, data_url: &str) -> Result<bool> {
        self.calls
            .lock()
            .unwrap()
            .push((schema_url.to_string(), data_url.to_string()));
        match self.verdicts.get(data_url).copied().flatten() {
            Some(valid) => Ok(valid),
            None => Err(PipelineError::Validator("invalid JSON body".to_string())),
        }
    }
}

/// Records every message; with `fail_after` set, sends beyond that many fail.
#[derive(Default)]
pub struct RecordingSink {
    pub messages: Mutex<Vec<(String, String)>>,
    pub fail_after: Option<usize>,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self::failing_after(0)
    }

    pub fn failing_after(delivered: usize) -> Self {
        Self {
            fail_after: Some(delivered),
            ..Default::default()
        }
    }

    pub fn sent_to(&self, destination: &str) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, d)| d == destination)
            .map(|(text, _)| text.clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }
}

#[async_trait]
impl MessageSink for RecordingSink {
    async fn send(&self, text: &str, destination: &str) -> Result<()> {
        let mut messages = self.messages.lock().unwrap();
        if self.fail_after.is_some_and(|limit| messages.len() >= limit) {
            return Err(PipelineError::Notification("webhook returned 500".to_string()));
        }
        messages.push((text.to_string(), destination.to_string()));
        Ok(())
    }
}

pub fn entry(name: &str, title: &str, schema_type: SchemaType, schema_url: &str) -> SchemaCatalogEntry {
    SchemaCatalogEntry {
        name: name.to_string(),
        title: title.to_string(),
        schema_type,
        schema_url: schema_url.to_string(),
    }
}

pub fn notifier(sink: Arc<RecordingSink>) -> Arc<Notifier> {
    Arc::new(Notifier::new(sink, channels(), PUBLICATION_TOOL))
}

pub fn classifier(
    platform: Arc<FakePlatform>,
    validator: Arc<FakeValidator>,
    sink: Arc<RecordingSink>,
) -> SchemaClassifier {
    SchemaClassifier::new(
        platform,
        validator,
        notifier(sink),
        FuzzyMatcher::default(),
        PUBLICATION_TOOL,
        VALIDATOR_UI,
    )
}
