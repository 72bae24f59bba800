//! Activity watcher run driver
//!
//! One run polls the three object kinds, announces every new item, then
//! analyses the schemas of the new datasets. When a checkpoint store is
//! configured the window starts at the previous run's watermark and the
//! watermark only moves forward after the whole run succeeded.

use crate::catalog::SchemaRegistry;
use crate::checkpoint::{Checkpoint, CheckpointStore, PollWindow};
use crate::classifier::{DatasetOutcome, SchemaClassifier};
use crate::error::Result;
use crate::models::{Item, ItemKind};
use crate::notifier::Notifier;
use crate::poller::ChangePoller;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Serialize)]
pub struct DatasetReport {
    pub dataset: Item,
    pub outcome: DatasetOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct WatchReport {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub datasets: usize,
    pub reuses: usize,
    pub organizations: usize,
    pub schema_outcomes: Vec<DatasetReport>,
    pub messages_sent: usize,
}

impl WatchReport {
    pub fn skipped(&self) -> usize {
        self.schema_outcomes
            .iter()
            .filter(|r| matches!(r.outcome, DatasetOutcome::Skipped { .. }))
            .count()
    }
}

pub struct ActivityWatcher {
    poller: ChangePoller,
    registry: Arc<dyn SchemaRegistry>,
    classifier: SchemaClassifier,
    notifier: Arc<Notifier>,
    checkpoints: Option<CheckpointStore>,
    poll_window: Duration,
}

impl ActivityWatcher {
    pub fn new(
        poller: ChangePoller,
        registry: Arc<dyn SchemaRegistry>,
        classifier: SchemaClassifier,
        notifier: Arc<Notifier>,
        poll_window: Duration,
    ) -> Self {
        Self {
            poller,
            registry,
            classifier,
            notifier,
            checkpoints: None,
            poll_window,
        }
    }

    pub fn with_checkpoints(mut self, store: CheckpointStore) -> Self {
        self.checkpoints = Some(store);
        self
    }

    pub fn window_for(&self, now: DateTime<Utc>) -> Result<PollWindow> {
        match &self.checkpoints {
            Some(store) => store.window_for(now, self.poll_window),
            None => PollWindow::trailing(now, self.poll_window),
        }
    }

    pub async fn run(&self, now: DateTime<Utc>) -> Result<WatchReport> {
        let window = self.window_for(now)?;
        info!("Watching creations from {} to {}", window.start, window.end);

        let datasets = self.poller.poll(ItemKind::Datasets, &window).await?;
        let reuses = self.poller.poll(ItemKind::Reuses, &window).await?;
        let organizations = self.poller.poll(ItemKind::Organizations, &window).await?;

        let mut messages_sent = 0;
        messages_sent += self.notifier.announce_items(ItemKind::Datasets, &datasets).await?;
        messages_sent += self
            .notifier
            .announce_items(ItemKind::Organizations, &organizations)
            .await?;
        messages_sent += self.notifier.announce_items(ItemKind::Reuses, &reuses).await?;

        let mut schema_outcomes = Vec::new();
        if !datasets.is_empty() {
            let catalog = self.registry.fetch_catalog().await?;
            let outcomes = self.classifier.classify_all(&catalog, &datasets).await;
            for (dataset, outcome) in datasets.iter().zip(outcomes) {
                messages_sent += outcome.messages_sent();
                schema_outcomes.push(DatasetReport {
                    dataset: dataset.clone(),
                    outcome,
                });
            }
        }

        let report = WatchReport {
            window_start: window.start,
            window_end: window.end,
            datasets: datasets.len(),
            reuses: reuses.len(),
            organizations: organizations.len(),
            schema_outcomes,
            messages_sent,
        };

        if let Some(store) = &self.checkpoints {
            let previous = store.load()?;
            let seen = (report.datasets + report.reuses + report.organizations) as u64;
            // the watermark never moves backwards
            let last_processed_at = previous
                .as_ref()
                .map_or(window.end, |cp| cp.last_processed_at.max(window.end));
            store.save(&Checkpoint {
                last_processed_at,
                items_seen: previous.map_or(0, |cp| cp.items_seen) + seen,
            })?;
        }

        info!(
            "{} datasets, {} reuses, {} organizations; {} messages sent, {} datasets skipped",
            report.datasets,
            report.reuses,
            report.organizations,
            report.messages_sent,
            report.skipped()
        );
        Ok(report)
    }
}
