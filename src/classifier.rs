//! Schema classification of newly created datasets.
//!
//! Each resource declaring a schema is matched against the catalog and, for
//! table schemas, validated remotely. A dataset with no declared schema at
//! all is instead scanned for resources whose name resembles a catalog
//! title. The two paths never run on the same dataset.

use crate::catalog::{find_by_name, SchemaCatalogEntry, SchemaType};
use crate::fuzzy_matcher::FuzzyMatcher;
use crate::models::{DatasetDetail, Item, OrganizationInfo, Resource};
use crate::notifier::Notifier;
use crate::platform::PlatformApi;
use crate::validator::{ui_link, validate_fail_closed, Validator};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of classifying one resource with a declared schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub resource_name: String,
    pub schema_title: String,
    pub is_declared: bool,
    /// Only set for catalog table schemas
    pub validity: Option<bool>,
    pub validata_link: Option<String>,
    pub via_publication_tool: bool,
}

/// Best resource/schema pairing of a dataset without declared schemas.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaSuspicion {
    pub schema_title: String,
    pub score: f64,
    pub resource_name: String,
    pub resource_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SkipReason {
    MissingPage,
    DetailFetch(String),
    /// `sent` messages for the dataset went out before the failing one
    Notification { sent: usize, error: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingPage => f.write_str("dataset has no page URL"),
            SkipReason::DetailFetch(e) => write!(f, "detail fetch failed: {}", e),
            SkipReason::Notification { sent, error } => {
                write!(f, "notification failed after {} sent: {}", sent, error)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DatasetOutcome {
    Classified {
        declared: Vec<ClassificationResult>,
        suspicion: Option<SchemaSuspicion>,
    },
    Skipped {
        reason: SkipReason,
    },
}

impl DatasetOutcome {
    /// Notifications emitted for this dataset
    pub fn messages_sent(&self) -> usize {
        match self {
            DatasetOutcome::Classified { declared, suspicion } => {
                declared.len() + usize::from(suspicion.is_some())
            }
            DatasetOutcome::Skipped {
                reason: SkipReason::Notification { sent, .. },
            } => *sent,
            DatasetOutcome::Skipped { .. } => 0,
        }
    }
}

pub struct SchemaClassifier {
    platform: Arc<dyn PlatformApi>,
    validator: Arc<dyn Validator>,
    notifier: Arc<Notifier>,
    matcher: FuzzyMatcher,
    publication_tool: String,
    validator_ui_url: String,
}

impl SchemaClassifier {
    pub fn new(
        platform: Arc<dyn PlatformApi>,
        validator: Arc<dyn Validator>,
        notifier: Arc<Notifier>,
        matcher: FuzzyMatcher,
        publication_tool: impl Into<String>,
        validator_ui_url: impl Into<String>,
    ) -> Self {
        Self {
            platform,
            validator,
            notifier,
            matcher,
            publication_tool: publication_tool.into(),
            validator_ui_url: validator_ui_url.into(),
        }
    }

    /// Classify every dataset in order; one failing dataset never stops the others.
    pub async fn classify_all(
        &self,
        catalog: &[SchemaCatalogEntry],
        datasets: &[Item],
    ) -> Vec<DatasetOutcome> {
        let mut outcomes = Vec::with_capacity(datasets.len());
        for dataset in datasets {
            let outcome = self.classify_dataset(catalog, dataset).await;
            if let DatasetOutcome::Skipped { reason } = &outcome {
                warn!("Skipping schema analysis of '{}': {}", dataset.name, reason);
            }
            outcomes.push(outcome);
        }
        outcomes
    }

    pub async fn classify_dataset(&self, catalog: &[SchemaCatalogEntry], dataset: &Item) -> DatasetOutcome {
        let Some(page) = dataset.page.as_deref() else {
            return DatasetOutcome::Skipped {
                reason: SkipReason::MissingPage,
            };
        };

        let detail: DatasetDetail = match self.platform.dataset_detail(page).await {
            Ok(detail) => detail,
            Err(e) => {
                return DatasetOutcome::Skipped {
                    reason: SkipReason::DetailFetch(e.to_string()),
                }
            }
        };
        let orga = OrganizationInfo::from_detail(&detail);

        let mut declared = Vec::new();
        for resource in &detail.resources {
            let Some(schema_name) = resource.declared_schema() else {
                continue;
            };
            let result = self.classify_declared(catalog, resource, schema_name).await;
            if let Err(e) = self.notifier.declared_schema(&result, dataset, &orga).await {
                return DatasetOutcome::Skipped {
                    reason: SkipReason::Notification {
                        sent: declared.len(),
                        error: e.to_string(),
                    },
                };
            }
            declared.push(result);
        }

        let mut suspicion = None;
        if declared.is_empty() {
            suspicion = self.suspect(catalog, &detail.resources);
            if let Some(found) = &suspicion {
                info!(
                    "'{}' suspected to follow '{}' (score {:.3})",
                    dataset.name, found.schema_title, found.score
                );
                if let Err(e) = self.notifier.suspected_schema(found, &orga).await {
                    return DatasetOutcome::Skipped {
                        reason: SkipReason::Notification {
                            sent: 0,
                            error: e.to_string(),
                        },
                    };
                }
            }
        }

        DatasetOutcome::Classified { declared, suspicion }
    }

    /// Match a declared schema name against the catalog and validate it when
    /// the catalog says it is a table schema.
    pub async fn classify_declared(
        &self,
        catalog: &[SchemaCatalogEntry],
        resource: &Resource,
        schema_name: &str,
    ) -> ClassificationResult {
        let Some(entry) = find_by_name(catalog, schema_name) else {
            debug!("Schema '{}' of {} not in catalog", schema_name, resource.url);
            return ClassificationResult {
                resource_name: resource.name.clone(),
                schema_title: schema_name.to_string(),
                is_declared: true,
                validity: None,
                validata_link: None,
                via_publication_tool: false,
            };
        };

        let via_publication_tool = resource.extra_str("publish_source") == Some(self.publication_tool.as_str());

        let (validity, validata_link) = match entry.schema_type {
            SchemaType::TableSchema => {
                let valid = validate_fail_closed(self.validator.as_ref(), &entry.schema_url, &resource.url).await;
                let link = ui_link(&self.validator_ui_url, &resource.url, &entry.schema_url);
                (Some(valid), Some(link))
            }
            SchemaType::Other(_) => (None, None),
        };

        ClassificationResult {
            resource_name: resource.name.clone(),
            schema_title: entry.title.clone(),
            is_declared: true,
            validity,
            validata_link,
            via_publication_tool,
        }
    }

    /// Best resource-name/schema-title pair, if it clears the threshold.
    pub fn suspect(&self, catalog: &[SchemaCatalogEntry], resources: &[Resource]) -> Option<SchemaSuspicion> {
        let names: Vec<&str> = resources.iter().map(|r| r.name.as_str()).collect();
        let titles: Vec<&str> = catalog.iter().map(|s| s.title.as_str()).collect();

        let best = self.matcher.find_best_match(&names, &titles)?;
        if !self.matcher.is_match(best.score) {
            debug!("Best schema score {:.3} below threshold", best.score);
            return None;
        }

        let resource = &resources[best.query_index];
        Some(SchemaSuspicion {
            schema_title: catalog[best.candidate_index].title.clone(),
            score: best.score,
            resource_name: resource.name.clone(),
            resource_url: resource.url.clone(),
        })
    }
}
