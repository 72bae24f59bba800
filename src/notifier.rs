//! Chat notifications
//!
//! Messages are plain Mattermost markdown. Each category goes to its own
//! channel; delivery is fire-and-forget with no retry.

use crate::classifier::{ClassificationResult, SchemaSuspicion};
use crate::config::ChannelConfig;
use crate::error::{PipelineError, Result};
use crate::models::{Item, ItemKind, OrganizationInfo};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// New datasets, reuses and organizations
    Activity,
    /// Schema findings
    SchemaActivity,
    /// ETL job status
    Pipelines,
}

impl Channel {
    /// Environment variable holding the channel webhook
    pub fn env_key(&self) -> &'static str {
        match self {
            Channel::Activity => "MATTERMOST_DATAGOUV_ACTIVITES",
            Channel::SchemaActivity => "MATTERMOST_DATAGOUV_SCHEMA_ACTIVITE",
            Channel::Pipelines => "MATTERMOST_DATAGOUV_DATAENG",
        }
    }
}

#[async_trait]
pub trait MessageSink: Send + Sync {
    /// `destination` is the configured webhook of the channel
    async fn send(&self, text: &str, destination: &str) -> Result<()>;
}

/// Posts to Mattermost incoming webhooks.
pub struct MattermostSink {
    client: Client,
}

impl MattermostSink {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Notification(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl MessageSink for MattermostSink {
    async fn send(&self, text: &str, destination: &str) -> Result<()> {
        if destination.is_empty() {
            return Err(PipelineError::Notification(
                "No webhook configured for this channel".to_string(),
            ));
        }
        self.client
            .post(destination)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| PipelineError::Notification(format!("Webhook post failed: {}", e)))?;
        Ok(())
    }
}

/// Dry-run sink: logs messages instead of posting them.
pub struct LogSink;

#[async_trait]
impl MessageSink for LogSink {
    async fn send(&self, text: &str, destination: &str) -> Result<()> {
        info!(destination, "[dry-run] {}", text);
        Ok(())
    }
}

pub struct Notifier {
    sink: Arc<dyn MessageSink>,
    channels: ChannelConfig,
    publication_tool: String,
}

impl Notifier {
    pub fn new(sink: Arc<dyn MessageSink>, channels: ChannelConfig, publication_tool: impl Into<String>) -> Self {
        Self {
            sink,
            channels,
            publication_tool: publication_tool.into(),
        }
    }

    pub async fn send(&self, text: &str, channel: Channel) -> Result<()> {
        debug!(?channel, "Sending notification");
        self.sink.send(text, self.channels.webhook(channel)).await
    }

    /// One message per item; returns how many were sent.
    pub async fn announce_items(&self, kind: ItemKind, items: &[Item]) -> Result<usize> {
        for item in items {
            self.send(&new_item_message(kind, item), Channel::Activity).await?;
        }
        Ok(items.len())
    }

    pub async fn declared_schema(
        &self,
        result: &ClassificationResult,
        dataset: &Item,
        orga: &OrganizationInfo,
    ) -> Result<()> {
        let text = declared_schema_message(result, dataset, orga, &self.publication_tool);
        self.send(&text, Channel::SchemaActivity).await
    }

    pub async fn suspected_schema(&self, suspicion: &SchemaSuspicion, orga: &OrganizationInfo) -> Result<()> {
        self.send(&suspected_schema_message(suspicion, orga), Channel::SchemaActivity)
            .await
    }

    pub async fn agence_bio_updated(&self, nb_id_bio: usize, nb_siret: usize, storage: &str) -> Result<()> {
        self.send(&agence_bio_message(nb_id_bio, nb_siret, storage), Channel::Pipelines)
            .await
    }
}

pub fn new_item_message(kind: ItemKind, item: &Item) -> String {
    let label = match kind {
        ItemKind::Datasets => ":label: Nouveau **Jeu de données**",
        ItemKind::Organizations => ":office: Nouvelle **organisation**",
        ItemKind::Reuses => ":art: Nouvelle **réutilisation**",
    };
    format!(
        ":loudspeaker: {} : *{}* \n\n\n:point_right: {}",
        label,
        item.name,
        item.page.as_deref().unwrap_or_default()
    )
}

pub fn declared_schema_message(
    result: &ClassificationResult,
    dataset: &Item,
    orga: &OrganizationInfo,
    publication_tool: &str,
) -> String {
    let mut message = format!(
        ":mega: Nouvelle ressource déclarée appartenant au schéma **{}** {}: \n - [Lien vers le jeu de donnée]({})",
        result.schema_title,
        orga,
        dataset.page.as_deref().unwrap_or_default()
    );
    if let Some(valid) = result.validity {
        let link = result.validata_link.as_deref().unwrap_or_default();
        if valid {
            message.push_str(&format!("\n - [Ressource valide]({}) :partying_face:", link));
        } else {
            message.push_str(&format!("\n - [Ressource non valide]({}) :weary:", link));
        }
    }
    if result.via_publication_tool {
        message.push_str(&format!("\n - Made with {} :doge-cool:", publication_tool));
    }
    message
}

pub fn suspected_schema_message(suspicion: &SchemaSuspicion, orga: &OrganizationInfo) -> String {
    format!(
        ":mega: Nouveau jeu de donnée suspecté d'appartenir au schéma **{}** {}: \n - [{}]({})",
        suspicion.schema_title, orga, suspicion.resource_name, suspicion.resource_url
    )
}

pub fn agence_bio_message(nb_id_bio: usize, nb_siret: usize, storage: &str) -> String {
    format!(
        ":mega: Données Agence Bio (certificats professionnels Bio) mises à jour.\n\
         - {} identifiants Bio référencés\n\
         - {} établissements (siret) représentés\n\
         - Données stockées sur {}",
        nb_id_bio, nb_siret, storage
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> Item {
        Item {
            name: "Dataset A".to_string(),
            page: Some("https://data.example/fr/datasets/a".to_string()),
        }
    }

    #[test]
    fn test_new_item_messages() {
        let msg = new_item_message(ItemKind::Datasets, &dataset());
        assert_eq!(
            msg,
            ":loudspeaker: :label: Nouveau **Jeu de données** : *Dataset A* \n\n\n:point_right: \
             https://data.example/fr/datasets/a"
        );
        let reuse = Item { name: "Carte".to_string(), page: None };
        assert!(new_item_message(ItemKind::Reuses, &reuse).contains("Nouvelle **réutilisation** : *Carte*"));
        assert!(new_item_message(ItemKind::Organizations, &reuse).contains(":office:"));
    }

    #[test]
    fn test_declared_schema_message_variants() {
        let orga = OrganizationInfo::default();
        let mut result = ClassificationResult {
            resource_name: "export.csv".to_string(),
            schema_title: "IRVE statique".to_string(),
            is_declared: true,
            validity: None,
            validata_link: None,
            via_publication_tool: false,
        };
        let plain = declared_schema_message(&result, &dataset(), &orga, "publier.etalab.studio");
        assert!(plain.contains("**IRVE statique**"));
        assert!(!plain.contains("Ressource"));

        result.validity = Some(false);
        result.validata_link = Some("https://validata.fr/table-schema?input=url".to_string());
        result.via_publication_tool = true;
        let full = declared_schema_message(&result, &dataset(), &orga, "publier.etalab.studio");
        assert!(full.contains("[Ressource non valide](https://validata.fr/table-schema?input=url) :weary:"));
        assert!(full.ends_with("\n - Made with publier.etalab.studio :doge-cool:"));
    }

    #[test]
    fn test_agence_bio_message() {
        let msg = agence_bio_message(120, 98, "data-pipeline-open");
        assert!(msg.contains("- 120 identifiants Bio référencés\n"));
        assert!(msg.contains("- 98 établissements (siret) représentés\n"));
        assert!(msg.ends_with("Données stockées sur data-pipeline-open"));
    }
}
