//! Agence Bio ETL
//!
//! Harvests organic-farming operators, writes four CSV extracts, publishes
//! them under `<prefix>/new/` and promotes them to `<prefix>/latest/` only
//! when the principal extract changed.

pub mod harvest;
pub mod records;
pub mod storage;

pub use harvest::{harvest_all, AgenceBioClient, OperatorSource};
pub use records::{Extracts, Operator, EXTRACT_FILES, PRINCIPAL_FILE};
pub use storage::{LocalObjectStore, ObjectStore};

use crate::config::AgenceBioConfig;
use crate::error::Result;
use crate::notifier::Notifier;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgenceBioReport {
    pub operators: usize,
    pub distinct_id_bio: usize,
    pub distinct_siret: usize,
    /// False when the principal extract was unchanged
    pub promoted: bool,
}

pub struct AgenceBioJob {
    source: Arc<dyn OperatorSource>,
    store: Arc<dyn ObjectStore>,
    notifier: Arc<Notifier>,
    work_dir: PathBuf,
    prefix: String,
}

impl AgenceBioJob {
    pub fn new(
        source: Arc<dyn OperatorSource>,
        store: Arc<dyn ObjectStore>,
        notifier: Arc<Notifier>,
        config: &AgenceBioConfig,
    ) -> Self {
        Self {
            source,
            store,
            notifier,
            work_dir: config.work_dir.join(&config.prefix),
            prefix: config.prefix.clone(),
        }
    }

    fn new_path(&self) -> String {
        format!("{}/new/", self.prefix)
    }

    fn latest_path(&self) -> String {
        format!("{}/latest/", self.prefix)
    }

    pub async fn run(&self) -> Result<AgenceBioReport> {
        let operators = harvest_all(self.source.as_ref()).await?;
        let extracts = Extracts::from_operators(&operators);
        let files = extracts.write_csv(&self.work_dir)?;

        let report = AgenceBioReport {
            operators: extracts.operators.len(),
            distinct_id_bio: extracts.distinct_id_bio(),
            distinct_siret: extracts.distinct_siret(),
            promoted: false,
        };

        let new_path = self.new_path();
        for (file, name) in files.iter().zip(EXTRACT_FILES) {
            self.store.put(file, &new_path, name)?;
        }

        let latest_path = self.latest_path();
        match self
            .store
            .compare(&new_path, PRINCIPAL_FILE, &latest_path, PRINCIPAL_FILE)?
        {
            Some(true) => {
                info!("Principal extract unchanged, nothing to promote");
                return Ok(report);
            }
            Some(false) => info!("Principal extract changed, promoting to {}", latest_path),
            None => info!("No previous extract in {}, creating it", latest_path),
        }

        for (file, name) in files.iter().zip(EXTRACT_FILES) {
            self.store.put(file, &latest_path, name)?;
        }
        self.notifier
            .agence_bio_updated(report.distinct_id_bio, report.distinct_siret, &self.store.describe())
            .await?;

        Ok(AgenceBioReport {
            promoted: true,
            ..report
        })
    }
}
