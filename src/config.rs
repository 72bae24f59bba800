//! Runtime configuration for both jobs.
//!
//! Every value is read from the process environment (`main` loads a `.env`
//! file first) and falls back to the production platform defaults. Components
//! receive the section they need at construction; nothing reads the
//! environment after startup.

use crate::error::{PipelineError, Result};
use crate::fuzzy_matcher::SimilarityMetric;
use crate::notifier::Channel;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "https://www.data.gouv.fr/api/1";
pub const DEFAULT_SCHEMA_CATALOG_URL: &str = "https://schema.data.gouv.fr/schemas/schemas.json";
pub const DEFAULT_VALIDATOR_API_URL: &str = "https://api.validata.etalab.studio/validate";
pub const DEFAULT_VALIDATOR_UI_URL: &str = "https://validata.fr/table-schema";
pub const DEFAULT_PUBLICATION_TOOL: &str = "publier.etalab.studio";
pub const DEFAULT_AGENCE_BIO_URL: &str = "https://opendata.agencebio.org/api/gouv/operateurs/";

/// Departement codes requested from the Agence Bio API (metropolitan and overseas).
pub const AGENCE_BIO_DEPARTEMENTS: &[&str] = &[
    "01", "02", "03", "04", "05", "06", "07", "08", "09", "10", "11", "12", "13", "14", "15",
    "16", "17", "18", "19", "21", "22", "23", "24", "25", "26", "27", "28", "29", "2A", "2B",
    "30", "31", "32", "33", "34", "35", "36", "37", "38", "39", "40", "41", "42", "43", "44",
    "45", "46", "47", "48", "49", "50", "51", "52", "53", "54", "55", "56", "57", "58", "59",
    "60", "61", "62", "63", "64", "65", "66", "67", "68", "69", "70", "71", "72", "73", "74",
    "75", "76", "77", "78", "79", "80", "81", "82", "83", "84", "85", "86", "87", "88", "89",
    "90", "91", "92", "93", "94", "95", "971", "972", "973", "974", "976", "977", "978", "984",
    "986", "987", "988", "989",
];

/// Chat destinations, one webhook URL per message category.
#[derive(Debug, Clone, Default)]
pub struct ChannelConfig {
    /// New datasets, reuses and organizations
    pub activity: String,
    /// Declared and suspected schema findings
    pub schema_activity: String,
    /// ETL status messages
    pub pipelines: String,
}

impl ChannelConfig {
    pub fn webhook(&self, channel: Channel) -> &str {
        match channel {
            Channel::Activity => &self.activity,
            Channel::SchemaActivity => &self.schema_activity,
            Channel::Pipelines => &self.pipelines,
        }
    }

    /// Fail fast when one of `required` has no webhook configured.
    pub fn ensure_configured(&self, required: &[Channel]) -> Result<()> {
        let missing: Vec<&str> = required
            .iter()
            .filter(|c| self.webhook(**c).is_empty())
            .map(Channel::env_key)
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        Err(PipelineError::Config(format!(
            "Missing webhook configuration: {}",
            missing.join(", ")
        )))
    }
}

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub api_base_url: String,
    /// Path segment of public dataset pages, replaced by `api_segment`
    /// to obtain the detail endpoint.
    pub page_segment: String,
    pub api_segment: String,
    pub page_size: u32,
    pub schema_catalog_url: String,
    pub validator_api_url: String,
    pub validator_ui_url: String,
    pub publication_tool: String,
    /// Suspicion is raised only when the best score is strictly greater.
    pub similarity_threshold: f64,
    pub similarity_metric: SimilarityMetric,
    pub poll_window: Duration,
    /// Watermark file; when absent the trailing `poll_window` is used.
    pub state_file: Option<PathBuf>,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            page_segment: "/fr/".to_string(),
            api_segment: "/api/1/".to_string(),
            page_size: 100,
            schema_catalog_url: DEFAULT_SCHEMA_CATALOG_URL.to_string(),
            validator_api_url: DEFAULT_VALIDATOR_API_URL.to_string(),
            validator_ui_url: DEFAULT_VALIDATOR_UI_URL.to_string(),
            publication_tool: DEFAULT_PUBLICATION_TOOL.to_string(),
            similarity_threshold: 0.6,
            similarity_metric: SimilarityMetric::SequenceRatio,
            poll_window: Duration::from_secs(60 * 60),
            state_file: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AgenceBioConfig {
    pub api_url: String,
    pub page_size: u32,
    pub departements: Vec<String>,
    /// Local directory the extracts are written to before publication.
    pub work_dir: PathBuf,
    /// Root directory of the object store (one sub-directory per bucket).
    pub storage_root: PathBuf,
    pub bucket: String,
    pub prefix: String,
}

impl Default for AgenceBioConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_AGENCE_BIO_URL.to_string(),
            page_size: 1000,
            departements: AGENCE_BIO_DEPARTEMENTS.iter().map(|d| d.to_string()).collect(),
            work_dir: std::env::temp_dir().join("dgv-pipelines"),
            storage_root: PathBuf::from("storage"),
            bucket: "data-pipeline-open".to_string(),
            prefix: "agence_bio".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub watcher: WatcherConfig,
    pub agence_bio: AgenceBioConfig,
    pub channels: ChannelConfig,
    pub http_timeout: Duration,
    /// Wall-clock bound for one job run.
    pub run_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            watcher: WatcherConfig::default(),
            agence_bio: AgenceBioConfig::default(),
            channels: ChannelConfig::default(),
            http_timeout: Duration::from_secs(30),
            run_timeout: Duration::from_secs(60 * 60),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup, starting from defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Config::default();

        let w = &mut cfg.watcher;
        set_string(&lookup, "DGV_API_BASE_URL", &mut w.api_base_url);
        set_string(&lookup, "DGV_PAGE_SEGMENT", &mut w.page_segment);
        set_string(&lookup, "DGV_API_SEGMENT", &mut w.api_segment);
        set_parsed(&lookup, "DGV_PAGE_SIZE", &mut w.page_size)?;
        set_string(&lookup, "SCHEMA_CATALOG_URL", &mut w.schema_catalog_url);
        set_string(&lookup, "VALIDATA_API_URL", &mut w.validator_api_url);
        set_string(&lookup, "VALIDATA_UI_URL", &mut w.validator_ui_url);
        set_string(&lookup, "PUBLICATION_TOOL", &mut w.publication_tool);
        set_parsed(&lookup, "SIMILARITY_THRESHOLD", &mut w.similarity_threshold)?;
        set_parsed(&lookup, "SIMILARITY_METRIC", &mut w.similarity_metric)?;
        if let Some(minutes) = parse_opt::<u64, _>(&lookup, "POLL_WINDOW_MINUTES")? {
            w.poll_window = Duration::from_secs(minutes * 60);
        }
        if let Some(path) = lookup("WATCH_STATE_FILE").filter(|v| !v.is_empty()) {
            w.state_file = Some(PathBuf::from(path));
        }
        if !(0.0..=1.0).contains(&w.similarity_threshold) {
            return Err(PipelineError::Config(format!(
                "SIMILARITY_THRESHOLD must be within [0, 1], got {}",
                w.similarity_threshold
            )));
        }

        let a = &mut cfg.agence_bio;
        set_string(&lookup, "AGENCE_BIO_API_URL", &mut a.api_url);
        set_parsed(&lookup, "AGENCE_BIO_PAGE_SIZE", &mut a.page_size)?;
        if let Some(dir) = lookup("AIRFLOW_DAG_TMP").filter(|v| !v.is_empty()) {
            a.work_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("STORAGE_ROOT").filter(|v| !v.is_empty()) {
            a.storage_root = PathBuf::from(dir);
        }
        set_string(&lookup, "STORAGE_BUCKET", &mut a.bucket);

        let c = &mut cfg.channels;
        set_string(&lookup, Channel::Activity.env_key(), &mut c.activity);
        set_string(&lookup, Channel::SchemaActivity.env_key(), &mut c.schema_activity);
        set_string(&lookup, Channel::Pipelines.env_key(), &mut c.pipelines);

        if let Some(secs) = parse_opt::<u64, _>(&lookup, "HTTP_TIMEOUT_SECS")? {
            cfg.http_timeout = Duration::from_secs(secs);
        }
        if let Some(minutes) = parse_opt::<u64, _>(&lookup, "RUN_TIMEOUT_MINUTES")? {
            cfg.run_timeout = Duration::from_secs(minutes * 60);
        }

        Ok(cfg)
    }
}

fn set_string<F>(lookup: &F, key: &str, target: &mut String)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
        *target = value;
    }
}

fn set_parsed<T, F>(lookup: &F, key: &str, target: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = parse_opt(lookup, key)? {
        *target = value;
    }
    Ok(())
}

fn parse_opt<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).filter(|v| !v.is_empty()) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| PipelineError::Config(format!("Invalid value for {}: {} ({})", key, raw, e))),
        None => Ok(None),
    }
}
