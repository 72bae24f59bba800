use dgv_pipelines::agence_bio::{AgenceBioClient, AgenceBioJob, LocalObjectStore};
use dgv_pipelines::catalog::HttpSchemaRegistry;
use dgv_pipelines::checkpoint::CheckpointStore;
use dgv_pipelines::classifier::SchemaClassifier;
use dgv_pipelines::config::Config;
use dgv_pipelines::fuzzy_matcher::FuzzyMatcher;
use dgv_pipelines::logging;
use dgv_pipelines::notifier::{Channel, LogSink, MattermostSink, MessageSink, Notifier};
use dgv_pipelines::platform::DataGouvClient;
use dgv_pipelines::poller::ChangePoller;
use dgv_pipelines::run::RunContext;
use dgv_pipelines::validator::ValidataClient;
use dgv_pipelines::watcher::ActivityWatcher;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "dgv-pipelines")]
#[command(about = "Open-data platform batch jobs: activity watcher and Agence Bio ETL")]
#[command(version)]
struct Args {
    /// Log notifications instead of posting them
    #[arg(long, global = true)]
    dry_run: bool,

    /// Log filter when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Announce new datasets, reuses and organizations and analyse dataset schemas
    Watch {
        /// Watermark file; the window then starts where the last run ended
        #[arg(long)]
        state_file: Option<PathBuf>,

        /// Trailing window length when no watermark is available
        #[arg(long)]
        window_minutes: Option<u64>,
    },
    /// Harvest Agence Bio operators and publish the CSV extracts
    AgenceBio {
        /// Directory the extracts are written to before upload
        #[arg(long)]
        work_dir: Option<PathBuf>,

        /// Root directory of the object store
        #[arg(long)]
        storage_root: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let args = Args::parse();
    logging::init(&args.log_level);

    let mut config = Config::from_env()?;

    let required: &[Channel] = match args.command {
        Commands::Watch { .. } => &[Channel::Activity, Channel::SchemaActivity],
        Commands::AgenceBio { .. } => &[Channel::Pipelines],
    };
    let sink: Arc<dyn MessageSink> = if args.dry_run {
        Arc::new(LogSink)
    } else {
        config.channels.ensure_configured(required)?;
        Arc::new(MattermostSink::new(config.http_timeout)?)
    };

    match args.command {
        Commands::Watch { state_file, window_minutes } => {
            if let Some(path) = state_file {
                config.watcher.state_file = Some(path);
            }
            if let Some(minutes) = window_minutes {
                config.watcher.poll_window = Duration::from_secs(minutes * 60);
            }
            run_watch(config, sink).await
        }
        Commands::AgenceBio { work_dir, storage_root } => {
            if let Some(dir) = work_dir {
                config.agence_bio.work_dir = dir;
            }
            if let Some(dir) = storage_root {
                config.agence_bio.storage_root = dir;
            }
            run_agence_bio(config, sink).await
        }
    }
}

async fn run_watch(config: Config, sink: Arc<dyn MessageSink>) -> Result<()> {
    let wc = &config.watcher;
    let platform = Arc::new(DataGouvClient::new(wc, config.http_timeout)?);
    let registry = Arc::new(HttpSchemaRegistry::new(&wc.schema_catalog_url, config.http_timeout)?);
    let validator = Arc::new(ValidataClient::new(&wc.validator_api_url, config.http_timeout)?);
    let notifier = Arc::new(Notifier::new(sink, config.channels.clone(), &wc.publication_tool));

    let classifier = SchemaClassifier::new(
        platform.clone(),
        validator,
        notifier.clone(),
        FuzzyMatcher::new(wc.similarity_threshold, wc.similarity_metric),
        &wc.publication_tool,
        &wc.validator_ui_url,
    );
    let mut watcher = ActivityWatcher::new(
        ChangePoller::new(platform),
        registry,
        classifier,
        notifier,
        wc.poll_window,
    );
    if let Some(path) = &wc.state_file {
        info!("Using watermark file {:?}", path);
        watcher = watcher.with_checkpoints(CheckpointStore::new(path));
    }

    let ctx = RunContext::new("watch", config.run_timeout);
    let report = ctx.execute(watcher.run(chrono::Utc::now())).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run_agence_bio(config: Config, sink: Arc<dyn MessageSink>) -> Result<()> {
    let ac = &config.agence_bio;
    let source = Arc::new(AgenceBioClient::new(ac, config.http_timeout)?);
    let store = Arc::new(LocalObjectStore::new(&ac.storage_root, &ac.bucket));
    let notifier = Arc::new(Notifier::new(
        sink,
        config.channels.clone(),
        &config.watcher.publication_tool,
    ));

    let job = AgenceBioJob::new(source, store, notifier, ac);
    let ctx = RunContext::new("agence-bio", config.run_timeout);
    let report = ctx.execute(job.run()).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
