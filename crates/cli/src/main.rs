mod backend;
mod extract;
mod host;
mod metrics;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docflow_core::{
    load_config_or_default, validate_config, BatchOrchestrator, BatchProgress, BatchRequest,
    BatchStatus, Item, StopHandle,
};

use backend::{LlmAnalyzer, LlmClient, LlmRanker, OllamaClient};
use extract::PlainTextExtractor;
use host::SystemResources;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Score documents against a job description with a local model.
#[derive(Debug, Parser)]
#[command(name = "docflow", version)]
#[command(about = "Analyze and rank documents against a job description", long_about = None)]
struct Args {
    /// Print Prometheus metrics to stderr after the run
    #[arg(long)]
    metrics: bool,

    /// Job description text file
    job_description: PathBuf,

    /// Documents to analyze
    #[arg(required = true)]
    documents: Vec<PathBuf>,
}

/// Builds an item from a document on disk.
fn load_item(path: &Path) -> Result<Item> {
    let data = std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
    let id = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let name = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| id.clone());

    Ok(Item::new(id, name, data).with_metadata("path", path.display().to_string()))
}

fn load_items(paths: &[PathBuf]) -> Vec<Item> {
    paths
        .iter()
        .filter_map(|path| match load_item(path) {
            Ok(item) => {
                metrics::DOCUMENTS_LOADED.with_label_values(&["ok"]).inc();
                Some(item)
            }
            Err(e) => {
                metrics::DOCUMENTS_LOADED.with_label_values(&["error"]).inc();
                warn!("Skipping document: {:#}", e);
                None
            }
        })
        .collect()
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = run(args).await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Determine config path
    let config_path = std::env::var("DOCFLOW_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("docflow.toml"));

    // Load configuration
    info!("docflow v{} loading configuration from {:?}", VERSION, config_path);
    let config = load_config_or_default(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Invalid configuration")?;

    let job_description = std::fs::read_to_string(&args.job_description).with_context(|| {
        format!("Failed to read job description {:?}", args.job_description)
    })?;
    if job_description.trim().is_empty() {
        bail!("Job description {:?} is empty", args.job_description);
    }

    let items = load_items(&args.documents);
    if items.is_empty() {
        bail!("None of the {} documents could be read", args.documents.len());
    }

    // Backend
    let backend_config = config.backend.clone().unwrap_or_default();
    let client: Arc<dyn LlmClient> =
        Arc::new(OllamaClient::new(&backend_config).context("Failed to create backend client")?);
    info!(
        "Using {} model {} at {}",
        client.provider(),
        client.model(),
        backend_config.url
    );

    let analyzer = LlmAnalyzer::new(Arc::clone(&client), job_description.clone())
        .with_temperature(backend_config.temperature);
    info!("Job description requires: {:?}", analyzer.required_skills());
    let ranker = LlmRanker::new(Arc::clone(&client), job_description);

    let orchestrator = BatchOrchestrator::new(
        config.orchestrator.clone(),
        Arc::new(PlainTextExtractor::default()),
        Arc::new(analyzer),
    )
    .with_resource_probe(Arc::new(SystemResources));

    // Progress reporting
    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<BatchProgress>();
    let progress_task = tokio::spawn(async move {
        while let Some(progress) = progress_rx.recv().await {
            info!("Progress: {}/{}", progress.completed, progress.total);
        }
    });

    // Stop admitting documents on Ctrl+C
    let stop = StopHandle::new();
    let stop_task = {
        let stop = stop.clone();
        tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, finishing in-flight documents");
                stop.stop();
            }
        })
    };

    let request = BatchRequest::new(items)
        .with_ranker(Arc::new(ranker))
        .with_progress(progress_tx)
        .with_stop(stop);
    let envelope = orchestrator
        .run_with(request)
        .await
        .context("Batch was rejected")?;

    stop_task.abort();
    let _ = progress_task.await;

    println!(
        "{}",
        serde_json::to_string_pretty(&envelope).context("Failed to serialize results")?
    );

    if args.metrics {
        eprintln!("{}", metrics::encode_metrics()?);
    }

    if envelope.status == BatchStatus::Failed {
        bail!("All {} documents failed", envelope.summary.total);
    }

    Ok(())
}
