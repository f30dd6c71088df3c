use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};

use expensa::config::{load_config, Config};
use expensa::db::Database;
use expensa::error::{ConfigError, ExpensaError, SubmitError};
use expensa::jobs::{JobStatusService, JobStoreError, SqliteJobStore};
use expensa::logging::{self, LogFormat};
use expensa::model::{CompletionSignal, DocumentError, DocumentUpload, UploadBatch, UploadRequest};
use expensa::notify::{
    HttpPushChannel, LocalPushChannel, MemoryRegistry, NotificationFanout, PushChannel,
    SqliteRegistry, SubscriberRegistry,
};
use expensa::orchestrator::JobOrchestrator;
use expensa::pipeline::{Collaborators, CompletionHandler};
use expensa::render::{PageRenderer, PopplerRasterizer};
use expensa::storage::{FileStore, KeyLayout};
use expensa::worker::CompletionWorker;
use expensa::HttpAnalysisBackend;

/// expensa - expense document analysis pipeline
#[derive(Parser, Debug)]
#[command(name = "expensa")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the JSON configuration file. Built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log output format (human, json)
    #[arg(long, default_value = "human")]
    log_format: LogFormat,

    /// Default log filter, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Store and dispatch a batch of documents
    Submit {
        #[arg(long)]
        tenant: String,

        #[arg(long)]
        subject: String,

        /// Upload request JSON: {"documents":[{"file_name":..,"file":<base64>}]}
        #[arg(long, conflicts_with = "files")]
        request: Option<PathBuf>,

        /// Document files to upload
        files: Vec<PathBuf>,
    },

    /// Handle completion signals read as JSON lines from stdin
    Complete {
        /// Signals handled concurrently
        #[arg(long, default_value_t = 4)]
        concurrency: usize,
    },

    /// Print the current state of a job
    Poll { job_id: String },

    /// Manage push subscribers
    Subscribers {
        #[command(subcommand)]
        action: SubscriberAction,
    },
}

#[derive(Subcommand, Debug)]
enum SubscriberAction {
    List,
    Add { connection_id: String },
    Remove { connection_id: String },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Expensa(#[from] ExpensaError),

    #[error("Failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read stdin: {0}")]
    Stdin(#[source] std::io::Error),

    #[error("Invalid upload request: {0}")]
    Request(#[source] serde_json::Error),

    #[error("Failed to write output: {0}")]
    Output(#[source] serde_json::Error),
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        CliError::Expensa(err.into())
    }
}

impl From<JobStoreError> for CliError {
    fn from(err: JobStoreError) -> Self {
        CliError::Expensa(err.into())
    }
}

#[derive(Serialize)]
struct RejectedBatch<'a> {
    errors: [&'a DocumentError; 1],
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.log_format, &cli.log_level) {
        eprintln!("warning: {}", e);
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, CliError> {
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Submit {
            tenant,
            subject,
            request,
            files,
        } => submit(&config, &tenant, &subject, request.as_deref(), &files).await,
        Commands::Complete { concurrency } => complete(&config, concurrency).await,
        Commands::Poll { job_id } => poll(&config, &job_id).await,
        Commands::Subscribers { action } => subscribers(&config, action).await,
    }
}

fn open_database(config: &Config) -> Result<Database, ExpensaError> {
    let path = config
        .database
        .resolved_path()
        .ok_or_else(|| ConfigError::Validation {
            message: "cannot determine database path, set database.path".to_string(),
        })?;
    Ok(Database::open(&path)?)
}

/// Without a push endpoint nobody can be reached, so deliveries go to an
/// empty in-process registry and the persisted subscribers stay untouched.
fn push_target(
    config: &Config,
    db: &Database,
) -> Result<(Arc<dyn SubscriberRegistry>, Arc<dyn PushChannel>), ExpensaError> {
    if config.push.endpoint.is_some() {
        let channel = HttpPushChannel::from_config(&config.push)?;
        Ok((Arc::new(SqliteRegistry::new(db.clone())), Arc::new(channel)))
    } else {
        tracing::warn!("push.endpoint not configured, notifications are not delivered");
        Ok((
            Arc::new(MemoryRegistry::new()),
            Arc::new(LocalPushChannel::new()),
        ))
    }
}

fn collaborators(config: &Config, db: &Database) -> Result<Collaborators, ExpensaError> {
    let store = Arc::new(FileStore::new(&config.storage.root));
    let layout = KeyLayout::from_config(&config.storage);
    let backend = Arc::new(HttpAnalysisBackend::from_config(&config.backend)?);
    let renderer = Arc::new(PageRenderer::new(
        store.clone(),
        Arc::new(PopplerRasterizer::new()),
        layout.clone(),
        &config.render,
    ));
    let (registry, channel) = push_target(config, db)?;

    Ok(Collaborators {
        store,
        backend,
        jobs: Arc::new(SqliteJobStore::new(db.clone())),
        renderer,
        fanout: NotificationFanout::new(registry, channel, &config.notify),
        layout,
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value).map_err(CliError::Output)?;
    println!("{}", json);
    Ok(())
}

async fn read_batch(request: Option<&Path>, files: &[PathBuf]) -> Result<UploadBatch, CliError> {
    if let Some(path) = request {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CliError::Read {
                path: path.to_path_buf(),
                source: e,
            })?;
        let request: UploadRequest = serde_json::from_str(&content).map_err(CliError::Request)?;
        return Ok(request.into_batch());
    }

    let mut documents = Vec::with_capacity(files.len());
    for path in files {
        let bytes = tokio::fs::read(path).await.map_err(|e| CliError::Read {
            path: path.clone(),
            source: e,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        documents.push(DocumentUpload::new(file_name, bytes));
    }
    Ok(UploadBatch::new(documents))
}

async fn submit(
    config: &Config,
    tenant: &str,
    subject: &str,
    request: Option<&Path>,
    files: &[PathBuf],
) -> Result<ExitCode, CliError> {
    let batch = read_batch(request, files).await?;
    let db = open_database(config)?;
    let orchestrator = JobOrchestrator::new(collaborators(config, &db)?, config);

    match orchestrator.submit(batch, tenant, subject).await {
        Ok(outcome) => {
            print_json(&outcome)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(SubmitError::Rejected(err)) => {
            print_json(&RejectedBatch { errors: [&err] })?;
            Ok(ExitCode::from(2))
        }
    }
}

async fn complete(config: &Config, concurrency: usize) -> Result<ExitCode, CliError> {
    let db = open_database(config)?;
    let handler = Arc::new(CompletionHandler::new(collaborators(config, &db)?));
    let (tx, worker) = CompletionWorker::new(handler, concurrency).spawn(concurrency * 2);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.map_err(CliError::Stdin)? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match CompletionSignal::parse(line) {
            Ok(signal) => {
                if tx.send(signal).await.is_err() {
                    tracing::error!("Completion worker stopped early");
                    break;
                }
            }
            Err(e) => tracing::warn!(error = %e, "Skipping unreadable completion signal"),
        }
    }
    drop(tx);

    let summary = match worker.await {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!(error = %e, "Completion worker panicked");
            return Ok(ExitCode::FAILURE);
        }
    };
    println!(
        "received={} completed={} failed={} errors={} delivered={} pruned={}",
        summary.received,
        summary.completed,
        summary.failed,
        summary.errors,
        summary.delivered,
        summary.pruned
    );

    Ok(if summary.errors == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn poll(config: &Config, job_id: &str) -> Result<ExitCode, CliError> {
    let db = open_database(config)?;
    let service = JobStatusService::new(Arc::new(SqliteJobStore::new(db)));

    match service.poll(job_id).await {
        Ok(response) => {
            print_json(&response)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(JobStoreError::NotFound(id)) => {
            eprintln!("job '{}' not found", id);
            Ok(ExitCode::from(3))
        }
        Err(e) => Err(e.into()),
    }
}

async fn subscribers(config: &Config, action: SubscriberAction) -> Result<ExitCode, CliError> {
    let db = open_database(config)?;
    let registry = SqliteRegistry::new(db);

    let result = match action {
        SubscriberAction::List => registry.list_active().await.map(|ids| {
            for id in ids {
                println!("{}", id);
            }
        }),
        SubscriberAction::Add { connection_id } => registry.register(&connection_id).await,
        SubscriberAction::Remove { connection_id } => {
            registry.remove(&connection_id).await.map(|removed| {
                if !removed {
                    eprintln!("connection '{}' was not registered", connection_id);
                }
            })
        }
    };

    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("error: {}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}
