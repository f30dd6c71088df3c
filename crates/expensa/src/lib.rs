pub mod backend;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod jobs;
pub mod logging;
pub mod model;
pub mod notify;
pub mod orchestrator;
pub mod pipeline;
pub mod render;
pub mod sanitize;
pub mod secrets;
pub mod storage;
pub mod worker;

pub use backend::{AnalysisBackend, DocumentRef, HttpAnalysisBackend, ResultPage};
pub use config::{load_config, Config};
pub use db::{Database, DatabaseError};
pub use error::{
    BackendError, ConfigError, DeliveryError, ExpensaError, RenderError, Result, StorageError,
    SubmitError,
};
pub use extract::extract;
pub use jobs::{JobStatusService, JobStatusStore, JobStoreError, MemoryJobStore, SqliteJobStore};
pub use model::{CompletionSignal, UploadBatch, UploadRequest};
pub use notify::{NotificationFanout, NotificationMessage, PushChannel, SubscriberRegistry};
pub use orchestrator::{JobOrchestrator, SubmitOutcome};
pub use pipeline::{Collaborators, CompletionHandler, CompletionOutcome, PipelineError};
pub use render::{PageRenderer, PopplerRasterizer, Rasterizer};
pub use secrets::{SecretError, SecretSource};
pub use storage::{DocumentStore, FileStore, KeyLayout, MemoryStore};
pub use worker::{CompletionWorker, WorkerSummary};
