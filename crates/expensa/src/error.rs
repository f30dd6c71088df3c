use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExpensaError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Analysis backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Rendering error: {0}")]
    Render(#[from] RenderError),

    #[error("Submission error: {0}")]
    Submit(#[from] SubmitError),

    #[error("Completion pipeline error: {0}")]
    Pipeline(#[from] crate::pipeline::PipelineError),

    #[error("Job store error: {0}")]
    JobStore(#[from] crate::jobs::JobStoreError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Secret resolution failed: {0}")]
    Secret(#[from] crate::secrets::SecretError),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid object key '{0}'")]
    InvalidKey(String),

    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write object '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read object '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize object '{key}': {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Backend rejected the request: {0}")]
    Rejected(String),

    #[error("Backend request failed: {0}")]
    Transport(String),

    #[error("Backend returned an unreadable response: {0}")]
    InvalidResponse(String),

    #[error("Unknown analysis job: {0}")]
    UnknownJob(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::InvalidResponse(err.to_string())
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to decode source image: {0}")]
    Decode(String),

    #[error("Failed to rasterize PDF: {0}")]
    Rasterize(String),

    #[error("Page count mismatch: analysis has {analyzed} pages, document has {rendered}")]
    PageCountMismatch { analyzed: usize, rendered: usize },

    #[error("Failed to encode page {page} as PNG: {reason}")]
    Encode { page: usize, reason: String },

    #[error("Failed to store rendered page: {0}")]
    Storage(#[from] StorageError),

    #[error("Render task failed: {0}")]
    Task(String),
}

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Connection '{0}' is gone")]
    Gone(String),

    #[error("Delivery to '{connection_id}' timed out after {timeout_ms}ms")]
    Timeout {
        connection_id: String,
        timeout_ms: u64,
    },

    #[error("Delivery failed: {0}")]
    Failed(String),
}

/// Batch-level rejection. Per-document problems are reported in the
/// submission outcome instead.
#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Upload rejected: {0}")]
    Rejected(crate::model::upload::DocumentError),
}

pub type Result<T> = std::result::Result<T, ExpensaError>;
