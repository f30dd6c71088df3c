use thiserror::Error;

use crate::error::{BackendError, StorageError};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Cannot recover context for job '{job_id}': {reason}")]
    MissingContext { job_id: String, reason: String },

    #[error("Failed to fetch analysis results: {0}")]
    Backend(#[from] BackendError),

    #[error("Failed to persist analysis results: {0}")]
    Storage(#[from] StorageError),
}

/// Non-fatal problems recorded during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineWarning {
    JobStoreWrite { job_id: String, error: String },
}
