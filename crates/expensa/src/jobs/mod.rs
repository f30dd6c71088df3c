//! Job status store and the polling service on top of it.

use async_trait::async_trait;
use thiserror::Error;

use crate::db::DatabaseError;
use crate::model::job::JobRecord;

pub mod memory;
pub mod service;
pub mod sqlite;

pub use memory::MemoryJobStore;
pub use service::{JobStatusService, PollResponse, PollStatus};
pub use sqlite::SqliteJobStore;

#[derive(Error, Debug)]
pub enum JobStoreError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job store database error: {0}")]
    Database(#[from] DatabaseError),
}

/// `put` replaces any existing record with the same job id.
#[async_trait]
pub trait JobStatusStore: Send + Sync {
    async fn put(&self, record: &JobRecord) -> Result<(), JobStoreError>;

    async fn get(&self, job_id: &str) -> Result<JobRecord, JobStoreError>;
}
