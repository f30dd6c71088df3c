use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{JobStatusStore, JobStoreError};
use crate::model::job::JobStatus;
use crate::notify::message::NotificationMessage;

/// Client-facing job status. In-flight jobs report `PENDING`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PollStatus {
    Pending,
    Completed,
    Failed,
}

impl From<JobStatus> for PollStatus {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Submitted | JobStatus::InProgress => PollStatus::Pending,
            JobStatus::Completed => PollStatus::Completed,
            JobStatus::Failed => PollStatus::Failed,
        }
    }
}

/// The notification shape plus the job's status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollResponse {
    pub status: PollStatus,
    #[serde(flatten)]
    pub message: NotificationMessage,
}

/// Read-only view over the job status store.
#[derive(Clone)]
pub struct JobStatusService {
    store: Arc<dyn JobStatusStore>,
}

impl JobStatusService {
    pub fn new(store: Arc<dyn JobStatusStore>) -> Self {
        Self { store }
    }

    pub async fn poll(&self, job_id: &str) -> Result<PollResponse, JobStoreError> {
        let record = self.store.get(job_id).await?;
        debug!(job_id = %job_id, status = record.status().as_str(), "Polled job");
        Ok(PollResponse {
            status: record.status().into(),
            message: NotificationMessage::from_record(&record),
        })
    }
}
