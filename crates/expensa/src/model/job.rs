use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::extraction::Extraction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Submitted,
    InProgress,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Submitted => "SUBMITTED",
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SUBMITTED" => Some(JobStatus::Submitted),
            "IN_PROGRESS" => Some(JobStatus::InProgress),
            "COMPLETED" => Some(JobStatus::Completed),
            "FAILED" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BoundingBoxStatus {
    Pending,
    Completed,
    Failed,
}

impl BoundingBoxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoundingBoxStatus::Pending => "PENDING",
            BoundingBoxStatus::Completed => "COMPLETED",
            BoundingBoxStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(BoundingBoxStatus::Pending),
            "COMPLETED" => Some(BoundingBoxStatus::Completed),
            "FAILED" => Some(BoundingBoxStatus::Failed),
            _ => None,
        }
    }
}

/// Identity of one asynchronous analysis job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisJob {
    pub job_id: String,
    pub source_key: String,
    pub tenant_id: String,
    pub subject_id: String,
    pub status: JobStatus,
}

/// Persisted job state: identity plus whatever the completion handler produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub job: AnalysisJob,
    pub bounding_box_status: BoundingBoxStatus,
    /// Number of raw analysis pages retrieved for the job.
    #[serde(default)]
    pub page_count: usize,
    #[serde(default)]
    pub extraction: Extraction,
    #[serde(default)]
    pub rendered_keys: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    /// A freshly submitted job.
    pub fn submitted(
        job_id: impl Into<String>,
        source_key: impl Into<String>,
        tenant_id: impl Into<String>,
        subject_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            job: AnalysisJob {
                job_id: job_id.into(),
                source_key: source_key.into(),
                tenant_id: tenant_id.into(),
                subject_id: subject_id.into(),
                status: JobStatus::Submitted,
            },
            bounding_box_status: BoundingBoxStatus::Pending,
            page_count: 0,
            extraction: Extraction::default(),
            rendered_keys: Vec::new(),
            error: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job.job_id
    }

    pub fn status(&self) -> JobStatus {
        self.job.status
    }

    pub fn set_status(&mut self, status: JobStatus) {
        let now = Utc::now();
        self.job.status = status;
        self.updated_at = now;
        if status.is_finished() {
            self.completed_at = Some(now);
        }
    }
}
