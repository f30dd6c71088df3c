//! Job store persisted in the `analysis_jobs` table.
//!
//! Database operations are synchronous and sub-millisecond, so they run
//! inline on the calling task.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{JobStatusStore, JobStoreError};
use crate::db::job_repo::{self, JobRow};
use crate::db::{Database, DatabaseError};
use crate::model::job::{AnalysisJob, BoundingBoxStatus, JobRecord, JobStatus};

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            log::warn!("parse_timestamp: failed to parse '{}': {}", s, e);
            Utc::now()
        })
}

fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn to_row(record: &JobRecord) -> Result<JobRow, DatabaseError> {
    let extraction = serde_json::to_string(&record.extraction).map_err(|e| DatabaseError::Json {
        column: "extraction",
        source: e,
    })?;
    let rendered_keys =
        serde_json::to_string(&record.rendered_keys).map_err(|e| DatabaseError::Json {
            column: "rendered_keys",
            source: e,
        })?;

    Ok(JobRow {
        job_id: record.job.job_id.clone(),
        source_key: record.job.source_key.clone(),
        tenant_id: record.job.tenant_id.clone(),
        subject_id: record.job.subject_id.clone(),
        status: record.job.status.as_str().to_string(),
        bounding_box_status: record.bounding_box_status.as_str().to_string(),
        page_count: record.page_count as i64,
        extraction: Some(extraction),
        rendered_keys: Some(rendered_keys),
        error: record.error.clone(),
        created_at: format_timestamp(record.created_at),
        updated_at: format_timestamp(record.updated_at),
        completed_at: record.completed_at.map(format_timestamp),
    })
}

fn from_row(row: JobRow) -> Result<JobRecord, DatabaseError> {
    let status = JobStatus::parse(&row.status).ok_or_else(|| DatabaseError::InvalidValue {
        column: "status",
        value: row.status.clone(),
    })?;
    let bounding_box_status = BoundingBoxStatus::parse(&row.bounding_box_status).ok_or_else(|| {
        DatabaseError::InvalidValue {
            column: "bounding_box_status",
            value: row.bounding_box_status.clone(),
        }
    })?;
    let extraction = match row.extraction.as_deref() {
        Some(json) => serde_json::from_str(json).map_err(|e| DatabaseError::Json {
            column: "extraction",
            source: e,
        })?,
        None => Default::default(),
    };
    let rendered_keys = match row.rendered_keys.as_deref() {
        Some(json) => serde_json::from_str(json).map_err(|e| DatabaseError::Json {
            column: "rendered_keys",
            source: e,
        })?,
        None => Vec::new(),
    };

    Ok(JobRecord {
        job: AnalysisJob {
            job_id: row.job_id,
            source_key: row.source_key,
            tenant_id: row.tenant_id,
            subject_id: row.subject_id,
            status,
        },
        bounding_box_status,
        page_count: row.page_count.max(0) as usize,
        extraction,
        rendered_keys,
        error: row.error,
        created_at: parse_timestamp(&row.created_at),
        updated_at: parse_timestamp(&row.updated_at),
        completed_at: row.completed_at.as_deref().map(parse_timestamp),
    })
}

#[derive(Clone)]
pub struct SqliteJobStore {
    db: Database,
}

impl SqliteJobStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Jobs of one tenant subject, newest first.
    pub fn list_for_subject(
        &self,
        tenant_id: &str,
        subject_id: &str,
        limit: u64,
    ) -> Result<Vec<JobRecord>, JobStoreError> {
        let rows = job_repo::list_for_subject(&self.db, tenant_id, subject_id, limit)?;
        rows.into_iter()
            .map(|row| from_row(row).map_err(JobStoreError::from))
            .collect()
    }
}

#[async_trait]
impl JobStatusStore for SqliteJobStore {
    async fn put(&self, record: &JobRecord) -> Result<(), JobStoreError> {
        let row = to_row(record)?;
        job_repo::upsert(&self.db, &row)?;
        Ok(())
    }

    async fn get(&self, job_id: &str) -> Result<JobRecord, JobStoreError> {
        match job_repo::find_by_id(&self.db, job_id)? {
            Some(row) => Ok(from_row(row)?),
            None => Err(JobStoreError::NotFound(job_id.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::extraction::{Extraction, FieldValue, PageSummary};
    use std::collections::BTreeMap;

    fn store() -> SqliteJobStore {
        SqliteJobStore::new(Database::open_in_memory().unwrap())
    }

    #[tokio::test]
    async fn test_round_trip_completed_record() {
        let store = store();
        let mut record = JobRecord::submitted("j1", "analyse-expense/t/s/a.pdf", "t", "s");
        record.set_status(JobStatus::Completed);
        record.bounding_box_status = BoundingBoxStatus::Completed;
        record.page_count = 1;
        record.rendered_keys = vec!["postprocess/t/s/a/a_page_1.png".to_string()];
        record.extraction = Extraction {
            summary_fields: vec![PageSummary {
                page_number: 1,
                fields: BTreeMap::from([(
                    "TOTAL".to_string(),
                    FieldValue {
                        value: "100.00".to_string(),
                        confidence: 99.2,
                    },
                )]),
            }],
            line_items: Vec::new(),
        };

        store.put(&record).await.unwrap();
        let loaded = store.get("j1").await.unwrap();

        assert_eq!(loaded.job, record.job);
        assert_eq!(loaded.bounding_box_status, BoundingBoxStatus::Completed);
        assert_eq!(loaded.page_count, 1);
        assert_eq!(loaded.extraction, record.extraction);
        assert_eq!(loaded.rendered_keys, record.rendered_keys);
        assert!(loaded.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_get_unknown_is_not_found() {
        assert!(matches!(
            store().get("nope").await,
            Err(JobStoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_for_subject() {
        let store = store();
        store
            .put(&JobRecord::submitted("j1", "u/t/s/a.pdf", "t", "s"))
            .await
            .unwrap();
        store
            .put(&JobRecord::submitted("j2", "u/t/x/b.pdf", "t", "x"))
            .await
            .unwrap();

        let jobs = store.list_for_subject("t", "s", 10).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].job_id(), "j1");
    }
}
