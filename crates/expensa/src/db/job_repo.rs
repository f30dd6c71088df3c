//! Row-level access to the `analysis_jobs` table.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};

/// A raw job row. JSON columns are kept as text.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRow {
    pub job_id: String,
    pub source_key: String,
    pub tenant_id: String,
    pub subject_id: String,
    pub status: String,
    pub bounding_box_status: String,
    pub page_count: i64,
    pub extraction: Option<String>,
    pub rendered_keys: Option<String>,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            job_id: row.get("job_id")?,
            source_key: row.get("source_key")?,
            tenant_id: row.get("tenant_id")?,
            subject_id: row.get("subject_id")?,
            status: row.get("status")?,
            bounding_box_status: row.get("bounding_box_status")?,
            page_count: row.get("page_count")?,
            extraction: row.get("extraction")?,
            rendered_keys: row.get("rendered_keys")?,
            error: row.get("error")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            completed_at: row.get("completed_at")?,
        })
    }
}

/// Inserts the row, or overwrites every column except `created_at` if the
/// job already exists.
pub fn upsert(db: &Database, job: &JobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO analysis_jobs (job_id, source_key, tenant_id, subject_id, status,
             bounding_box_status, page_count, extraction, rendered_keys, error, created_at,
             updated_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(job_id) DO UPDATE SET
                source_key=excluded.source_key, tenant_id=excluded.tenant_id,
                subject_id=excluded.subject_id, status=excluded.status,
                bounding_box_status=excluded.bounding_box_status,
                page_count=excluded.page_count, extraction=excluded.extraction, rendered_keys=excluded.rendered_keys,
                error=excluded.error, updated_at=excluded.updated_at,
                completed_at=excluded.completed_at",
            params![
                job.job_id,
                job.source_key,
                job.tenant_id,
                job.subject_id,
                job.status,
                job.bounding_box_status,
                job.page_count,
                job.extraction,
                job.rendered_keys,
                job.error,
                job.created_at,
                job.updated_at,
                job.completed_at,
            ],
        )?;
        Ok(())
    })
}

pub fn find_by_id(db: &Database, job_id: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM analysis_jobs WHERE job_id = ?1",
                params![job_id],
                JobRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Jobs of one tenant subject, newest first.
pub fn list_for_subject(
    db: &Database,
    tenant_id: &str,
    subject_id: &str,
    limit: u64,
) -> Result<Vec<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM analysis_jobs WHERE tenant_id = ?1 AND subject_id = ?2
             ORDER BY created_at DESC LIMIT ?3",
        )?;
        let rows = stmt
            .query_map(params![tenant_id, subject_id, limit as i64], JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
