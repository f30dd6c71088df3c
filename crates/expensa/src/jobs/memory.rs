use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{JobStatusStore, JobStoreError};
use crate::model::job::JobRecord;

#[derive(Default)]
pub struct MemoryJobStore {
    records: RwLock<HashMap<String, JobRecord>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        match self.records.read() {
            Ok(records) => records.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl JobStatusStore for MemoryJobStore {
    async fn put(&self, record: &JobRecord) -> Result<(), JobStoreError> {
        let mut records = match self.records.write() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Job store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        let mut record = record.clone();
        if let Some(existing) = records.get(record.job_id()) {
            record.created_at = existing.created_at;
        }
        records.insert(record.job_id().to_string(), record);
        Ok(())
    }

    async fn get(&self, job_id: &str) -> Result<JobRecord, JobStoreError> {
        let records = match self.records.read() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        records
            .get(job_id)
            .cloned()
            .ok_or_else(|| JobStoreError::NotFound(job_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::job::JobStatus;

    #[tokio::test]
    async fn test_put_replaces_record() {
        let store = MemoryJobStore::new();
        let mut record = JobRecord::submitted("j1", "u/t/s/a.png", "t", "s");
        store.put(&record).await.unwrap();

        record.set_status(JobStatus::Completed);
        store.put(&record).await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("j1").await.unwrap().status(), JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_get_unknown() {
        let store = MemoryJobStore::new();
        assert!(matches!(
            store.get("nope").await,
            Err(JobStoreError::NotFound(_))
        ));
    }
}
