//! Stores validated uploads and dispatches one analysis request each.

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{error, info, info_span, warn, Instrument};

use super::validation::DocumentValidator;
use crate::backend::DocumentRef;
use crate::config::Config;
use crate::error::SubmitError;
use crate::model::extraction::Extraction;
use crate::model::job::{BoundingBoxStatus, JobRecord};
use crate::model::upload::{DocumentError, DocumentUpload, ErrorCode, UploadBatch};
use crate::pipeline::{results, Collaborators};
use crate::sanitize;
use crate::storage::SourceDocument;

/// Result of a document analyzed synchronously during submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineResult {
    pub file_name: String,
    pub source_key: String,
    pub bounding_box_status: BoundingBoxStatus,
    pub page_count: usize,
    pub rendered_keys: Vec<String>,
    pub extraction: Extraction,
}

/// `job_ids` and `inline` follow input order. Documents that failed
/// validation are listed in `rejected`; documents the backend refused are
/// only logged.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOutcome {
    pub job_ids: Vec<String>,
    pub inline: Vec<InlineResult>,
    pub rejected: Vec<DocumentError>,
}

enum Dispatched {
    Job(String),
    Inline(InlineResult),
    Skipped,
}

struct StoredUpload {
    file_name: String,
    source: SourceDocument,
}

pub struct JobOrchestrator {
    services: Collaborators,
    validator: DocumentValidator,
    inline_formats: Vec<String>,
    output_location: Option<String>,
    notification_target: Option<String>,
}

impl JobOrchestrator {
    pub fn new(services: Collaborators, config: &Config) -> Self {
        Self {
            services,
            validator: DocumentValidator::new(&config.limits, &config.formats),
            inline_formats: config
                .formats
                .inline
                .iter()
                .map(|ext| ext.to_ascii_lowercase())
                .collect(),
            output_location: config.backend.output_location.clone(),
            notification_target: config.backend.notification_target.clone(),
        }
    }

    /// Validates the whole batch, stores every valid document under a
    /// content-derived key and dispatches them concurrently.
    ///
    /// A batch with no documents or too many documents is rejected before
    /// anything is inspected or stored.
    pub async fn submit(
        &self,
        batch: UploadBatch,
        tenant_id: &str,
        subject_id: &str,
    ) -> Result<SubmitOutcome, SubmitError> {
        let span = info_span!("submit", documents = batch.len());
        async {
            self.validator
                .check_batch(&batch)
                .map_err(SubmitError::Rejected)?;

            let (valid, mut rejected) = self.validator.partition(batch);
            for err in &rejected {
                warn!(error_code = %err.error_code, file = %err.file_name, "Document rejected");
            }

            let unix_seconds = Utc::now().timestamp();
            let mut stored = Vec::with_capacity(valid.len());
            for document in valid {
                match self
                    .store_upload(&document, tenant_id, subject_id, unix_seconds)
                    .await
                {
                    Ok(Some(upload)) => stored.push(upload),
                    Ok(None) => rejected.push(DocumentError::new(
                        document.file_name.as_str(),
                        ErrorCode::InvalidFilename,
                        "File name cannot be turned into a storage key",
                    )),
                    Err(e) => {
                        error!(file = %document.file_name, error = %e, "Failed to store upload, skipping");
                    }
                }
            }

            let concurrency = stored.len().max(1);
            let dispatched: Vec<Dispatched> = stream::iter(stored)
                .map(|upload| self.dispatch(upload))
                .buffered(concurrency)
                .collect()
                .await;

            let mut outcome = SubmitOutcome {
                rejected,
                ..Default::default()
            };
            for result in dispatched {
                match result {
                    Dispatched::Job(job_id) => outcome.job_ids.push(job_id),
                    Dispatched::Inline(inline) => outcome.inline.push(inline),
                    Dispatched::Skipped => {}
                }
            }

            info!(
                jobs = outcome.job_ids.len(),
                inline = outcome.inline.len(),
                rejected = outcome.rejected.len(),
                "Submission finished"
            );
            Ok(outcome)
        }
        .instrument(span)
        .await
    }

    async fn store_upload(
        &self,
        document: &DocumentUpload,
        tenant_id: &str,
        subject_id: &str,
        unix_seconds: i64,
    ) -> Result<Option<StoredUpload>, crate::error::StorageError> {
        let Some(key) = self.services.layout.upload_key(
            tenant_id,
            subject_id,
            &document.file_name,
            &document.raw_bytes,
            unix_seconds,
        ) else {
            return Ok(None);
        };

        self.services
            .store
            .put(&key, document.raw_bytes.clone())
            .await?;
        let source = SourceDocument::new(key, tenant_id, subject_id)?;
        Ok(Some(StoredUpload {
            file_name: document.file_name.clone(),
            source,
        }))
    }

    async fn dispatch(&self, upload: StoredUpload) -> Dispatched {
        let span = info_span!("dispatch", document = %sanitize::redact_key(&upload.source.key));
        async {
            if self.inline_formats.contains(&upload.source.extension) {
                self.analyze_inline(upload).await
            } else {
                self.submit_async(upload).await
            }
        }
        .instrument(span)
        .await
    }

    async fn submit_async(&self, upload: StoredUpload) -> Dispatched {
        let source = &upload.source;
        let job_id = match self
            .services
            .backend
            .submit_async(
                &DocumentRef::new(source.key.as_str()),
                self.output_location.as_deref(),
                self.notification_target.as_deref(),
            )
            .await
        {
            Ok(job_id) => job_id,
            Err(e) => {
                error!(error = %e, "Backend refused document, skipping");
                return Dispatched::Skipped;
            }
        };

        let record = JobRecord::submitted(
            job_id.as_str(),
            source.key.as_str(),
            source.tenant_id.as_str(),
            source.subject_id.as_str(),
        );
        if let Err(e) = self.services.jobs.put(&record).await {
            // The completion handler can still recover context from the key.
            warn!(job_id = %job_id, error = %e, "Failed to record submitted job");
        }

        info!(job_id = %job_id, "Analysis job submitted");
        Dispatched::Job(job_id)
    }

    async fn analyze_inline(&self, upload: StoredUpload) -> Dispatched {
        let source = &upload.source;
        let pages = match self
            .services
            .backend
            .analyze_sync(&DocumentRef::new(source.key.as_str()))
            .await
        {
            Ok(pages) => pages,
            Err(e) => {
                error!(error = %e, "Inline analysis failed, skipping");
                return Dispatched::Skipped;
            }
        };

        match results::process_pages(&self.services, source, &pages).await {
            Ok(results) => {
                info!(pages = results.page_count, "Inline analysis finished");
                Dispatched::Inline(InlineResult {
                    bounding_box_status: results.bounding_box_status(),
                    file_name: upload.file_name.clone(),
                    source_key: source.key.clone(),
                    page_count: results.page_count,
                    rendered_keys: results.render.rendered_keys,
                    extraction: results.extraction,
                })
            }
            Err(e) => {
                error!(error = %e, "Failed to persist inline results, skipping");
                Dispatched::Skipped
            }
        }
    }
}
