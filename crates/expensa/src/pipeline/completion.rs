//! Reacts to one completion signal: paginate, extract, persist, render and
//! notify.

use tracing::{error, info, info_span, warn, Instrument};

use super::context::{Collaborators, CompletionContext};
use super::error::{PipelineError, PipelineWarning};
use super::guard::NotifyGuard;
use super::results;
use crate::backend;
use crate::jobs::JobStoreError;
use crate::model::job::{BoundingBoxStatus, JobRecord, JobStatus};
use crate::model::signal::CompletionSignal;
use crate::notify::{Delivery, NotificationMessage};
use crate::sanitize;
use crate::storage::SourceDocument;

/// What a completion run left behind. The notification may still be in
/// flight; await [`Delivery::report`] for its result.
#[derive(Debug)]
pub struct CompletionOutcome {
    pub job_id: String,
    pub status: JobStatus,
    pub bounding_box_status: BoundingBoxStatus,
    pub page_count: usize,
    pub rendered_keys: Vec<String>,
    pub delivery: Delivery,
    pub warnings: Vec<PipelineWarning>,
}

pub struct CompletionHandler {
    services: Collaborators,
}

impl CompletionHandler {
    pub fn new(services: Collaborators) -> Self {
        Self { services }
    }

    /// Handles one signal. Safe to call again for the same job: every
    /// stored object is overwritten with the same content.
    ///
    /// Only a signal whose context cannot be recovered is an error. Once the
    /// context is known, subscribers are always notified, whatever happens
    /// in between. Delivery runs on its own task; the handler returns
    /// without waiting for subscribers.
    pub async fn handle(&self, signal: CompletionSignal) -> Result<CompletionOutcome, PipelineError> {
        let span = info_span!(
            "completion",
            job_id = %signal.job_id,
            document = %sanitize::redact_key(&signal.source_key),
        );
        self.run(signal).instrument(span).await
    }

    async fn run(&self, signal: CompletionSignal) -> Result<CompletionOutcome, PipelineError> {
        let mut ctx = self.load_context(signal).await?;
        let mut guard = NotifyGuard::arm(self.services.fanout.clone(), &ctx.record);

        ctx.record.set_status(JobStatus::InProgress);
        self.save(&mut ctx).await;

        if ctx.signal.is_failed() {
            warn!("Analysis backend reported job failure");
            fail(&mut ctx.record, "analysis backend reported job failure".to_string());
        } else {
            // Step 1: pagination
            let fetched = self
                .step_fetch_pages(&mut ctx)
                .instrument(info_span!("fetch_pages"))
                .await;
            guard.update(&ctx.record);

            match fetched {
                // Steps 2-5: extract, persist, render
                Ok(()) => self.step_process(&mut ctx).await,
                Err(e) => {
                    error!(error = %e, "Pagination failed");
                    fail(&mut ctx.record, e.to_string());
                }
            }
        }

        guard.update(&ctx.record);
        self.save(&mut ctx).await;

        // Step 6: notify
        let message = guard
            .disarm()
            .unwrap_or_else(|| NotificationMessage::from_record(&ctx.record));
        let delivery = self.services.fanout.spawn(message);

        info!(
            status = ctx.record.status().as_str(),
            bounding_box_status = ctx.record.bounding_box_status.as_str(),
            pages = ctx.record.page_count,
            "Completion handled"
        );

        Ok(CompletionOutcome {
            job_id: ctx.record.job_id().to_string(),
            status: ctx.record.status(),
            bounding_box_status: ctx.record.bounding_box_status,
            page_count: ctx.record.page_count,
            rendered_keys: ctx.record.rendered_keys.clone(),
            delivery,
            warnings: ctx.warnings,
        })
    }

    /// Loads the job record, or rebuilds tenant and subject from the source
    /// key when no record exists.
    async fn load_context(&self, signal: CompletionSignal) -> Result<CompletionContext, PipelineError> {
        let missing = |reason: String| PipelineError::MissingContext {
            job_id: signal.job_id.clone(),
            reason,
        };

        let existing = match self.services.jobs.get(&signal.job_id).await {
            Ok(record) => Some(record),
            Err(JobStoreError::NotFound(_)) => None,
            Err(e) => {
                warn!(error = %e, "Failed to load job record, recovering from source key");
                None
            }
        };

        let (source, record) = match existing {
            Some(record) => {
                let source = SourceDocument::new(
                    record.job.source_key.clone(),
                    record.job.tenant_id.clone(),
                    record.job.subject_id.clone(),
                )
                .map_err(|e| missing(e.to_string()))?;
                (source, record)
            }
            None => {
                if signal.source_key.is_empty() {
                    return Err(missing("no job record and no source key".to_string()));
                }
                let source = SourceDocument::from_key(signal.source_key.clone())
                    .map_err(|e| missing(e.to_string()))?;
                info!("No job record found, context recovered from source key");
                let record = JobRecord::submitted(
                    signal.job_id.clone(),
                    source.key.clone(),
                    source.tenant_id.clone(),
                    source.subject_id.clone(),
                );
                (source, record)
            }
        };

        Ok(CompletionContext::new(signal, source, record))
    }

    async fn step_fetch_pages(&self, ctx: &mut CompletionContext) -> Result<(), PipelineError> {
        let pages =
            backend::fetch_all_pages(self.services.backend.as_ref(), &ctx.signal.job_id).await?;
        info!(pages = pages.len(), "Fetched analysis results");
        ctx.record.page_count = pages.len();
        ctx.raw_pages = pages;
        Ok(())
    }

    async fn step_process(&self, ctx: &mut CompletionContext) {
        match results::process_pages(&self.services, &ctx.source, &ctx.raw_pages).await {
            Ok(results) => {
                ctx.record.bounding_box_status = results.bounding_box_status();
                ctx.record.extraction = results.extraction;
                ctx.record.rendered_keys = results.render.rendered_keys;
                ctx.record.error = results.render.error;
                ctx.record.set_status(JobStatus::Completed);
            }
            Err(e) => {
                error!(error = %e, "Failed to persist analysis results");
                ctx.record.extraction = crate::extract::extract(&ctx.raw_pages);
                fail(&mut ctx.record, e.to_string());
            }
        }
    }

    /// Job store writes never abort the run; a failure becomes a warning.
    async fn save(&self, ctx: &mut CompletionContext) {
        if let Err(e) = self.services.jobs.put(&ctx.record).await {
            warn!(error = %e, "Failed to write job record");
            ctx.warnings.push(PipelineWarning::JobStoreWrite {
                job_id: ctx.record.job_id().to_string(),
                error: e.to_string(),
            });
        }
    }
}

/// Rendered keys from an earlier run no longer describe this one, so they
/// are dropped and notified pages fall back to the source key.
fn fail(record: &mut JobRecord, reason: String) {
    record.error = Some(reason);
    record.rendered_keys.clear();
    record.bounding_box_status = BoundingBoxStatus::Failed;
    record.set_status(JobStatus::Failed);
}
