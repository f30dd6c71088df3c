//! Steps shared by the completion handler and inline submissions: extract,
//! persist, render.

use tracing::{debug, info_span, Instrument};

use super::context::Collaborators;
use crate::error::StorageError;
use crate::extract;
use crate::model::analysis::RawAnalysisPage;
use crate::model::extraction::Extraction;
use crate::model::job::BoundingBoxStatus;
use crate::render::RenderOutcome;
use crate::storage::{put_json, SourceDocument};

/// Everything derived from one document's raw analysis pages.
#[derive(Debug, Clone)]
pub struct AnalysisResults {
    pub page_count: usize,
    pub extraction: Extraction,
    pub render: RenderOutcome,
}

impl AnalysisResults {
    pub fn bounding_box_status(&self) -> BoundingBoxStatus {
        if self.render.is_success() {
            BoundingBoxStatus::Completed
        } else {
            BoundingBoxStatus::Failed
        }
    }
}

/// Extracts fields, persists the raw pages and the extraction, then renders.
///
/// Storage failures while persisting are returned; render failures are not,
/// they are reported in [`AnalysisResults::render`].
pub async fn process_pages(
    services: &Collaborators,
    source: &SourceDocument,
    raw_pages: &[RawAnalysisPage],
) -> Result<AnalysisResults, StorageError> {
    let extraction = extract::extract(raw_pages);

    async {
        let raw_key = services.layout.raw_pages_key(source);
        put_json(services.store.as_ref(), &raw_key, raw_pages).await?;

        let results_key = services.layout.results_key(source);
        put_json(services.store.as_ref(), &results_key, &extraction).await?;

        debug!(pages = raw_pages.len(), "Persisted raw pages and extraction");
        Ok::<_, StorageError>(())
    }
    .instrument(info_span!("persist_results"))
    .await?;

    let render = services.renderer.render(raw_pages, source).await;

    Ok(AnalysisResults {
        page_count: raw_pages.len(),
        extraction,
        render,
    })
}
