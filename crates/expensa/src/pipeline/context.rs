use std::sync::Arc;

use crate::backend::AnalysisBackend;
use crate::jobs::JobStatusStore;
use crate::model::analysis::RawAnalysisPage;
use crate::model::job::JobRecord;
use crate::model::signal::CompletionSignal;
use crate::notify::NotificationFanout;
use crate::render::PageRenderer;
use crate::storage::{DocumentStore, KeyLayout, SourceDocument};

use super::error::PipelineWarning;

/// Everything a submission or completion run talks to. Constructed once by
/// the caller and passed in; nothing here is global.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn DocumentStore>,
    pub backend: Arc<dyn AnalysisBackend>,
    pub jobs: Arc<dyn JobStatusStore>,
    pub renderer: Arc<PageRenderer>,
    pub fanout: NotificationFanout,
    pub layout: KeyLayout,
}

/// State of one completion run.
pub struct CompletionContext {
    // Input
    pub signal: CompletionSignal,

    // Loaded or recovered before any step runs
    pub source: SourceDocument,
    pub record: JobRecord,

    // Pagination result, in backend order
    pub raw_pages: Vec<RawAnalysisPage>,

    pub warnings: Vec<PipelineWarning>,
}

impl CompletionContext {
    pub fn new(signal: CompletionSignal, source: SourceDocument, record: JobRecord) -> Self {
        Self {
            signal,
            source,
            record,
            raw_pages: Vec::new(),
            warnings: Vec::new(),
        }
    }
}
