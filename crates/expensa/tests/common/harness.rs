//! In-memory collaborators and a harness wiring them together.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::RgbaImage;
use tokio::sync::mpsc::UnboundedReceiver;

use expensa::backend::{AnalysisBackend, DocumentRef, ResultPage};
use expensa::config::Config;
use expensa::error::{BackendError, RenderError};
use expensa::jobs::MemoryJobStore;
use expensa::model::RawAnalysisPage;
use expensa::notify::{
    LocalPushChannel, MemoryRegistry, NotificationFanout, NotificationMessage, SubscriberRegistry,
};
use expensa::orchestrator::JobOrchestrator;
use expensa::pipeline::{Collaborators, CompletionHandler};
use expensa::render::{PageRenderer, Rasterizer};
use expensa::storage::{DocumentStore, KeyLayout, MemoryStore};

/// Backend whose job ids and result pages are fixed up front.
///
/// The job id for a document is `job-{file}`, where `file` is the uploaded
/// file name recovered from the storage key.
#[derive(Default)]
pub struct ScriptedBackend {
    results: Mutex<HashMap<String, Vec<Vec<RawAnalysisPage>>>>,
    inline_results: Vec<RawAnalysisPage>,
    refused: HashSet<String>,
    pub submitted: Mutex<Vec<String>>,
    pub analyzed_inline: Mutex<Vec<String>>,
    pub fetches: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Result pages for a job, split into fetches joined by continuation tokens.
    pub fn with_results(self, job_id: &str, chunks: Vec<Vec<RawAnalysisPage>>) -> Self {
        self.results
            .lock()
            .unwrap()
            .insert(job_id.to_string(), chunks);
        self
    }

    pub fn with_inline_results(mut self, pages: Vec<RawAnalysisPage>) -> Self {
        self.inline_results = pages;
        self
    }

    /// Refuses submission of the given uploaded file name.
    pub fn refusing(mut self, file_name: &str) -> Self {
        self.refused.insert(file_name.to_string());
        self
    }

    pub fn submitted(&self) -> Vec<String> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

/// `{ts}-{hash}-{file}` -> `file`
pub fn uploaded_file_name(key: &str) -> String {
    let last = key.rsplit('/').next().unwrap();
    last.splitn(3, '-').nth(2).unwrap().to_string()
}

#[async_trait]
impl AnalysisBackend for ScriptedBackend {
    async fn submit_async(
        &self,
        document: &DocumentRef,
        _output_location: Option<&str>,
        _notification_target: Option<&str>,
    ) -> Result<String, BackendError> {
        let file = uploaded_file_name(&document.document_key);
        if self.refused.contains(&file) {
            return Err(BackendError::Rejected(format!("refused {}", file)));
        }
        self.submitted
            .lock()
            .unwrap()
            .push(document.document_key.clone());
        Ok(format!("job-{}", file))
    }

    async fn fetch_result_page(
        &self,
        job_id: &str,
        continuation: Option<&str>,
    ) -> Result<ResultPage, BackendError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let results = self.results.lock().unwrap();
        let chunks = results
            .get(job_id)
            .ok_or_else(|| BackendError::UnknownJob(job_id.to_string()))?;

        let index = match continuation {
            Some(token) => token.trim_start_matches('t').parse::<usize>().unwrap(),
            None => 0,
        };
        let results = chunks.get(index).cloned().unwrap_or_default();
        let next_token = (index + 1 < chunks.len()).then(|| format!("t{}", index + 1));
        Ok(ResultPage {
            results,
            next_token,
        })
    }

    async fn analyze_sync(&self, document: &DocumentRef) -> Result<Vec<RawAnalysisPage>, BackendError> {
        self.analyzed_inline
            .lock()
            .unwrap()
            .push(document.document_key.clone());
        Ok(self.inline_results.clone())
    }
}

/// Produces `pages` blank bitmaps for any PDF.
pub struct FakeRasterizer {
    pub pages: usize,
}

impl Rasterizer for FakeRasterizer {
    fn page_count(&self, _pdf_bytes: &[u8]) -> Result<usize, RenderError> {
        Ok(self.pages)
    }

    fn rasterize(
        &self,
        _pdf_bytes: &[u8],
        page_count: usize,
        _dpi: u32,
    ) -> Result<Vec<RgbaImage>, RenderError> {
        Ok((0..page_count).map(|_| RgbaImage::new(80, 60)).collect())
    }
}

pub struct Harness {
    pub config: Config,
    pub store: Arc<MemoryStore>,
    pub jobs: Arc<MemoryJobStore>,
    pub registry: Arc<MemoryRegistry>,
    pub channel: Arc<LocalPushChannel>,
    pub backend: Arc<ScriptedBackend>,
    pub services: Collaborators,
}

impl Harness {
    pub fn new(backend: ScriptedBackend, pdf_pages: usize) -> Self {
        Self::with_config(backend, pdf_pages, Config::default())
    }

    pub fn with_config(backend: ScriptedBackend, pdf_pages: usize, mut config: Config) -> Self {
        config.render.workers = 2;
        config.notify.delivery_timeout_ms = 1_000;

        let store = Arc::new(MemoryStore::new());
        let jobs = Arc::new(MemoryJobStore::new());
        let registry = Arc::new(MemoryRegistry::new());
        let channel = Arc::new(LocalPushChannel::new());
        let backend = Arc::new(backend);
        let layout = KeyLayout::from_config(&config.storage);

        let renderer = Arc::new(PageRenderer::new(
            store.clone(),
            Arc::new(FakeRasterizer { pages: pdf_pages }),
            layout.clone(),
            &config.render,
        ));
        let services = Collaborators {
            store: store.clone(),
            backend: backend.clone(),
            jobs: jobs.clone(),
            renderer,
            fanout: NotificationFanout::new(registry.clone(), channel.clone(), &config.notify),
            layout,
        };

        Self {
            config,
            store,
            jobs,
            registry,
            channel,
            backend,
            services,
        }
    }

    pub fn orchestrator(&self) -> JobOrchestrator {
        JobOrchestrator::new(self.services.clone(), &self.config)
    }

    pub fn handler(&self) -> CompletionHandler {
        CompletionHandler::new(self.services.clone())
    }

    /// Registers a subscriber and returns the queue its notifications land on.
    pub async fn subscribe(&self, connection_id: &str) -> UnboundedReceiver<Vec<u8>> {
        self.registry.register(connection_id).await.unwrap();
        self.channel.connect(connection_id)
    }

    /// Stores a source document directly, bypassing submission.
    pub async fn put_source(&self, key: &str, bytes: Vec<u8>) {
        self.store.put(key, bytes).await.unwrap();
    }

    /// Every stored object, keyed and ordered.
    pub async fn snapshot(&self) -> Vec<(String, Vec<u8>)> {
        let mut objects = Vec::new();
        for key in self.store.keys() {
            let bytes = self.store.get(&key).await.unwrap();
            objects.push((key, bytes));
        }
        objects
    }
}

/// Waits briefly for the next notification on a subscriber queue. Delivery
/// runs in the background, so it may land after the handler has returned.
pub async fn received(rx: &mut UnboundedReceiver<Vec<u8>>) -> NotificationMessage {
    let payload = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("no notification delivered in time")
        .expect("subscriber queue closed");
    serde_json::from_slice(&payload).unwrap()
}
