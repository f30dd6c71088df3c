use std::sync::Arc;

use futures_util::stream::{self, StreamExt, TryStreamExt};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, warn, Instrument};

use super::draw::{annotate_page, encode_png};
use super::rasterize::{decode_image, Rasterizer};
use crate::config::RenderConfig;
use crate::error::RenderError;
use crate::model::analysis::RawAnalysisPage;
use crate::sanitize;
use crate::storage::{DocumentStore, KeyLayout, SourceDocument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RenderStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderOutcome {
    pub status: RenderStatus,
    /// One key per raw page, in page order, when `status` is `Success`.
    /// Empty on failure; pages already written stay in storage.
    pub rendered_keys: Vec<String>,
    pub error: Option<String>,
}

impl RenderOutcome {
    fn success(rendered_keys: Vec<String>) -> Self {
        Self {
            status: RenderStatus::Success,
            rendered_keys,
            error: None,
        }
    }

    fn failure(error: &RenderError) -> Self {
        Self {
            status: RenderStatus::Failure,
            rendered_keys: Vec::new(),
            error: Some(error.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RenderStatus::Success
    }
}

pub struct PageRenderer {
    store: Arc<dyn DocumentStore>,
    rasterizer: Arc<dyn Rasterizer>,
    layout: KeyLayout,
    dpi: u32,
    stroke_width: u32,
    workers: usize,
}

impl PageRenderer {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        rasterizer: Arc<dyn Rasterizer>,
        layout: KeyLayout,
        config: &RenderConfig,
    ) -> Self {
        Self {
            store,
            rasterizer,
            layout,
            dpi: config.dpi,
            stroke_width: config.stroke_width,
            workers: config.workers.max(1),
        }
    }

    /// Renders one annotated PNG per raw page. Never returns an error:
    /// any failure is reported as `RenderStatus::Failure`.
    ///
    /// Re-rendering the same document overwrites the same keys.
    pub async fn render(&self, raw_pages: &[RawAnalysisPage], source: &SourceDocument) -> RenderOutcome {
        let span = info_span!(
            "render",
            document = %sanitize::redact_key(&source.key),
            pages = raw_pages.len()
        );
        match self.try_render(raw_pages, source).instrument(span).await {
            Ok(keys) => {
                info!(rendered = keys.len(), "Rendered pages");
                RenderOutcome::success(keys)
            }
            Err(e) => {
                warn!(
                    document = %sanitize::redact_key(&source.key),
                    error = %e,
                    "Rendering failed"
                );
                RenderOutcome::failure(&e)
            }
        }
    }

    async fn try_render(
        &self,
        raw_pages: &[RawAnalysisPage],
        source: &SourceDocument,
    ) -> Result<Vec<String>, RenderError> {
        if raw_pages.is_empty() {
            return Ok(Vec::new());
        }

        let bytes = self.store.get(&source.key).await?;
        let bitmaps = self.load_bitmaps(bytes, source, raw_pages.len()).await?;

        if bitmaps.len() != raw_pages.len() {
            return Err(RenderError::PageCountMismatch {
                analyzed: raw_pages.len(),
                rendered: bitmaps.len(),
            });
        }

        let stroke_width = self.stroke_width;
        stream::iter(bitmaps.into_iter().zip(raw_pages.iter().cloned()).enumerate())
            .map(|(idx, (mut bitmap, page))| {
                let key = self.layout.rendered_page_key(source, idx + 1);
                async move {
                    let png = tokio::task::spawn_blocking(move || {
                        annotate_page(&mut bitmap, &page, stroke_width);
                        encode_png(&bitmap).map_err(|e| RenderError::Encode {
                            page: idx + 1,
                            reason: e.to_string(),
                        })
                    })
                    .await
                    .map_err(|e| RenderError::Task(e.to_string()))??;

                    self.store.put(&key, png).await?;
                    Ok::<_, RenderError>(key)
                }
            })
            .buffered(self.workers)
            .try_collect()
            .await
    }

    async fn load_bitmaps(
        &self,
        bytes: Vec<u8>,
        source: &SourceDocument,
        expected_pages: usize,
    ) -> Result<Vec<RgbaImage>, RenderError> {
        if !source.is_paginated() {
            let image = tokio::task::spawn_blocking(move || decode_image(&bytes))
                .await
                .map_err(|e| RenderError::Task(e.to_string()))??;
            return Ok(vec![image]);
        }

        let rasterizer = Arc::clone(&self.rasterizer);
        let dpi = self.dpi;
        tokio::task::spawn_blocking(move || {
            let page_count = rasterizer.page_count(&bytes)?;
            if page_count != expected_pages {
                return Err(RenderError::PageCountMismatch {
                    analyzed: expected_pages,
                    rendered: page_count,
                });
            }
            rasterizer.rasterize(&bytes, page_count, dpi)
        })
        .await
        .map_err(|e| RenderError::Task(e.to_string()))?
    }
}
