//! Turning source documents into per-page bitmaps.

use std::path::{Path, PathBuf};
use std::process::Command;

use image::RgbaImage;

use crate::error::RenderError;

/// Rasterizes multi-page documents. Implementations are blocking.
pub trait Rasterizer: Send + Sync {
    fn page_count(&self, pdf_bytes: &[u8]) -> Result<usize, RenderError>;

    /// One bitmap for each of the first `page_count` pages, in page order.
    /// `page_count` is the value [`page_count`](Self::page_count) returned
    /// for the same bytes.
    fn rasterize(
        &self,
        pdf_bytes: &[u8],
        page_count: usize,
        dpi: u32,
    ) -> Result<Vec<RgbaImage>, RenderError>;
}

/// Decodes a single-page raster source (PNG, JPEG).
pub fn decode_image(bytes: &[u8]) -> Result<RgbaImage, RenderError> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgba8())
        .map_err(|e| RenderError::Decode(e.to_string()))
}

/// Uses lopdf for page counting and poppler's `pdftoppm` for rendering.
#[derive(Debug, Default, Clone)]
pub struct PopplerRasterizer;

impl PopplerRasterizer {
    pub fn new() -> Self {
        Self
    }
}

impl Rasterizer for PopplerRasterizer {
    fn page_count(&self, pdf_bytes: &[u8]) -> Result<usize, RenderError> {
        match lopdf::Document::load_mem(pdf_bytes) {
            Ok(doc) => Ok(doc.get_pages().len()),
            Err(e) => {
                // lopdf rejects some cross-reference tables that poppler accepts.
                tracing::warn!("lopdf failed to parse PDF: {}. Falling back to pdfinfo.", e);
                count_pages_with_pdfinfo(pdf_bytes)
            }
        }
    }

    fn rasterize(
        &self,
        pdf_bytes: &[u8],
        page_count: usize,
        dpi: u32,
    ) -> Result<Vec<RgbaImage>, RenderError> {
        let _span = tracing::info_span!("render.rasterize", dpi, pages = page_count).entered();
        if page_count == 0 {
            return Ok(Vec::new());
        }

        let scratch = ScratchDir::create()
            .map_err(|e| RenderError::Rasterize(format!("Failed to create temp dir: {}", e)))?;
        let pdf_path = scratch.path().join("source.pdf");
        let output_prefix = scratch.path().join("page");

        std::fs::write(&pdf_path, pdf_bytes)
            .map_err(|e| RenderError::Rasterize(format!("Failed to write temp PDF: {}", e)))?;

        let output = Command::new("pdftoppm")
            .arg("-png")
            .arg("-r")
            .arg(dpi.to_string())
            .arg("-f")
            .arg("1")
            .arg("-l")
            .arg(page_count.to_string())
            .arg(&pdf_path)
            .arg(&output_prefix)
            .output()
            .map_err(|e| {
                RenderError::Rasterize(format!(
                    "Failed to run pdftoppm: {}. Make sure poppler-utils is installed.",
                    e
                ))
            })?;

        if !output.status.success() {
            return Err(RenderError::Rasterize(format!(
                "pdftoppm failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        (1..=page_count)
            .map(|page| {
                let path = find_page_output(&output_prefix, page).ok_or_else(|| {
                    RenderError::Rasterize(format!("Missing rendered image for page {}", page))
                })?;
                let bytes = std::fs::read(&path).map_err(|e| {
                    RenderError::Rasterize(format!("Failed to read rendered image: {}", e))
                })?;
                decode_image(&bytes)
            })
            .collect()
    }
}

/// Per-call scratch directory under the system temp dir, removed on drop.
struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    fn create() -> std::io::Result<Self> {
        let path = std::env::temp_dir().join(format!("expensa_render_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

/// pdftoppm zero-pads the page suffix to the width of the last page number.
fn find_page_output(prefix: &Path, page: usize) -> Option<PathBuf> {
    let prefix = prefix.display();
    [
        format!("{}-{}.png", prefix, page),
        format!("{}-{:02}.png", prefix, page),
        format!("{}-{:03}.png", prefix, page),
        format!("{}-{:04}.png", prefix, page),
    ]
    .into_iter()
    .map(PathBuf::from)
    .find(|p| p.exists())
}

fn count_pages_with_pdfinfo(pdf_bytes: &[u8]) -> Result<usize, RenderError> {
    let scratch = ScratchDir::create()
        .map_err(|e| RenderError::Decode(format!("Failed to create temp dir: {}", e)))?;
    let pdf_path = scratch.path().join("source.pdf");
    std::fs::write(&pdf_path, pdf_bytes)
        .map_err(|e| RenderError::Decode(format!("Failed to write temp PDF: {}", e)))?;

    let output = Command::new("pdfinfo")
        .arg(&pdf_path)
        .output()
        .map_err(|e| {
            RenderError::Decode(format!(
                "Failed to run pdfinfo: {}. Make sure poppler-utils is installed.",
                e
            ))
        })?;

    if !output.status.success() {
        return Err(RenderError::Decode(format!(
            "pdfinfo failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    parse_pdfinfo_pages(&String::from_utf8_lossy(&output.stdout))
        .ok_or_else(|| RenderError::Decode("pdfinfo reported no page count".to_string()))
}

fn parse_pdfinfo_pages(stdout: &str) -> Option<usize> {
    stdout
        .lines()
        .filter_map(|line| line.strip_prefix("Pages:"))
        .find_map(|count| count.trim().parse::<usize>().ok())
}
