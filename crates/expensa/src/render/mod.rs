//! Page renderer: annotated per-page PNGs for an analyzed document.

pub mod colors;
pub mod draw;
pub mod rasterize;
pub mod renderer;

pub use rasterize::{PopplerRasterizer, Rasterizer};
pub use renderer::{PageRenderer, RenderOutcome, RenderStatus};
