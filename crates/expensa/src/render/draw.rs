//! Burns field bounding boxes onto a page bitmap.

use std::io::Cursor;

use image::{ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use tracing::warn;

use super::colors::{summary_field_color, LINE_ITEM_COLOR};
use crate::extract::{is_line_item_field, is_summary_field};
use crate::model::analysis::{BoundingBox, ExpenseField, RawAnalysisPage};

/// Absolute pixel rectangle `(x, y, width, height)` for a fractional box,
/// clamped to the bitmap. `None` if nothing of it lies on the page.
pub fn pixel_rect(bbox: &BoundingBox, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
    let (w, h) = (width as f64, height as f64);
    let left = (bbox.left * w).round().clamp(0.0, w) as u32;
    let top = (bbox.top * h).round().clamp(0.0, h) as u32;
    let right = ((bbox.left + bbox.width) * w).round().clamp(0.0, w) as u32;
    let bottom = ((bbox.top + bbox.height) * h).round().clamp(0.0, h) as u32;

    if right <= left || bottom <= top {
        return None;
    }
    Some((left, top, right - left, bottom - top))
}

/// Outline drawn inward from the rectangle edge, `stroke_width` pixels thick.
fn draw_outline(image: &mut RgbaImage, rect: (u32, u32, u32, u32), stroke_width: u32, color: Rgba<u8>) {
    let (x, y, w, h) = rect;
    for t in 0..stroke_width.max(1) {
        let inner_w = w.saturating_sub(2 * t);
        let inner_h = h.saturating_sub(2 * t);
        if inner_w == 0 || inner_h == 0 {
            break;
        }
        let rect = Rect::at((x + t) as i32, (y + t) as i32).of_size(inner_w, inner_h);
        draw_hollow_rect_mut(image, rect, color);
    }
}

fn draw_field(
    image: &mut RgbaImage,
    field: &ExpenseField,
    field_type: &str,
    color: Rgba<u8>,
    stroke_width: u32,
) -> bool {
    let Some(bbox) = field.bounding_box() else {
        warn!(field_type, "Bounding box not found, skipping field");
        return false;
    };
    match pixel_rect(bbox, image.width(), image.height()) {
        Some(rect) => {
            draw_outline(image, rect, stroke_width, color);
            true
        }
        None => {
            warn!(field_type, "Bounding box lies outside the page, skipping field");
            false
        }
    }
}

/// Draws every recognized field of `page` and returns the number of boxes drawn.
pub fn annotate_page(image: &mut RgbaImage, page: &RawAnalysisPage, stroke_width: u32) -> usize {
    let mut drawn = 0;

    for document in &page.expense_documents {
        for field in &document.summary_fields {
            let Some(field_type) = field.type_text().filter(|t| is_summary_field(t)) else {
                continue;
            };
            if draw_field(image, field, field_type, summary_field_color(field_type), stroke_width) {
                drawn += 1;
            }
        }

        for group in &document.line_item_groups {
            for item in &group.line_items {
                for field in &item.line_item_expense_fields {
                    let Some(field_type) = field.type_text().filter(|t| is_line_item_field(t))
                    else {
                        continue;
                    };
                    if draw_field(image, field, field_type, LINE_ITEM_COLOR, stroke_width) {
                        drawn += 1;
                    }
                }
            }
        }
    }

    drawn
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
}
