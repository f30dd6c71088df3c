//! Test data: raw analysis pages and encoded images.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, RgbImage};
use serde_json::{json, Value};

use expensa::model::RawAnalysisPage;

/// A recognized field with a value, confidence and bounding box.
pub fn field(field_type: &str, value: &str, confidence: f64) -> Value {
    json!({
        "Type": { "Text": field_type },
        "ValueDetection": {
            "Text": value,
            "Confidence": confidence,
            "Geometry": {
                "BoundingBox": { "Left": 0.1, "Top": 0.2, "Width": 0.5, "Height": 0.3 }
            }
        }
    })
}

/// Builder for one raw analysis page.
#[derive(Default)]
pub struct PageBuilder {
    summary: Vec<Value>,
    line_items: Vec<Vec<Value>>,
}

impl PageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn summary(mut self, field_type: &str, value: &str, confidence: f64) -> Self {
        self.summary.push(field(field_type, value, confidence));
        self
    }

    pub fn line_item(mut self, fields: &[(&str, &str, f64)]) -> Self {
        self.line_items.push(
            fields
                .iter()
                .map(|(t, v, c)| field(t, v, *c))
                .collect(),
        );
        self
    }

    pub fn build(self) -> RawAnalysisPage {
        let line_items: Vec<Value> = self
            .line_items
            .into_iter()
            .map(|fields| json!({ "LineItemExpenseFields": fields }))
            .collect();
        serde_json::from_value(json!({
            "ExpenseDocuments": [{
                "SummaryFields": self.summary,
                "LineItemGroups": [{ "LineItems": line_items }]
            }]
        }))
        .unwrap()
    }
}

/// A page with only a TOTAL field.
pub fn total_page(value: &str, confidence: f64) -> RawAnalysisPage {
    PageBuilder::new().summary("TOTAL", value, confidence).build()
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Jpeg)
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Png)
}

fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb([250, 250, 250])));
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
    bytes
}

/// Stand-in bytes for a PDF; the fake rasterizer never parses them.
pub fn pdf_bytes() -> Vec<u8> {
    b"%PDF-1.4\n% test document\n".to_vec()
}
