//! Raw analysis results as returned by the document-understanding backend.
//!
//! One [`RawAnalysisPage`] corresponds to one page of the source document.
//! Field names follow the backend's PascalCase wire format. Unknown fields
//! are ignored so backend additions do not break deserialization.

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawAnalysisPage {
    #[serde(default)]
    pub expense_documents: Vec<ExpenseDocument>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExpenseDocument {
    #[serde(default)]
    pub summary_fields: Vec<ExpenseField>,
    #[serde(default)]
    pub line_item_groups: Vec<LineItemGroup>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LineItemGroup {
    #[serde(default)]
    pub line_items: Vec<LineItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LineItem {
    #[serde(default)]
    pub line_item_expense_fields: Vec<ExpenseField>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExpenseField {
    #[serde(rename = "Type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_detection: Option<ValueDetection>,
}

impl ExpenseField {
    /// The field's type label, e.g. `TOTAL`.
    pub fn type_text(&self) -> Option<&str> {
        self.field_type.as_ref().and_then(|t| t.text.as_deref())
    }

    pub fn value_text(&self) -> Option<&str> {
        self.value_detection.as_ref().and_then(|v| v.text.as_deref())
    }

    pub fn confidence(&self) -> Option<f64> {
        self.value_detection.as_ref().and_then(|v| v.confidence)
    }

    pub fn bounding_box(&self) -> Option<&BoundingBox> {
        self.value_detection
            .as_ref()
            .and_then(|v| v.geometry.as_ref())
            .and_then(|g| g.bounding_box.as_ref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FieldType {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ValueDetection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_confidence",
        skip_serializing_if = "Option::is_none"
    )]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Geometry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Geometry {
    /// `None` when the box is absent or any coordinate is missing or not a
    /// number. Such a field is still extracted, just not drawn.
    #[serde(
        default,
        deserialize_with = "lenient_bounding_box",
        skip_serializing_if = "Option::is_none"
    )]
    pub bounding_box: Option<BoundingBox>,
}

/// Fractional rectangle relative to the page size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BoundingBox {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Accepts a number, a numeric string, or anything else (mapped to `None`).
fn lenient_confidence<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|c| c.is_finite()))
}

fn lenient_bounding_box<'de, D>(deserializer: D) -> Result<Option<BoundingBox>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(serde_json::Value::Object(map)) = Option::<serde_json::Value>::deserialize(deserializer)?
    else {
        return Ok(None);
    };
    let coordinate = |name: &str| {
        map.get(name)
            .and_then(serde_json::Value::as_f64)
            .filter(|v| v.is_finite())
    };
    Ok(
        match (
            coordinate("Left"),
            coordinate("Top"),
            coordinate("Width"),
            coordinate("Height"),
        ) {
            (Some(left), Some(top), Some(width), Some(height)) => Some(BoundingBox {
                left,
                top,
                width,
                height,
            }),
            _ => None,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_backend_page() {
        let page: RawAnalysisPage = serde_json::from_str(
            r#"{
                "DocumentMetadata": {"Pages": 1},
                "ExpenseDocuments": [{
                    "ExpenseIndex": 1,
                    "SummaryFields": [{
                        "Type": {"Text": "TOTAL", "Confidence": 98.0},
                        "ValueDetection": {
                            "Text": "100.00",
                            "Confidence": 99.2,
                            "Geometry": {"BoundingBox": {"Left": 0.1, "Top": 0.2, "Width": 0.3, "Height": 0.05}}
                        }
                    }],
                    "LineItemGroups": []
                }]
            }"#,
        )
        .unwrap();

        let field = &page.expense_documents[0].summary_fields[0];
        assert_eq!(field.type_text(), Some("TOTAL"));
        assert_eq!(field.value_text(), Some("100.00"));
        assert_eq!(field.confidence(), Some(99.2));
        assert_eq!(field.bounding_box().unwrap().width, 0.3);
    }

    #[test]
    fn test_malformed_confidence_is_none() {
        let detection: ValueDetection =
            serde_json::from_str(r#"{"Text": "x", "Confidence": "high"}"#).unwrap();
        assert_eq!(detection.confidence, None);

        let detection: ValueDetection =
            serde_json::from_str(r#"{"Text": "x", "Confidence": "87.5"}"#).unwrap();
        assert_eq!(detection.confidence, Some(87.5));

        let detection: ValueDetection = serde_json::from_str(r#"{"Text": "x"}"#).unwrap();
        assert_eq!(detection.confidence, None);
    }

    #[test]
    fn test_unusable_bounding_box_keeps_page_parseable() {
        let page: RawAnalysisPage = serde_json::from_str(
            r#"{"ExpenseDocuments": [{"SummaryFields": [
                {"Type": {"Text": "TOTAL"}, "ValueDetection": {"Text": "9.00", "Geometry": {"BoundingBox": {"Left": 0.1, "Top": 0.1, "Width": 0.2, "Height": 0.2}}}},
                {"Type": {"Text": "TAX"}, "ValueDetection": {"Text": "1.00", "Geometry": {"BoundingBox": {}}}},
                {"Type": {"Text": "SUBTOTAL"}, "ValueDetection": {"Text": "8.00", "Geometry": {"BoundingBox": {"Left": 0.1, "Top": "x", "Width": 0.2}}}},
                {"Type": {"Text": "VENDOR_NAME"}, "ValueDetection": {"Text": "ACME", "Geometry": {"BoundingBox": null}}}
            ]}]}"#,
        )
        .unwrap();

        let fields = &page.expense_documents[0].summary_fields;
        assert_eq!(fields.len(), 4);
        assert!(fields[0].bounding_box().is_some());
        assert!(fields[1..].iter().all(|f| f.bounding_box().is_none()));
        assert_eq!(fields[1].value_text(), Some("1.00"));
    }
}
