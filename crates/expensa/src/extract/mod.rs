//! Field extraction: raw analysis pages to sparse per-page field maps.

use tracing::{debug, debug_span};

use crate::model::analysis::{ExpenseField, RawAnalysisPage};
use crate::model::extraction::{Extraction, FieldMap, FieldValue, PageLineItems, PageSummary};

/// Document-level fields kept by the extractor.
pub const SUMMARY_FIELDS: &[&str] = &[
    "INVOICE_RECEIPT_DATE",
    "INVOICE_RECEIPT_ID",
    "VENDOR_NAME",
    "RECEIVER_NAME",
    "PO_NUMBER",
    "TOTAL",
    "SUBTOTAL",
    "TAX",
    "VENDOR_VAT_NUMBER",
    "RECEIVER_VAT_NUMBER",
];

/// Line-item fields kept by the extractor.
pub const LINE_ITEM_FIELDS: &[&str] = &["ITEM", "QUANTITY", "PRICE", "UNIT_PRICE"];

/// Value used when the analyzer detected a field but returned no text.
pub const UNKNOWN_VALUE: &str = "Unknown";

pub fn is_summary_field(field_type: &str) -> bool {
    SUMMARY_FIELDS.contains(&field_type)
}

pub fn is_line_item_field(field_type: &str) -> bool {
    LINE_ITEM_FIELDS.contains(&field_type)
}

/// Extracts whitelisted fields from every page, numbering pages from 1.
///
/// Pages without a recognized summary field are absent from
/// `summary_fields`; pages without a recognized line item are absent from
/// `line_items`. A repeated summary field on the same page keeps the last
/// occurrence.
pub fn extract(pages: &[RawAnalysisPage]) -> Extraction {
    let _span = debug_span!("extract", pages = pages.len()).entered();
    let mut extraction = Extraction::default();

    for (idx, page) in pages.iter().enumerate() {
        let page_number = idx + 1;
        let mut summary = FieldMap::new();
        let mut items: Vec<FieldMap> = Vec::new();

        for document in &page.expense_documents {
            for field in &document.summary_fields {
                if let Some((name, value)) = recognize(field, is_summary_field) {
                    summary.insert(name, value);
                }
            }

            for group in &document.line_item_groups {
                for line_item in &group.line_items {
                    let item: FieldMap = line_item
                        .line_item_expense_fields
                        .iter()
                        .filter_map(|field| recognize(field, is_line_item_field))
                        .collect();
                    if !item.is_empty() {
                        items.push(item);
                    }
                }
            }
        }

        debug!(
            page = page_number,
            summary_fields = summary.len(),
            line_items = items.len(),
            "Extracted page"
        );

        if !summary.is_empty() {
            extraction.summary_fields.push(PageSummary {
                page_number,
                fields: summary,
            });
        }
        if !items.is_empty() {
            extraction.line_items.push(PageLineItems {
                page_number,
                items,
            });
        }
    }

    extraction
}

fn recognize(field: &ExpenseField, accept: fn(&str) -> bool) -> Option<(String, FieldValue)> {
    let field_type = field.type_text()?;
    if !accept(field_type) {
        return None;
    }
    let value = FieldValue {
        value: field
            .value_text()
            .map(str::to_string)
            .unwrap_or_else(|| UNKNOWN_VALUE.to_string()),
        confidence: field.confidence().unwrap_or(0.0),
    };
    Some((field_type.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(json: &str) -> RawAnalysisPage {
        serde_json::from_str(json).unwrap()
    }

    fn total_page() -> RawAnalysisPage {
        page(
            r#"{"ExpenseDocuments": [{
                "SummaryFields": [
                    {"Type": {"Text": "TOTAL"}, "ValueDetection": {"Text": "100.00", "Confidence": 99.2}},
                    {"Type": {"Text": "OTHER"}, "ValueDetection": {"Text": "ignored", "Confidence": 50}}
                ]
            }]}"#,
        )
    }

    #[test]
    fn test_extracts_whitelisted_summary_field() {
        let extraction = extract(&[total_page()]);

        assert_eq!(extraction.summary_fields.len(), 1);
        let fields = extraction.summary_for(1).unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(
            fields["TOTAL"],
            FieldValue {
                value: "100.00".to_string(),
                confidence: 99.2
            }
        );
        assert!(extraction.line_items.is_empty());
    }

    #[test]
    fn test_pages_without_fields_are_omitted() {
        let empty = page(r#"{"ExpenseDocuments": [{"SummaryFields": [{"Type": {"Text": "ADDRESS"}}]}]}"#);
        let extraction = extract(&[empty.clone(), total_page(), empty]);

        assert_eq!(extraction.summary_fields.len(), 1);
        assert_eq!(extraction.summary_fields[0].page_number, 2);
        assert!(extraction.summary_for(1).is_none());
        assert!(extraction.summary_for(3).is_none());
    }

    #[test]
    fn test_missing_value_and_confidence_fall_back() {
        let extraction = extract(&[page(
            r#"{"ExpenseDocuments": [{"SummaryFields": [
                {"Type": {"Text": "VENDOR_NAME"}},
                {"Type": {"Text": "TAX"}, "ValueDetection": {"Text": "5", "Confidence": "n/a"}}
            ]}]}"#,
        )]);

        let fields = extraction.summary_for(1).unwrap();
        assert_eq!(fields["VENDOR_NAME"].value, UNKNOWN_VALUE);
        assert_eq!(fields["VENDOR_NAME"].confidence, 0.0);
        assert_eq!(fields["TAX"].value, "5");
        assert_eq!(fields["TAX"].confidence, 0.0);
    }

    #[test]
    fn test_line_items_grouped_and_empty_items_dropped() {
        let extraction = extract(&[page(
            r#"{"ExpenseDocuments": [{"LineItemGroups": [{"LineItems": [
                {"LineItemExpenseFields": [
                    {"Type": {"Text": "ITEM"}, "ValueDetection": {"Text": "Coffee", "Confidence": 97.1}},
                    {"Type": {"Text": "PRICE"}, "ValueDetection": {"Text": "3.50", "Confidence": 96}},
                    {"Type": {"Text": "EXPENSE_ROW"}, "ValueDetection": {"Text": "Coffee 3.50"}}
                ]},
                {"LineItemExpenseFields": [
                    {"Type": {"Text": "EXPENSE_ROW"}, "ValueDetection": {"Text": "noise"}}
                ]},
                {"LineItemExpenseFields": [
                    {"Type": {"Text": "QUANTITY"}, "ValueDetection": {"Text": "2", "Confidence": 88}}
                ]}
            ]}]}]}"#,
        )]);

        assert!(extraction.summary_fields.is_empty());
        let items = extraction.line_items_for(1).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].len(), 2);
        assert_eq!(items[0]["ITEM"].value, "Coffee");
        assert_eq!(items[0]["PRICE"].confidence, 96.0);
        assert_eq!(items[1]["QUANTITY"].value, "2");
    }

    #[test]
    fn test_fields_from_multiple_documents_on_one_page_merge() {
        let extraction = extract(&[page(
            r#"{"ExpenseDocuments": [
                {"SummaryFields": [{"Type": {"Text": "TOTAL"}, "ValueDetection": {"Text": "1"}}]},
                {"SummaryFields": [
                    {"Type": {"Text": "TOTAL"}, "ValueDetection": {"Text": "2"}},
                    {"Type": {"Text": "TAX"}, "ValueDetection": {"Text": "0.2"}}
                ]}
            ]}"#,
        )]);

        let fields = extraction.summary_for(1).unwrap();
        assert_eq!(fields["TOTAL"].value, "2");
        assert_eq!(fields["TAX"].value, "0.2");
    }

    #[test]
    fn test_no_pages_yields_empty_extraction() {
        assert!(extract(&[]).is_empty());
    }
}
