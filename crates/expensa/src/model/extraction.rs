use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A recognized value with the analyzer's confidence (advisory range 0..=100).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValue {
    pub value: String,
    pub confidence: f64,
}

/// Field name to value, ordered by name.
pub type FieldMap = BTreeMap<String, FieldValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSummary {
    /// 1-based.
    #[serde(rename = "page")]
    pub page_number: usize,
    #[serde(rename = "summary_fields")]
    pub fields: FieldMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLineItems {
    /// 1-based.
    #[serde(rename = "page")]
    pub page_number: usize,
    #[serde(rename = "line_items")]
    pub items: Vec<FieldMap>,
}

/// Output of the field extractor. Both sequences are sparse: a page
/// appears only if it yielded at least one recognized field of that kind.
/// Serializes as `{"summary_fields": [{"page", "summary_fields"}], "line_items": [{"page", "line_items"}]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    pub summary_fields: Vec<PageSummary>,
    pub line_items: Vec<PageLineItems>,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.summary_fields.is_empty() && self.line_items.is_empty()
    }

    pub fn summary_for(&self, page_number: usize) -> Option<&FieldMap> {
        self.summary_fields
            .iter()
            .find(|p| p.page_number == page_number)
            .map(|p| &p.fields)
    }

    pub fn line_items_for(&self, page_number: usize) -> Option<&[FieldMap]> {
        self.line_items
            .iter()
            .find(|p| p.page_number == page_number)
            .map(|p| p.items.as_slice())
    }

    /// Merged per-page view, containing only pages with at least one
    /// recognized field, in page order.
    pub fn pages(&self) -> Vec<ExtractedPage> {
        let mut numbers: Vec<usize> = self
            .summary_fields
            .iter()
            .map(|p| p.page_number)
            .chain(self.line_items.iter().map(|p| p.page_number))
            .collect();
        numbers.sort_unstable();
        numbers.dedup();

        numbers
            .into_iter()
            .map(|page_number| ExtractedPage {
                page_number,
                summary_fields: self.summary_for(page_number).cloned().unwrap_or_default(),
                line_items: self
                    .line_items_for(page_number)
                    .map(|items| items.to_vec())
                    .unwrap_or_default(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedPage {
    pub page_number: usize,
    pub summary_fields: FieldMap,
    pub line_items: Vec<FieldMap>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(value: &str, confidence: f64) -> FieldValue {
        FieldValue {
            value: value.to_string(),
            confidence,
        }
    }

    #[test]
    fn test_pages_merges_sparse_sequences() {
        let extraction = Extraction {
            summary_fields: vec![PageSummary {
                page_number: 1,
                fields: BTreeMap::from([("TOTAL".to_string(), field("10", 90.0))]),
            }],
            line_items: vec![PageLineItems {
                page_number: 3,
                items: vec![BTreeMap::from([("ITEM".to_string(), field("Tea", 80.0))])],
            }],
        };

        let pages = extraction.pages();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].page_number, 1);
        assert!(pages[0].line_items.is_empty());
        assert_eq!(pages[1].page_number, 3);
        assert!(pages[1].summary_fields.is_empty());
        assert_eq!(pages[1].line_items.len(), 1);
    }

    #[test]
    fn test_results_document_shape() {
        let extraction = Extraction {
            summary_fields: vec![PageSummary {
                page_number: 2,
                fields: BTreeMap::from([("TAX".to_string(), field("1.50", 70.0))]),
            }],
            line_items: Vec::new(),
        };

        let value = serde_json::to_value(&extraction).unwrap();
        assert_eq!(value["summary_fields"][0]["page"], 2);
        assert_eq!(value["summary_fields"][0]["summary_fields"]["TAX"]["value"], "1.50");
        assert_eq!(value["line_items"], serde_json::json!([]));
    }

    #[test]
    fn test_empty_extraction_has_no_pages() {
        let extraction = Extraction::default();
        assert!(extraction.is_empty());
        assert!(extraction.pages().is_empty());
    }
}
