//! The completion message pushed to subscribers and returned by polling.

use serde::{Deserialize, Serialize};

use crate::model::extraction::{Extraction, FieldMap};
use crate::model::job::{BoundingBoxStatus, JobRecord};

/// Wire shape (field names are fixed for client compatibility):
///
/// ```json
/// { "jobId": "..", "bounding_box_status": "COMPLETED", "image_key": "..",
///   "boxed_images": [".."], "pages": [{ "image": "..", "summary_fields": {}, "line_items": [] }] }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationMessage {
    #[serde(rename = "jobId")]
    pub job_id: String,
    pub bounding_box_status: BoundingBoxStatus,
    pub image_key: String,
    pub boxed_images: Vec<String>,
    pub pages: Vec<NotificationPage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPage {
    pub image: String,
    pub summary_fields: FieldMap,
    pub line_items: Vec<FieldMap>,
}

impl NotificationMessage {
    /// Builds one page entry per raw page `1..=page_count`.
    ///
    /// A page's `image` is its rendered key when every page was rendered,
    /// otherwise the source key. Pages absent from the sparse extraction
    /// carry empty fields.
    pub fn assemble(
        job_id: &str,
        bounding_box_status: BoundingBoxStatus,
        source_key: &str,
        rendered_keys: &[String],
        page_count: usize,
        extraction: &Extraction,
    ) -> Self {
        let rendered = rendered_keys.len() == page_count;
        let pages = (1..=page_count)
            .map(|page_number| NotificationPage {
                image: if rendered {
                    rendered_keys[page_number - 1].clone()
                } else {
                    source_key.to_string()
                },
                summary_fields: extraction
                    .summary_for(page_number)
                    .cloned()
                    .unwrap_or_default(),
                line_items: extraction
                    .line_items_for(page_number)
                    .map(|items| items.to_vec())
                    .unwrap_or_default(),
            })
            .collect();

        Self {
            job_id: job_id.to_string(),
            bounding_box_status,
            image_key: source_key.to_string(),
            boxed_images: rendered_keys.to_vec(),
            pages,
        }
    }

    pub fn from_record(record: &JobRecord) -> Self {
        Self::assemble(
            record.job_id(),
            record.bounding_box_status,
            &record.job.source_key,
            &record.rendered_keys,
            record.page_count,
            &record.extraction,
        )
    }

    pub fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
