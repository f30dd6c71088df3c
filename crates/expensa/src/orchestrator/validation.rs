//! Batch and per-document upload checks.

use std::collections::BTreeSet;

use crate::config::{FormatsConfig, LimitsConfig};
use crate::model::upload::{DocumentError, DocumentUpload, ErrorCode, UploadBatch};
use crate::sanitize;

pub struct DocumentValidator {
    max_documents: usize,
    min_bytes: usize,
    max_bytes: usize,
    allowed: BTreeSet<String>,
}

impl DocumentValidator {
    pub fn new(limits: &LimitsConfig, formats: &FormatsConfig) -> Self {
        Self {
            max_documents: limits.max_documents,
            min_bytes: limits.min_bytes,
            max_bytes: limits.max_bytes,
            allowed: formats.allowed_set(),
        }
    }

    /// Count checks, applied before any document is inspected.
    pub fn check_batch(&self, batch: &UploadBatch) -> Result<(), DocumentError> {
        if batch.is_empty() {
            return Err(DocumentError::batch(
                ErrorCode::NoDocuments,
                "No documents provided",
            ));
        }
        if batch.len() > self.max_documents {
            return Err(DocumentError::batch(
                ErrorCode::TooManyDocuments,
                format!(
                    "Maximum {} documents per request, got {}",
                    self.max_documents,
                    batch.len()
                ),
            ));
        }
        Ok(())
    }

    /// Filename, then format, then encoding, then size.
    pub fn validate(&self, document: &DocumentUpload) -> Result<(), DocumentError> {
        let file_name = document.file_name.as_str();
        let reject = |code, message: String| Err(DocumentError::new(file_name, code, message));

        let Some((_, extension)) = sanitize::split_file_name(file_name) else {
            return reject(
                ErrorCode::InvalidFilename,
                "File name must have a non-empty base name and an extension".to_string(),
            );
        };

        if !self.allowed.contains(&extension) {
            let allowed: Vec<&str> = self.allowed.iter().map(String::as_str).collect();
            return reject(
                ErrorCode::InvalidFormat,
                format!(
                    "Unsupported format '{}', allowed: {}",
                    extension,
                    allowed.join(", ")
                ),
            );
        }

        if let Some(reason) = &document.encoding_error {
            return reject(
                ErrorCode::InvalidEncoding,
                format!("File content is not valid base64: {}", reason),
            );
        }

        let size = document.raw_bytes.len();
        if size < self.min_bytes {
            return reject(
                ErrorCode::EmptyFile,
                format!("File is empty or smaller than {} bytes", self.min_bytes),
            );
        }
        if size > self.max_bytes {
            return reject(
                ErrorCode::FileTooLarge,
                format!("File is {} bytes, maximum is {}", size, self.max_bytes),
            );
        }

        Ok(())
    }

    /// Checks every document in order and splits the batch. Both halves keep
    /// input order.
    pub fn partition(&self, batch: UploadBatch) -> (Vec<DocumentUpload>, Vec<DocumentError>) {
        let mut valid = Vec::with_capacity(batch.len());
        let mut rejected = Vec::new();
        for document in batch.documents {
            match self.validate(&document) {
                Ok(()) => valid.push(document),
                Err(e) => rejected.push(e),
            }
        }
        (valid, rejected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> DocumentValidator {
        DocumentValidator::new(
            &LimitsConfig {
                max_documents: 3,
                min_bytes: 1,
                max_bytes: 8,
            },
            &FormatsConfig::default(),
        )
    }

    fn doc(name: &str, size: usize) -> DocumentUpload {
        DocumentUpload::new(name, vec![7u8; size])
    }

    fn code_of(result: Result<(), DocumentError>) -> ErrorCode {
        result.unwrap_err().error_code
    }

    #[test]
    fn test_batch_counts() {
        let v = validator();
        assert_eq!(
            v.check_batch(&UploadBatch::default()).unwrap_err().error_code,
            ErrorCode::NoDocuments
        );
        let four = UploadBatch::new((0..4).map(|i| doc(&format!("{}.pdf", i), 2)).collect());
        assert_eq!(
            v.check_batch(&four).unwrap_err().error_code,
            ErrorCode::TooManyDocuments
        );
        let three = UploadBatch::new((0..3).map(|i| doc(&format!("{}.pdf", i), 2)).collect());
        assert!(v.check_batch(&three).is_ok());
    }

    #[test]
    fn test_document_error_codes() {
        let v = validator();
        assert!(v.validate(&doc("receipt.JPG", 4)).is_ok());
        assert_eq!(code_of(v.validate(&doc("noextension", 4))), ErrorCode::InvalidFilename);
        assert_eq!(code_of(v.validate(&doc(".pdf", 4))), ErrorCode::InvalidFilename);
        assert_eq!(code_of(v.validate(&doc("", 4))), ErrorCode::InvalidFilename);
        assert_eq!(code_of(v.validate(&doc("notes.txt", 4))), ErrorCode::InvalidFormat);
        assert_eq!(code_of(v.validate(&doc("empty.pdf", 0))), ErrorCode::EmptyFile);
        assert_eq!(code_of(v.validate(&doc("big.pdf", 9))), ErrorCode::FileTooLarge);
    }

    #[test]
    fn test_size_bounds_are_inclusive() {
        let v = validator();
        assert!(v.validate(&doc("a.png", 1)).is_ok());
        assert!(v.validate(&doc("a.png", 8)).is_ok());
    }

    #[test]
    fn test_format_is_checked_before_size() {
        let v = validator();
        assert_eq!(code_of(v.validate(&doc("huge.gif", 100))), ErrorCode::InvalidFormat);
    }

    #[test]
    fn test_encoding_error_reported() {
        let v = validator();
        let mut upload = doc("scan.pdf", 0);
        upload.encoding_error = Some("Invalid byte 33, offset 0.".to_string());
        let err = v.validate(&upload).unwrap_err();
        assert_eq!(err.error_code, ErrorCode::InvalidEncoding);
        assert_eq!(err.file_name, "scan.pdf");
    }

    #[test]
    fn test_partition_keeps_order_and_checks_everything() {
        let v = validator();
        let batch = UploadBatch::new(vec![
            doc("a.gif", 2),
            doc("b.pdf", 2),
            doc("c.pdf", 0),
        ]);
        let (valid, rejected) = v.partition(batch);

        assert_eq!(valid.len(), 1);
        assert_eq!(valid[0].file_name, "b.pdf");
        let codes: Vec<_> = rejected.iter().map(|e| e.error_code).collect();
        assert_eq!(codes, vec![ErrorCode::InvalidFormat, ErrorCode::EmptyFile]);
    }
}
