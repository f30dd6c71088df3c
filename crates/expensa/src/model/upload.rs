//! Upload batches and per-document validation errors.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Structured validation error codes. Serialized in SCREAMING_SNAKE_CASE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NoDocuments,
    TooManyDocuments,
    InvalidFilename,
    InvalidFormat,
    InvalidEncoding,
    EmptyFile,
    FileTooLarge,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NoDocuments => "NO_DOCUMENTS",
            ErrorCode::TooManyDocuments => "TOO_MANY_DOCUMENTS",
            ErrorCode::InvalidFilename => "INVALID_FILENAME",
            ErrorCode::InvalidFormat => "INVALID_FORMAT",
            ErrorCode::InvalidEncoding => "INVALID_ENCODING",
            ErrorCode::EmptyFile => "EMPTY_FILE",
            ErrorCode::FileTooLarge => "FILE_TOO_LARGE",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentError {
    pub file_name: String,
    pub error_code: ErrorCode,
    pub message: String,
}

impl DocumentError {
    pub fn new(file_name: impl Into<String>, error_code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            error_code,
            message: message.into(),
        }
    }

    /// Batch-level error not tied to a single document.
    pub fn batch(error_code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(String::new(), error_code, message)
    }
}

impl fmt::Display for DocumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.file_name.is_empty() {
            write!(f, "{}: {}", self.error_code, self.message)
        } else {
            write!(f, "{} ({}): {}", self.error_code, self.file_name, self.message)
        }
    }
}

/// One uploaded document.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub file_name: String,
    /// Lowercased extension taken from `file_name`; empty when absent.
    pub mime_extension: String,
    pub raw_bytes: Vec<u8>,
    /// Set when the transport encoding could not be decoded. `raw_bytes` is empty then.
    pub encoding_error: Option<String>,
}

impl DocumentUpload {
    pub fn new(file_name: impl Into<String>, raw_bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let mime_extension = crate::sanitize::split_file_name(&file_name)
            .map(|(_, ext)| ext)
            .unwrap_or_default();
        Self {
            file_name,
            mime_extension,
            raw_bytes,
            encoding_error: None,
        }
    }

    fn undecodable(file_name: impl Into<String>, reason: String) -> Self {
        let mut upload = Self::new(file_name, Vec::new());
        upload.encoding_error = Some(reason);
        upload
    }
}

/// Ordered documents of a single submission.
#[derive(Debug, Clone, Default)]
pub struct UploadBatch {
    pub documents: Vec<DocumentUpload>,
}

impl UploadBatch {
    pub fn new(documents: Vec<DocumentUpload>) -> Self {
        Self { documents }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Wire form of an upload: `{"documents": [{"file_name": .., "file": <base64>}]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UploadRequest {
    pub documents: Vec<EncodedDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EncodedDocument {
    pub file_name: String,
    pub file: String,
}

impl UploadRequest {
    /// Decodes every document. Decode failures are kept in the batch so
    /// validation can report them in input order.
    pub fn into_batch(self) -> UploadBatch {
        let documents = self
            .documents
            .into_iter()
            .map(|doc| match STANDARD.decode(doc.file.trim()) {
                Ok(bytes) => DocumentUpload::new(doc.file_name, bytes),
                Err(e) => DocumentUpload::undecodable(doc.file_name, e.to_string()),
            })
            .collect();
        UploadBatch::new(documents)
    }
}
