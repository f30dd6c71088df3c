//! Deterministic object key naming.
//!
//! ```text
//! {uploadPrefix}/{tenant}/{subject}/{unixSeconds}-{sha256[..10]}-{base}.{ext}
//! {rawPrefix}/{tenant}/{subject}/{base}/{base}_preprocessed.json
//! {resultsPrefix}/{tenant}/{subject}/{base}/{base}_results.json
//! {resultsPrefix}/{tenant}/{subject}/{base}/{base}[_page_N].png
//! ```

use sha2::{Digest, Sha256};

use crate::config::StorageConfig;
use crate::error::StorageError;
use crate::sanitize;

/// A stored source document and the context derived from its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub key: String,
    pub tenant_id: String,
    pub subject_id: String,
    /// File name of the key without its extension.
    pub base_name: String,
    /// Lowercased extension.
    pub extension: String,
}

impl SourceDocument {
    /// Context from a known tenant and subject.
    pub fn new(
        key: impl Into<String>,
        tenant_id: impl Into<String>,
        subject_id: impl Into<String>,
    ) -> Result<Self, StorageError> {
        let key = key.into();
        let (base_name, extension) = split_key_file(&key)?;
        Ok(Self {
            tenant_id: tenant_id.into(),
            subject_id: subject_id.into(),
            base_name,
            extension,
            key,
        })
    }

    /// Context recovered from the key path `.../{tenant}/{subject}/{file}`.
    pub fn from_key(key: impl Into<String>) -> Result<Self, StorageError> {
        let key = key.into();
        let parts: Vec<&str> = key.split('/').collect();
        if parts.len() < 3 || parts.iter().any(|p| p.is_empty()) {
            return Err(StorageError::InvalidKey(key));
        }
        let tenant_id = parts[parts.len() - 3].to_string();
        let subject_id = parts[parts.len() - 2].to_string();
        Self::new(key, tenant_id, subject_id)
    }

    /// Multi-page formats are rasterized and their pages carry a `_page_N` suffix.
    pub fn is_paginated(&self) -> bool {
        self.extension == "pdf"
    }
}

fn split_key_file(key: &str) -> Result<(String, String), StorageError> {
    let file = key.rsplit('/').next().unwrap_or(key);
    match file.rsplit_once('.') {
        Some((base, ext)) if !base.is_empty() && !ext.is_empty() => {
            Ok((base.to_string(), ext.to_ascii_lowercase()))
        }
        _ => Err(StorageError::InvalidKey(key.to_string())),
    }
}

/// Prefixes used to build every key.
#[derive(Debug, Clone)]
pub struct KeyLayout {
    upload_prefix: String,
    raw_prefix: String,
    results_prefix: String,
}

impl Default for KeyLayout {
    fn default() -> Self {
        Self::from_config(&StorageConfig::default())
    }
}

impl KeyLayout {
    pub fn from_config(config: &StorageConfig) -> Self {
        Self {
            upload_prefix: trim_prefix(&config.upload_prefix),
            raw_prefix: trim_prefix(&config.raw_prefix),
            results_prefix: trim_prefix(&config.results_prefix),
        }
    }

    /// Content-derived upload key. Returns `None` when the file name has no
    /// usable base or extension.
    pub fn upload_key(
        &self,
        tenant_id: &str,
        subject_id: &str,
        file_name: &str,
        content: &[u8],
        unix_seconds: i64,
    ) -> Option<String> {
        let (base, ext) = sanitize::split_file_name(file_name)?;
        let digest = format!("{:x}", Sha256::digest(content));
        Some(format!(
            "{}/{}/{}/{}-{}-{}.{}",
            self.upload_prefix,
            sanitize::sanitize_component(tenant_id),
            sanitize::sanitize_component(subject_id),
            unix_seconds,
            &digest[..10],
            sanitize::sanitize_component(base),
            sanitize::sanitize_component(&ext),
        ))
    }

    pub fn raw_pages_key(&self, doc: &SourceDocument) -> String {
        format!(
            "{}/{}_preprocessed.json",
            self.document_dir(&self.raw_prefix, doc),
            doc.base_name
        )
    }

    pub fn results_key(&self, doc: &SourceDocument) -> String {
        format!(
            "{}/{}_results.json",
            self.document_dir(&self.results_prefix, doc),
            doc.base_name
        )
    }

    /// `page` is 1-based.
    pub fn rendered_page_key(&self, doc: &SourceDocument, page: usize) -> String {
        let suffix = if doc.is_paginated() {
            format!("_page_{}", page)
        } else {
            String::new()
        };
        format!(
            "{}/{}{}.png",
            self.document_dir(&self.results_prefix, doc),
            doc.base_name,
            suffix
        )
    }

    fn document_dir(&self, prefix: &str, doc: &SourceDocument) -> String {
        format!(
            "{}/{}/{}/{}",
            prefix,
            sanitize::sanitize_component(&doc.tenant_id),
            sanitize::sanitize_component(&doc.subject_id),
            doc.base_name
        )
    }
}

fn trim_prefix(prefix: &str) -> String {
    prefix.trim_matches('/').to_string()
}
