//! Contract of the external document-understanding service.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;
use crate::model::analysis::RawAnalysisPage;

pub mod http;

pub use http::HttpAnalysisBackend;

/// A stored document the backend can read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRef {
    pub document_key: String,
}

impl DocumentRef {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            document_key: key.into(),
        }
    }
}

/// One page of a paginated job result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultPage {
    #[serde(default)]
    pub results: Vec<RawAnalysisPage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Starts an asynchronous analysis job and returns its id.
    async fn submit_async(
        &self,
        document: &DocumentRef,
        output_location: Option<&str>,
        notification_target: Option<&str>,
    ) -> Result<String, BackendError>;

    /// Fetches one result page. `continuation` is the previous page's `next_token`.
    async fn fetch_result_page(
        &self,
        job_id: &str,
        continuation: Option<&str>,
    ) -> Result<ResultPage, BackendError>;

    /// Analyzes an inline-capable document synchronously.
    async fn analyze_sync(&self, document: &DocumentRef) -> Result<Vec<RawAnalysisPage>, BackendError>;
}

/// Follows continuation tokens until the backend reports none, concatenating
/// results in order. An empty result set is not an error; a token handed out
/// twice is, since the backend would otherwise be followed around a cycle.
pub async fn fetch_all_pages(
    backend: &dyn AnalysisBackend,
    job_id: &str,
) -> Result<Vec<RawAnalysisPage>, BackendError> {
    let mut pages = Vec::new();
    let mut token: Option<String> = None;
    let mut seen: HashSet<String> = HashSet::new();
    let mut fetches = 0usize;

    loop {
        let page = backend.fetch_result_page(job_id, token.as_deref()).await?;
        fetches += 1;
        pages.extend(page.results);

        match page.next_token {
            Some(next) if !next.is_empty() => {
                if !seen.insert(next.clone()) {
                    return Err(BackendError::InvalidResponse(format!(
                        "continuation token '{}' repeated after {} fetches",
                        next, fetches
                    )));
                }
                token = Some(next);
            }
            _ => break,
        }
    }

    tracing::debug!(job_id, fetches, pages = pages.len(), "Fetched all result pages");
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Paged {
        pages: Vec<ResultPage>,
        seen_tokens: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl AnalysisBackend for Paged {
        async fn submit_async(
            &self,
            _document: &DocumentRef,
            _output_location: Option<&str>,
            _notification_target: Option<&str>,
        ) -> Result<String, BackendError> {
            unreachable!()
        }

        async fn fetch_result_page(
            &self,
            _job_id: &str,
            continuation: Option<&str>,
        ) -> Result<ResultPage, BackendError> {
            let mut seen = self.seen_tokens.lock().unwrap();
            let idx = seen.len();
            seen.push(continuation.map(str::to_string));
            Ok(self.pages[idx].clone())
        }

        async fn analyze_sync(
            &self,
            _document: &DocumentRef,
        ) -> Result<Vec<RawAnalysisPage>, BackendError> {
            unreachable!()
        }
    }

    fn result_page(n: usize, next: Option<&str>) -> ResultPage {
        ResultPage {
            results: vec![RawAnalysisPage::default(); n],
            next_token: next.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_follows_tokens_in_order() {
        let backend = Paged {
            pages: vec![
                result_page(1, Some("a")),
                result_page(2, Some("b")),
                result_page(1, None),
            ],
            seen_tokens: Mutex::new(Vec::new()),
        };

        let pages = fetch_all_pages(&backend, "job").await.unwrap();

        assert_eq!(pages.len(), 4);
        assert_eq!(
            *backend.seen_tokens.lock().unwrap(),
            vec![None, Some("a".to_string()), Some("b".to_string())]
        );
    }

    #[tokio::test]
    async fn test_zero_results_is_ok() {
        let backend = Paged {
            pages: vec![result_page(0, None)],
            seen_tokens: Mutex::new(Vec::new()),
        };
        assert!(fetch_all_pages(&backend, "job").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_repeated_token_is_rejected() {
        let backend = Paged {
            pages: vec![result_page(1, Some("a")), result_page(1, Some("a"))],
            seen_tokens: Mutex::new(Vec::new()),
        };
        assert!(matches!(
            fetch_all_pages(&backend, "job").await,
            Err(BackendError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_token_cycle_is_rejected() {
        let backend = Paged {
            pages: vec![
                result_page(1, Some("a")),
                result_page(1, Some("b")),
                result_page(1, Some("a")),
                result_page(1, None),
            ],
            seen_tokens: Mutex::new(Vec::new()),
        };

        let result = fetch_all_pages(&backend, "job").await;

        assert!(matches!(result, Err(BackendError::InvalidResponse(_))));
        assert_eq!(backend.seen_tokens.lock().unwrap().len(), 3);
    }
}
