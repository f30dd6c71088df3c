//! JSON-over-HTTP client for the analysis service.
//!
//! Routes:
//! - `POST {endpoint}/jobs` starts a job, answers `{"jobId": ...}`
//! - `GET {endpoint}/jobs/{jobId}/results?nextToken=...` answers one [`ResultPage`]
//! - `POST {endpoint}/analyze` answers `{"results": [...]}`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{AnalysisBackend, DocumentRef, ResultPage};
use crate::config::BackendConfig;
use crate::error::{BackendError, ConfigError};
use crate::model::analysis::RawAnalysisPage;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartJobRequest<'a> {
    document_key: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_location: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    notification_target: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartJobResponse {
    job_id: String,
}

#[derive(Debug, Deserialize)]
struct AnalyzeResponse {
    #[serde(default)]
    results: Vec<RawAnalysisPage>,
}

pub struct HttpAnalysisBackend {
    client: Client,
    endpoint: Url,
    token: Option<SecretString>,
}

impl HttpAnalysisBackend {
    pub fn new(endpoint: &str, token: Option<SecretString>) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| BackendError::Transport(format!("failed to build HTTP client: {}", e)))?;
        let endpoint = Url::parse(endpoint)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| BackendError::Transport(format!("invalid endpoint '{}'", endpoint)))?;
        Ok(Self {
            client,
            endpoint,
            token,
        })
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self, ConfigError> {
        let endpoint = config
            .endpoint
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| ConfigError::Validation {
                message: "backend.endpoint is required".to_string(),
            })?;
        let token = config.auth.resolve()?;
        Self::new(endpoint, token).map_err(|e| ConfigError::Validation {
            message: e.to_string(),
        })
    }

    /// Appends path segments to the endpoint. Each segment is
    /// percent-encoded, `/` included.
    fn url(&self, segments: &[&str]) -> Result<Url, BackendError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| BackendError::Transport(format!("invalid endpoint '{}'", self.endpoint)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn jobs_url(&self) -> Result<Url, BackendError> {
        self.url(&["jobs"])
    }

    fn results_url(&self, job_id: &str) -> Result<Url, BackendError> {
        self.url(&["jobs", job_id, "results"])
    }

    fn analyze_url(&self) -> Result<Url, BackendError> {
        self.url(&["analyze"])
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }
}

/// Maps a non-success status to the matching error. 404 is only meaningful
/// for result fetches, where it names an unknown job.
fn status_error(status: StatusCode, body: String, job_id: Option<&str>) -> BackendError {
    match (status, job_id) {
        (StatusCode::NOT_FOUND, Some(id)) => BackendError::UnknownJob(id.to_string()),
        (s, _) if s.is_client_error() => BackendError::Rejected(format!("{}: {}", s, body)),
        (s, _) => BackendError::Transport(format!("{}: {}", s, body)),
    }
}

async fn check(response: Response, job_id: Option<&str>) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<body unavailable>".to_string());
    Err(status_error(status, body, job_id))
}

#[async_trait]
impl AnalysisBackend for HttpAnalysisBackend {
    async fn submit_async(
        &self,
        document: &DocumentRef,
        output_location: Option<&str>,
        notification_target: Option<&str>,
    ) -> Result<String, BackendError> {
        let body = StartJobRequest {
            document_key: &document.document_key,
            output_location,
            notification_target,
        };
        let response = self
            .authorize(self.client.post(self.jobs_url()?))
            .json(&body)
            .send()
            .await?;
        let started: StartJobResponse = check(response, None).await?.json().await?;

        if started.job_id.is_empty() {
            return Err(BackendError::InvalidResponse(
                "backend returned an empty job id".to_string(),
            ));
        }
        Ok(started.job_id)
    }

    async fn fetch_result_page(
        &self,
        job_id: &str,
        continuation: Option<&str>,
    ) -> Result<ResultPage, BackendError> {
        let mut request = self.client.get(self.results_url(job_id)?);
        if let Some(token) = continuation {
            request = request.query(&[("nextToken", token)]);
        }
        let response = self.authorize(request).send().await?;
        Ok(check(response, Some(job_id)).await?.json().await?)
    }

    async fn analyze_sync(&self, document: &DocumentRef) -> Result<Vec<RawAnalysisPage>, BackendError> {
        let response = self
            .authorize(self.client.post(self.analyze_url()?))
            .json(document)
            .send()
            .await?;
        let analyzed: AnalyzeResponse = check(response, None).await?.json().await?;
        Ok(analyzed.results)
    }
}
