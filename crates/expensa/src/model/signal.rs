//! Job-completion signals.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalStatus {
    #[default]
    Succeeded,
    Failed,
}

/// Delivered (at least once) when the backend finishes a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CompletionSignal {
    pub job_id: String,
    pub source_key: String,
    #[serde(default)]
    pub status: SignalStatus,
}

/// The backend's own notification shape.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BackendEnvelope {
    job_id: String,
    status: String,
    document_location: DocumentLocation,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DocumentLocation {
    #[serde(rename = "S3ObjectName")]
    object_name: String,
}

impl CompletionSignal {
    pub fn new(job_id: impl Into<String>, source_key: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            source_key: source_key.into(),
            status: SignalStatus::Succeeded,
        }
    }

    pub fn failed(job_id: impl Into<String>, source_key: impl Into<String>) -> Self {
        Self {
            status: SignalStatus::Failed,
            ..Self::new(job_id, source_key)
        }
    }

    /// Parses either the native `{"jobId", "sourceKey", "status"}` form or
    /// the backend envelope `{"JobId", "Status", "DocumentLocation": {"S3ObjectName"}}`.
    pub fn parse(input: &str) -> Result<Self, serde_json::Error> {
        match serde_json::from_str::<CompletionSignal>(input) {
            Ok(signal) => Ok(signal),
            Err(native_err) => match serde_json::from_str::<BackendEnvelope>(input) {
                Ok(envelope) => Ok(Self::from_envelope(envelope)),
                Err(_) => Err(native_err),
            },
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == SignalStatus::Failed
    }

    fn from_envelope(envelope: BackendEnvelope) -> Self {
        let status = if envelope.status.eq_ignore_ascii_case("SUCCEEDED") {
            SignalStatus::Succeeded
        } else {
            SignalStatus::Failed
        };
        Self {
            job_id: envelope.job_id,
            source_key: envelope.document_location.object_name,
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_native_signal() {
        let signal =
            CompletionSignal::parse(r#"{"jobId": "j1", "sourceKey": "u/t/s/f.pdf"}"#).unwrap();
        assert_eq!(signal, CompletionSignal::new("j1", "u/t/s/f.pdf"));
    }

    #[test]
    fn test_parse_backend_envelope() {
        let signal = CompletionSignal::parse(
            r#"{
                "JobId": "j2",
                "Status": "FAILED",
                "API": "StartExpenseAnalysis",
                "Timestamp": 1700000000,
                "DocumentLocation": {"S3ObjectName": "u/t/s/f.pdf", "S3Bucket": "b"}
            }"#,
        )
        .unwrap();
        assert_eq!(signal.job_id, "j2");
        assert_eq!(signal.source_key, "u/t/s/f.pdf");
        assert!(signal.is_failed());
    }

    #[test]
    fn test_parse_rejects_missing_fields() {
        assert!(CompletionSignal::parse(r#"{"jobId": "j1"}"#).is_err());
        assert!(CompletionSignal::parse(r#"{"jobId": "j1", "sourceKey": "k", "x": 1}"#).is_err());
    }
}
