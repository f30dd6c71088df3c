//! Transports that deliver one payload to one connection.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::mpsc;

use crate::config::PushConfig;
use crate::error::{ConfigError, DeliveryError};

#[async_trait]
pub trait PushChannel: Send + Sync {
    async fn send(&self, connection_id: &str, payload: &[u8]) -> Result<(), DeliveryError>;
}

/// In-process channel: each connection owns the receiving half of an mpsc
/// queue. A dropped receiver makes the connection `Gone`.
#[derive(Default)]
pub struct LocalPushChannel {
    senders: RwLock<HashMap<String, mpsc::UnboundedSender<Vec<u8>>>>,
}

impl LocalPushChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a connection and returns the queue its payloads arrive on.
    pub fn connect(&self, connection_id: &str) -> mpsc::UnboundedReceiver<Vec<u8>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut senders = self.senders.write().unwrap_or_else(|poisoned| {
            log::warn!("Push channel lock was poisoned, recovering");
            poisoned.into_inner()
        });
        senders.insert(connection_id.to_string(), tx);
        rx
    }
}

#[async_trait]
impl PushChannel for LocalPushChannel {
    async fn send(&self, connection_id: &str, payload: &[u8]) -> Result<(), DeliveryError> {
        let sender = {
            let senders = self.senders.read().unwrap_or_else(|poisoned| {
                log::warn!("Push channel lock was poisoned, recovering");
                poisoned.into_inner()
            });
            senders.get(connection_id).cloned()
        };

        match sender {
            Some(tx) => tx
                .send(payload.to_vec())
                .map_err(|_| DeliveryError::Gone(connection_id.to_string())),
            None => Err(DeliveryError::Gone(connection_id.to_string())),
        }
    }
}

/// Posts payloads to a connection-management gateway at
/// `{endpoint}/@connections/{connectionId}`. `410 Gone` and `404` mark the
/// connection as gone.
pub struct HttpPushChannel {
    client: Client,
    endpoint: Url,
    token: Option<SecretString>,
}

impl HttpPushChannel {
    pub fn new(endpoint: &str, token: Option<SecretString>) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .build()
            .map_err(|e| DeliveryError::Failed(format!("failed to build HTTP client: {}", e)))?;
        let endpoint = Url::parse(endpoint)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| DeliveryError::Failed(format!("invalid endpoint '{}'", endpoint)))?;
        Ok(Self {
            client,
            endpoint,
            token,
        })
    }

    pub fn from_config(config: &PushConfig) -> Result<Self, ConfigError> {
        let endpoint = config
            .endpoint
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| ConfigError::Validation {
                message: "push.endpoint is required".to_string(),
            })?;
        let token = config.auth.resolve()?;
        Self::new(endpoint, token).map_err(|e| ConfigError::Validation {
            message: e.to_string(),
        })
    }

    /// The connection id is percent-encoded as a single path segment.
    fn connection_url(&self, connection_id: &str) -> Result<Url, DeliveryError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| DeliveryError::Failed(format!("invalid endpoint '{}'", self.endpoint)))?
            .pop_if_empty()
            .extend(["@connections", connection_id]);
        Ok(url)
    }
}

fn delivery_error(status: StatusCode, connection_id: &str) -> DeliveryError {
    match status {
        StatusCode::GONE | StatusCode::NOT_FOUND => DeliveryError::Gone(connection_id.to_string()),
        s => DeliveryError::Failed(format!("gateway answered {} for '{}'", s, connection_id)),
    }
}

#[async_trait]
impl PushChannel for HttpPushChannel {
    async fn send(&self, connection_id: &str, payload: &[u8]) -> Result<(), DeliveryError> {
        let mut request = self
            .client
            .post(self.connection_url(connection_id)?)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload.to_vec());
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| DeliveryError::Failed(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(delivery_error(response.status(), connection_id))
        }
    }
}
