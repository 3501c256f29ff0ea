//! HTTP exchange with the agent service.

use std::pin::Pin;

use futures::StreamExt as _;
use reqwest::header::{ACCEPT, CONTENT_LENGTH};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ClientConfig;
use crate::errors::{ClientError, TransportError};
use crate::session::SessionId;

/// Raw response body, chunk by chunk.
pub type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, TransportError>> + Send + 'static>>;

/// Body of an invoke request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvokeRequest {
    pub session_id: SessionId,
    pub query: String,
    pub stream: bool,
}

impl InvokeRequest {
    pub fn streaming(session_id: SessionId, query: impl Into<String>) -> Self {
        Self {
            session_id,
            query: query.into(),
            stream: true,
        }
    }
}

/// Reply to a non-streaming invoke.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct InvokeReply {
    pub session_id: SessionId,
    pub result: String,
}

/// One message of a session's conversation as stored by the service.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SessionHistory {
    pub session_id: SessionId,
    pub history: Vec<HistoryEntry>,
}

/// Opens a streaming response for one request.
///
/// Implementations fail fast on a non-success status; there is no retry.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn open_stream(&self, request: &InvokeRequest) -> Result<ByteStream, TransportError>;
}

/// [`Transport`] over `reqwest`.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpTransport {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Invokes the agent without streaming and returns its final answer.
    pub async fn invoke(
        &self,
        session_id: SessionId,
        query: impl Into<String>,
    ) -> Result<InvokeReply, TransportError> {
        let url = self.config.invoke_url();
        let request = InvokeRequest {
            session_id,
            query: query.into(),
            stream: false,
        };
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;
        let response = ensure_success(response, &url).await?;
        response
            .json()
            .await
            .map_err(|e| TransportError::Read(format!("invalid invoke reply: {e}")))
    }

    /// Fetches the conversation the service holds for `session_id`.
    pub async fn history(&self, session_id: &SessionId) -> Result<SessionHistory, TransportError> {
        let url = self.config.history_url(session_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;
        let response = ensure_success(response, &url).await?;
        response
            .json()
            .await
            .map_err(|e| TransportError::Read(format!("invalid history reply: {e}")))
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn open_stream(&self, request: &InvokeRequest) -> Result<ByteStream, TransportError> {
        let url = self.config.invoke_url();
        debug!(session_id = %request.session_id, url = %url, "opening agent stream");
        let response = self
            .client
            .post(&url)
            .header(ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;
        let response = ensure_success(response, &url).await?;

        let empty = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim() == "0");
        if empty {
            return Err(TransportError::NoStream);
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| TransportError::Read(e.to_string())));
        Ok(Box::pin(stream))
    }
}

async fn ensure_success(
    response: reqwest::Response,
    url: &str,
) -> Result<reqwest::Response, TransportError> {
    let status = response.status();
    if status.is_success() && status != reqwest::StatusCode::NO_CONTENT {
        return Ok(response);
    }
    let reason = status.canonical_reason().unwrap_or("").to_string();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    debug!(status = status.as_u16(), url = %url, "agent service rejected request");
    Err(TransportError::from_status(
        status.as_u16(),
        reason,
        url,
        body,
    ))
}
