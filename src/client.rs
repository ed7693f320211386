//! HTTP client for the backend flow service
//!
//! Every call is a single request/response exchange: no retries, no
//! backoff, no caching. Failures are normalized into [`FlowError`] values
//! so the controller can branch without exception handling.

use crate::flow::{FlowResult, Node};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

/// Flow service error with classification.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct FlowError {
    pub kind: FlowErrorKind,
    pub message: String,
    /// Original HTTP status for backend failures.
    pub status: Option<u16>,
    /// Raw response body, kept verbatim for diagnosis.
    pub raw: Option<String>,
}

impl FlowError {
    pub fn new(kind: FlowErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            raw: None,
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(FlowErrorKind::Transport, message)
    }

    pub fn backend(status: u16, message: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            kind: FlowErrorKind::Backend,
            message: message.into(),
            status: Some(status),
            raw: Some(raw.into()),
        }
    }

    pub fn malformed(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        Self {
            kind: FlowErrorKind::MalformedResponse,
            message: format!("Backend returned a non-JSON body: {raw}"),
            status: None,
            raw: Some(raw),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(FlowErrorKind::Configuration, message)
    }

    pub fn session_not_found(message: impl Into<String>) -> Self {
        Self::new(FlowErrorKind::SessionNotFound, message)
    }
}

/// Error classification for the flow protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowErrorKind {
    /// Proxy misconfigured; fatal to the request, not to the process.
    Configuration,
    /// Network-level failure (DNS/connection/timeout).
    Transport,
    /// Non-2xx HTTP response with structured or raw body.
    Backend,
    /// 2xx response whose body is not valid JSON.
    MalformedResponse,
    /// The backend no longer knows the session; restart recovers.
    SessionNotFound,
}

impl FlowErrorKind {
    /// Whether the only way forward is a fresh session.
    pub fn needs_restart(self) -> bool {
        matches!(self, FlowErrorKind::SessionNotFound)
    }
}

/// Successful `start` exchange.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StartOutcome {
    pub session_id: String,
    pub node: Node,
}

/// Successful `answer` exchange. Exactly one of `node`/`result` is
/// populated depending on `done`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnswerOutcome {
    pub done: bool,
    #[serde(default)]
    pub node: Option<Node>,
    #[serde(default)]
    pub context: Option<Value>,
    #[serde(default)]
    pub result: Option<FlowResult>,
}

/// Abstraction over the flow backend, mockable in tests.
#[async_trait]
pub trait FlowService: Send + Sync {
    async fn start(&self, flow_id: &str) -> Result<StartOutcome, FlowError>;

    async fn submit_answer(
        &self,
        session_id: &str,
        node_id: &str,
        answer: &Value,
    ) -> Result<AnswerOutcome, FlowError>;
}

/// Production client talking to the flow service over HTTP.
pub struct FlowClient {
    client: Client,
    base_url: String,
}

impl FlowClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        let base_url: String = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Single POST exchange: body read as raw text first, parsed by the
    /// caller, so a parse failure can carry the original text.
    async fn exchange(&self, path: &str, body: &Value) -> Result<String, FlowError> {
        let url = format!("{}{path}", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FlowError::transport(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    FlowError::transport(format!("Connection failed: {e}"))
                } else {
                    FlowError::transport(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|e| FlowError::transport(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(classify_failure(status.as_u16(), &raw));
        }

        Ok(raw)
    }
}

#[async_trait]
impl FlowService for FlowClient {
    async fn start(&self, flow_id: &str) -> Result<StartOutcome, FlowError> {
        tracing::debug!(flow_id, "starting flow");
        let raw = self
            .exchange("/onboarding/start", &json!({ "flow_id": flow_id }))
            .await?;
        serde_json::from_str(&raw).map_err(|_| FlowError::malformed(raw))
    }

    async fn submit_answer(
        &self,
        session_id: &str,
        node_id: &str,
        answer: &Value,
    ) -> Result<AnswerOutcome, FlowError> {
        tracing::debug!(session_id, node_id, "submitting answer");
        let raw = self
            .exchange(
                "/onboarding/answer",
                &json!({
                    "session_id": session_id,
                    "node_id": node_id,
                    "answer": answer,
                }),
            )
            .await?;
        serde_json::from_str(&raw).map_err(|_| FlowError::malformed(raw))
    }
}

/// Classify a non-2xx response, preferring the structured `detail` field
/// for the human-readable message when the body parses as JSON.
fn classify_failure(status: u16, raw: &str) -> FlowError {
    let detail = serde_json::from_str::<Value>(raw)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(String::from));

    match (status, detail.as_deref()) {
        (404, Some("Session not found")) => FlowError::session_not_found(
            "This session is no longer known to the backend. Restart to begin again.",
        ),
        (_, Some("Proxy configuration error")) => {
            let message = serde_json::from_str::<Value>(raw)
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
                .unwrap_or_else(|| "Proxy configuration error".to_string());
            FlowError::configuration(message)
        }
        (_, Some(detail)) => FlowError::backend(status, format!("{detail} (HTTP {status})"), raw),
        (_, None) => FlowError::backend(status, format!("HTTP {status}: {raw}"), raw),
    }
}
