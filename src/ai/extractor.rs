//! The model endpoint seam.
//!
//! The pipeline treats the language model as an opaque function from
//! (prompt, output schema) to structured JSON. `HttpExtractor` is the
//! production implementation; tests substitute their own.

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;

/// Errors from a model invocation.
#[derive(Error, Debug)]
pub enum ExtractorError {
    /// Transport-level failure (connect, timeout, TLS).
    #[error("Model request failed: {0}")]
    Request(String),

    /// The endpoint answered with a non-success status.
    #[error("Model endpoint returned status {0}")]
    Status(u16),

    /// The response body was not valid JSON.
    #[error("Model returned invalid response: {0}")]
    InvalidResponse(String),
}

impl ExtractorError {
    /// Model failures are transient by default: transport errors resolve,
    /// and a malformed response is often a one-off the next attempt fixes.
    /// Client errors (4xx) are deterministic and not worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            ExtractorError::Status(code) => *code >= 500,
            ExtractorError::Request(_) | ExtractorError::InvalidResponse(_) => true,
        }
    }
}

/// An opaque model endpoint: prompt + schema in, structured JSON out.
#[async_trait]
pub trait ExpenseExtractor: Send + Sync {
    async fn extract(&self, prompt: &str, schema: &Value) -> Result<Value, ExtractorError>;
}

/// JSON-over-HTTP model client. Single request/response, no streaming.
pub struct HttpExtractor {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpExtractor {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl ExpenseExtractor for HttpExtractor {
    async fn extract(&self, prompt: &str, schema: &Value) -> Result<Value, ExtractorError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({
                "prompt": prompt,
                "outputSchema": schema,
            }))
            .send()
            .await
            .map_err(|e| ExtractorError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExtractorError::Status(status.as_u16()));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ExtractorError::InvalidResponse(e.to_string()))
    }
}
