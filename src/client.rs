//! Core client traits and error types.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::model::StreamSummary;
use crate::sse::EventSink;

/// Errors that can occur during client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The proxy answered with a non-success status.
    #[error("Proxy error {status}: {body}")]
    Status { status: u16, body: String },

    /// A byte source other than reqwest failed mid-stream.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
}

impl ClientError {
    /// HTTP status code, when the error came from a non-success response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            ClientError::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Non-streaming chat completions.
///
/// # Example
/// ```rust,ignore
/// let completion = client
///     .chat_completions(json!({"model": "gpt-4o-mini", "messages": messages}))
///     .await?;
/// println!("{}", completion["choices"][0]["message"]["content"]);
/// ```
#[async_trait]
pub trait Client: Send + Sync {
    /// Send an OpenAI-compatible payload with `stream: false`.
    ///
    /// # Returns
    /// The response body exactly as the proxy returned it.
    async fn chat_completions(&self, payload: Value) -> Result<Value, ClientError>;
}

/// Streaming chat completions over server-sent events.
///
/// # Example
/// ```rust,ignore
/// let summary = client
///     .chat_completions_stream(payload, |event: Event| println!("{}: {}", event.event, event.raw))
///     .await?;
/// ```
#[async_trait]
pub trait StreamingClient: Client {
    /// Send the payload with `stream: true` and deliver each event to `sink`
    /// as soon as it is complete.
    ///
    /// Events reach the sink one at a time, in stream order. Returns once
    /// the response body ends.
    async fn chat_completions_stream<S>(
        &self,
        payload: Value,
        sink: S,
    ) -> Result<StreamSummary, ClientError>
    where
        S: EventSink + Send;
}
