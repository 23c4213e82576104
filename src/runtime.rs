//! Client for the runtime's OpenAI-compatible chat completions proxy.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::client::{Client, ClientError, StreamingClient};
use crate::http::{add_extra_headers, build_http_client, error_for_status, runtime_headers};
use crate::model::{Event, StreamSummary};
use crate::options::ClientOptions;
use crate::replay::{ReplayRecord, ReplayRecorder};
use crate::sse::{EventSink, SSEResponseExt};

/// Path of the chat completions proxy, relative to the base URL.
pub const CHAT_COMPLETIONS_PATH: &str = "/proxy/openai/v1/chat/completions";

/// Client for one runtime deployment.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct RuntimeClient {
    options: ClientOptions,
    endpoint: String,
    http: reqwest::Client,
    replay: Option<ReplayRecorder>,
}

impl RuntimeClient {
    /// Create a client. Fails when no base URL is configured.
    pub fn new(options: ClientOptions) -> Result<Self, ClientError> {
        let endpoint = format!("{}{}", options.base_url()?, CHAT_COMPLETIONS_PATH);
        let http = build_http_client(&options)?;

        Ok(Self {
            options,
            endpoint,
            http,
            replay: None,
        })
    }

    /// Append a replay record for every successful call to `recorder`.
    pub fn with_replay(mut self, recorder: ReplayRecorder) -> Self {
        self.replay = Some(recorder);
        self
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Full URL of the chat completions endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POST `payload` with its `stream` flag forced to `stream`.
    async fn send(
        &self,
        mut payload: Value,
        stream: bool,
    ) -> Result<(String, HeaderMap, Value, reqwest::Response), ClientError> {
        let body = payload
            .as_object_mut()
            .ok_or_else(|| ClientError::Config("payload must be a JSON object".to_string()))?;
        body.insert("stream".to_string(), Value::Bool(stream));

        let request_id = Uuid::new_v4().to_string();
        let headers = runtime_headers(&self.options, &request_id)?;
        debug!(%request_id, stream, url = %self.endpoint, "sending chat completions request");

        let mut req = self.http.post(&self.endpoint).headers(headers.clone());
        req = add_extra_headers(req, &self.options.extra_headers);

        let response = req.json(&payload).send().await?;
        let response = error_for_status(response).await?;
        Ok((request_id, headers, payload, response))
    }

    fn record(
        &self,
        request_id: &str,
        payload: &Value,
        headers: &HeaderMap,
        streamed: bool,
        chunk_hashes: Vec<String>,
    ) {
        let Some(recorder) = &self.replay else {
            return;
        };

        let record = ReplayRecord::new(request_id, CHAT_COMPLETIONS_PATH, payload, headers, streamed, chunk_hashes);
        if let Err(err) = recorder.record(&record) {
            warn!(%request_id, error = %err, "failed to write replay record");
        }
    }
}

#[async_trait]
impl Client for RuntimeClient {
    async fn chat_completions(&self, payload: Value) -> Result<Value, ClientError> {
        let (request_id, headers, payload, response) = self.send(payload, false).await?;
        let body = response.bytes().await?;
        let completion: Value = serde_json::from_slice(&body)?;
        debug!(%request_id, "chat completions request finished");

        self.record(&request_id, &payload, &headers, false, Vec::new());
        Ok(completion)
    }
}

#[async_trait]
impl StreamingClient for RuntimeClient {
    async fn chat_completions_stream<S>(
        &self,
        payload: Value,
        mut sink: S,
    ) -> Result<StreamSummary, ClientError>
    where
        S: EventSink + Send,
    {
        let (request_id, headers, payload, response) = self.send(payload, true).await?;

        let mut chunk_hashes = Vec::new();
        let events = response
            .dispatch_events(|event: Event| {
                if let Some(hash) = event.chunk_hash() {
                    chunk_hashes.push(hash.to_string());
                }
                sink.on_event(event);
            })
            .await?;
        debug!(%request_id, events, chunks = chunk_hashes.len(), "event stream finished");

        self.record(&request_id, &payload, &headers, true, chunk_hashes.clone());
        Ok(StreamSummary {
            request_id,
            events,
            chunk_hashes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_base_url_and_path() {
        let client = RuntimeClient::new(ClientOptions::new("http://localhost:8080/")).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:8080/proxy/openai/v1/chat/completions");
    }

    #[test]
    fn test_missing_base_url_fails_construction() {
        let err = RuntimeClient::new(ClientOptions::default()).unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }
}
