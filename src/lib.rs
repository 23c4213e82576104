//! # runtime-client
//!
//! Client SDK for the inference runtime proxy, which exposes an
//! OpenAI-compatible chat completions endpoint at
//! `/proxy/openai/v1/chat/completions`.
//!
//! ## Features
//! - Async-first, tokio compatible
//! - Non-streaming calls returning the proxy's JSON verbatim
//! - Streaming calls over Server-Sent Events, parsed incrementally and
//!   delivered to a caller-supplied sink as each event completes
//! - Credential headers from explicit options or the environment
//! - Optional replay log and an offline audit log verifier
//!
//! ## Architecture
//!
//! Streaming responses flow through two stages, one instance of each per
//! stream:
//!
//! 1. [`decoder::LineDecoder`] turns raw body chunks into complete lines,
//!    coping with lines and UTF-8 characters split across chunks.
//! 2. [`sse::EventAssembler`] folds lines into [`Event`]s, dispatching one
//!    per blank-line-terminated record.
//!
//! ## Example
//! ```no_run
//! use runtime_client::{ClientOptions, Event, RuntimeClient, StreamingClient};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RuntimeClient::new(ClientOptions::from_env("http://localhost:8080"))?;
//!
//!     let payload = json!({
//!         "model": "gpt-4o-mini",
//!         "messages": [{"role": "user", "content": "Hello!"}],
//!     });
//!
//!     let summary = client
//!         .chat_completions_stream(payload, |event: Event| {
//!             println!("{}: {}", event.event, event.raw);
//!         })
//!         .await?;
//!     println!("{} events", summary.events);
//!     Ok(())
//! }
//! ```

pub mod audit;
pub mod client;
pub mod decoder;
pub mod http;
pub mod model;
pub mod options;
pub mod replay;
pub mod runtime;
pub mod sse;

// Re-exports for convenience
pub use client::{Client, ClientError, StreamingClient};
pub use model::{Event, StreamSummary};
pub use options::{ClientOptions, SecretString};
pub use runtime::RuntimeClient;
pub use sse::{Discard, EventSink};
