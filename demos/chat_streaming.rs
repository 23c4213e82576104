//! Streaming chat completions through the runtime proxy.
//!
//! Run with:
//! ```bash
//! export API_KEY="your-runtime-key"
//! export RUNTIME_URL="http://localhost:8080"
//! cargo run --example chat_streaming
//! ```

use std::io::Write;

use runtime_client::model::DEFAULT_EVENT;
use runtime_client::{Client, ClientOptions, Event, RuntimeClient, StreamingClient};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let base_url = std::env::var("RUNTIME_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());
    let client = RuntimeClient::new(ClientOptions::from_env(base_url))?;

    let payload = json!({
        "model": "gpt-4o-mini",
        "messages": [{"role": "user", "content": "What is the capital of France? Answer in one word."}],
    });

    println!("=== Non-streaming ===");
    let completion = client.chat_completions(payload.clone()).await?;
    println!("{}", completion["choices"][0]["message"]["content"]);

    println!("\n=== Streaming ===");
    let summary = client
        .chat_completions_stream(payload, |event: Event| {
            if event.event != DEFAULT_EVENT {
                println!("\n[{}] {}", event.event, event.raw);
                return;
            }
            if let Some(delta) = event.data["choices"][0]["delta"]["content"].as_str() {
                print!("{delta}");
                let _ = std::io::stdout().flush();
            }
        })
        .await?;

    println!("\n\nrequest {}: {} events, {} chunk hashes", summary.request_id, summary.events, summary.chunk_hashes.len());
    Ok(())
}
