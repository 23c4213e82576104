//! Data types handed to callers of the runtime client.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event label used when a record carries no `event:` field.
pub const DEFAULT_EVENT: &str = "message";

/// Event label the runtime uses for per-chunk integrity records.
pub const CHUNK_EVENT: &str = "rem.chunk";

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event label, `"message"` unless the record set one.
    pub event: String,

    /// The payload decoded as JSON, or the raw text as a JSON string when
    /// it does not parse.
    pub data: Value,

    /// The `data:` lines joined with `\n`, exactly as received.
    pub raw: String,
}

impl Event {
    /// Build an event from its label and raw payload text.
    pub fn new(event: impl Into<String>, raw: String) -> Self {
        let data = serde_json::from_str(&raw).unwrap_or_else(|_| Value::String(raw.clone()));
        Self {
            event: event.into(),
            data,
            raw,
        }
    }

    /// SHA-256 carried by a `rem.chunk` event, if this is one.
    pub fn chunk_hash(&self) -> Option<&str> {
        if self.event != CHUNK_EVENT {
            return None;
        }
        self.data.get("sha256").and_then(Value::as_str)
    }
}

/// Outcome of a completed streaming call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamSummary {
    /// Value sent as `x-request-id`.
    pub request_id: String,

    /// Number of events delivered to the sink.
    pub events: usize,

    /// Hashes reported by `rem.chunk` events, in arrival order.
    pub chunk_hashes: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_decodes_json_payload() {
        let event = Event::new(DEFAULT_EVENT, r#"{"x":1}"#.to_string());
        assert_eq!(event.data, json!({"x": 1}));
        assert_eq!(event.raw, r#"{"x":1}"#);
    }

    #[test]
    fn test_event_falls_back_to_raw_text() {
        let event = Event::new("ping", "ok".to_string());
        assert_eq!(event.data, Value::String("ok".to_string()));
    }

    #[test]
    fn test_chunk_hash() {
        let event = Event::new(CHUNK_EVENT, r#"{"sha256":"abc","index":0}"#.to_string());
        assert_eq!(event.chunk_hash(), Some("abc"));

        let other = Event::new(DEFAULT_EVENT, r#"{"sha256":"abc"}"#.to_string());
        assert_eq!(other.chunk_hash(), None);

        let missing = Event::new(CHUNK_EVENT, "[DONE]".to_string());
        assert_eq!(missing.chunk_hash(), None);
    }
}
