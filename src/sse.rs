//! Server-Sent Events (SSE) assembly and stream processing.
//!
//! SSE format:
//! ```text
//! : comment
//! event: ping
//! data: {"key": "value"}
//! data: continued payload
//!
//! ```
//!
//! Lines come from a [`LineDecoder`]; an empty line ends the current record
//! and dispatches it as one [`Event`] if it collected any `data:` lines.
//! A record still open when the stream ends is dropped.

use std::collections::VecDeque;
use std::future::Future;
use std::mem;
use std::pin::pin;

use futures::stream::{self, Stream, StreamExt};
use itertools::Itertools;
use tracing::trace;

use crate::client::ClientError;
use crate::decoder::LineDecoder;
use crate::model::{Event, DEFAULT_EVENT};

/// Receives dispatched events, one at a time and in stream order.
///
/// Implemented for any `FnMut(Event)` closure. Use [`Discard`] when the
/// caller does not care about the events but the stream must still be
/// drained.
pub trait EventSink {
    fn on_event(&mut self, event: Event);
}

impl<F> EventSink for F
where
    F: FnMut(Event),
{
    fn on_event(&mut self, event: Event) {
        self(event)
    }
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct Discard;

impl EventSink for Discard {
    fn on_event(&mut self, _event: Event) {}
}

/// Fields collected since the last dispatch.
#[derive(Debug, Default)]
struct Record {
    label: Option<String>,
    fragments: Vec<String>,
}

/// Folds SSE lines into events.
///
/// # Example
/// ```
/// use runtime_client::sse::EventAssembler;
///
/// let mut assembler = EventAssembler::new();
/// assert!(assembler.feed_line("event: ping").is_none());
/// assert!(assembler.feed_line("data: ok").is_none());
///
/// let event = assembler.feed_line("").unwrap();
/// assert_eq!(event.event, "ping");
/// assert_eq!(event.raw, "ok");
/// ```
#[derive(Debug, Default)]
pub struct EventAssembler {
    current: Record,
}

impl EventAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one line, returning the event it completes, if any.
    pub fn feed_line(&mut self, line: &str) -> Option<Event> {
        if line.is_empty() {
            return self.dispatch();
        }

        if line.starts_with(':') {
            return None;
        }

        if let Some(label) = line.strip_prefix("event:") {
            self.current.label = Some(label.trim().to_string());
        } else if let Some(data) = line.strip_prefix("data:") {
            let data = data.strip_prefix(' ').unwrap_or(data);
            self.current.fragments.push(data.to_string());
        }
        // Other fields (id:, retry:, ...) are not used by the runtime.

        None
    }

    /// Apply one line and hand a completed event to `sink`.
    ///
    /// Returns whether an event was delivered.
    pub fn push_line<S: EventSink + ?Sized>(&mut self, line: &str, sink: &mut S) -> bool {
        match self.feed_line(line) {
            Some(event) => {
                sink.on_event(event);
                true
            }
            None => false,
        }
    }

    /// Whether a record is open, i.e. some field arrived since the last
    /// blank line.
    pub fn has_pending(&self) -> bool {
        self.current.label.is_some() || !self.current.fragments.is_empty()
    }

    fn dispatch(&mut self) -> Option<Event> {
        let Record { label, fragments } = mem::take(&mut self.current);
        if fragments.is_empty() {
            return None;
        }

        let label = label
            .filter(|label| !label.is_empty())
            .unwrap_or_else(|| DEFAULT_EVENT.to_string());
        let event = Event::new(label, fragments.iter().join("\n"));
        trace!(event = %event.event, bytes = event.raw.len(), "dispatching event");
        Some(event)
    }
}

/// Extension trait turning a stream of byte chunks into SSE events.
///
/// Works on any ordered chunk source whose error converts into
/// [`ClientError`], e.g. `reqwest::Response::bytes_stream()`.
///
/// # Example
/// ```ignore
/// use runtime_client::sse::EventStreamExt;
///
/// let mut events = std::pin::pin!(response.bytes_stream().events());
/// while let Some(event) = events.next().await {
///     let event = event?;
///     println!("{}: {}", event.event, event.raw);
/// }
/// ```
pub trait EventStreamExt: Sized {
    /// Lazily decode the chunks into events.
    ///
    /// A read error is yielded once and ends the stream; anything buffered
    /// at that point is lost.
    fn events(self) -> impl Stream<Item = Result<Event, ClientError>> + Send;

    /// Drain the whole stream, delivering every event to `sink`.
    ///
    /// Returns the number of events delivered.
    fn dispatch<S>(self, sink: S) -> impl Future<Output = Result<usize, ClientError>> + Send
    where
        S: EventSink + Send;
}

struct Pipeline<St> {
    chunks: St,
    decoder: LineDecoder,
    assembler: EventAssembler,
    ready: VecDeque<Event>,
    finished: bool,
}

impl<St> Pipeline<St> {
    fn absorb(&mut self, lines: impl IntoIterator<Item = String>) {
        for line in lines {
            if let Some(event) = self.assembler.feed_line(&line) {
                self.ready.push_back(event);
            }
        }
    }
}

impl<St, B, E> EventStreamExt for St
where
    St: Stream<Item = Result<B, E>> + Send,
    B: AsRef<[u8]> + Send,
    E: Into<ClientError> + Send,
{
    fn events(self) -> impl Stream<Item = Result<Event, ClientError>> + Send {
        let pipeline = Pipeline {
            chunks: Box::pin(self),
            decoder: LineDecoder::new(),
            assembler: EventAssembler::new(),
            ready: VecDeque::new(),
            finished: false,
        };

        stream::unfold(pipeline, |mut pipeline| async move {
            loop {
                if let Some(event) = pipeline.ready.pop_front() {
                    return Some((Ok(event), pipeline));
                }

                if pipeline.finished {
                    return None;
                }

                match pipeline.chunks.next().await {
                    Some(Ok(chunk)) => {
                        let lines = pipeline.decoder.feed(chunk.as_ref());
                        pipeline.absorb(lines);
                    }
                    Some(Err(err)) => {
                        let err: ClientError = err.into();
                        pipeline.finished = true;
                        return Some((Err(err), pipeline));
                    }
                    None => {
                        pipeline.finished = true;
                        let last = pipeline.decoder.finish();
                        pipeline.absorb(last);
                        if pipeline.assembler.has_pending() {
                            trace!("stream ended inside an unterminated event; dropping it");
                        }
                    }
                }
            }
        })
    }

    fn dispatch<S>(self, mut sink: S) -> impl Future<Output = Result<usize, ClientError>> + Send
    where
        S: EventSink + Send,
    {
        async move {
            let mut events = pin!(self.events());
            let mut delivered = 0;
            while let Some(event) = events.next().await {
                sink.on_event(event?);
                delivered += 1;
            }
            Ok::<usize, ClientError>(delivered)
        }
    }
}

/// Extension trait for `reqwest::Response` to consume an SSE body.
pub trait SSEResponseExt {
    /// Convert the response body into a stream of events.
    fn sse_events(self) -> impl Stream<Item = Result<Event, ClientError>> + Send;

    /// Drain the response body into `sink`.
    fn dispatch_events<S>(self, sink: S) -> impl Future<Output = Result<usize, ClientError>> + Send
    where
        S: EventSink + Send;
}

impl SSEResponseExt for reqwest::Response {
    fn sse_events(self) -> impl Stream<Item = Result<Event, ClientError>> + Send {
        self.bytes_stream().events()
    }

    fn dispatch_events<S>(self, sink: S) -> impl Future<Output = Result<usize, ClientError>> + Send
    where
        S: EventSink + Send,
    {
        self.bytes_stream().dispatch(sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use serde_json::{json, Value};

    fn assemble(lines: &[&str]) -> Vec<Event> {
        let mut assembler = EventAssembler::new();
        lines.iter().filter_map(|line| assembler.feed_line(line)).collect()
    }

    fn chunks(parts: &[&'static [u8]]) -> impl Stream<Item = Result<Bytes, ClientError>> + Send {
        let parts: Vec<Result<Bytes, ClientError>> = parts
            .iter()
            .map(|part| Ok(Bytes::from_static(part)))
            .collect();
        stream::iter(parts)
    }

    #[test]
    fn test_single_data_line_decodes_json() {
        let events = assemble(&[r#"data: {"x":1}"#, ""]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "message");
        assert_eq!(events[0].data, json!({"x": 1}));
        assert_eq!(events[0].raw, r#"{"x":1}"#);
    }

    #[test]
    fn test_multiple_data_lines_join_with_newline() {
        let events = assemble(&[r#"data: {"a":1}"#, r#"data: {"b":2}"#, ""]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].raw, "{\"a\":1}\n{\"b\":2}");
        assert_eq!(events[0].data, Value::String("{\"a\":1}\n{\"b\":2}".to_string()));
    }

    #[test]
    fn test_event_label_and_raw_fallback() {
        let events = assemble(&["event: ping", "data: ok", ""]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "ping");
        assert_eq!(events[0].data, json!("ok"));
    }

    #[test]
    fn test_label_is_trimmed_and_resets_after_dispatch() {
        let events = assemble(&["event:   usage  ", "data: 1", "", "data: 2", ""]);
        assert_eq!(events[0].event, "usage");
        assert_eq!(events[1].event, "message");
        assert_eq!(events[1].data, json!(2));
    }

    #[test]
    fn test_empty_label_falls_back_to_message() {
        let events = assemble(&["event:", "data: x", ""]);
        assert_eq!(events[0].event, "message");
    }

    #[test]
    fn test_data_strips_only_one_space() {
        let events = assemble(&["data:   indented", "data:tight", ""]);
        assert_eq!(events[0].raw, "  indented\ntight");
    }

    #[test]
    fn test_comments_are_ignored() {
        let events = assemble(&[": keep-alive", "data: a", ": between", "data: b", ""]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].raw, "a\nb");

        assert!(assemble(&[": only a comment", ""]).is_empty());
    }

    #[test]
    fn test_blank_line_without_data_resets_label() {
        let events = assemble(&["event: ping", "", "data: hi", ""]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "message");
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let events = assemble(&["id: 7", "retry: 100", "garbage", "data: x", ""]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].raw, "x");
    }

    #[test]
    fn test_data_without_blank_line_is_not_dispatched() {
        let mut assembler = EventAssembler::new();
        assert!(assembler.feed_line("data: dangling").is_none());
        assert!(assembler.has_pending());
    }

    #[test]
    fn test_empty_data_field_still_dispatches() {
        let events = assemble(&["data:", ""]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].raw, "");
        assert_eq!(events[0].data, json!(""));
    }

    #[test]
    fn test_push_line_delivers_to_closure() {
        let mut assembler = EventAssembler::new();
        let mut seen = Vec::new();
        let mut sink = |event: Event| seen.push(event.raw);
        assert!(!assembler.push_line("data: one", &mut sink));
        assert!(assembler.push_line("", &mut sink));
        assert_eq!(seen, vec!["one"]);
    }

    #[tokio::test]
    async fn test_events_across_chunk_boundaries() {
        let source = chunks(&[
            b"event: pi",
            b"ng\r\ndata: o",
            b"k\r\n\r\ndata: {\"text\":\"\xE6\x97",
            b"\xA5\"}\n",
            b"\n: bye\n",
        ]);
        let events: Vec<Event> = source
            .events()
            .map(|event| event.expect("event"))
            .collect()
            .await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event, "ping");
        assert_eq!(events[0].data, json!("ok"));
        assert_eq!(events[1].data, json!({"text": "日"}));
    }

    #[tokio::test]
    async fn test_leading_byte_order_mark_does_not_hide_first_event() {
        let source = chunks(&[b"\xEF\xBB", b"\xBFdata: x\n\n"]);
        let mut seen = Vec::new();
        let delivered = source
            .dispatch(|event: Event| seen.push(event.raw))
            .await
            .expect("dispatch");
        assert_eq!(delivered, 1);
        assert_eq!(seen, vec!["x"]);
    }

    #[tokio::test]
    async fn test_dangling_record_is_not_flushed() {
        let source = chunks(&[b"data: 1\n\ndata: 2"]);
        let mut seen = Vec::new();
        let delivered = source
            .dispatch(|event: Event| seen.push(event.data))
            .await
            .expect("dispatch");
        assert_eq!(delivered, 1);
        assert_eq!(seen, vec![json!(1)]);
    }

    #[tokio::test]
    async fn test_discard_still_drains() {
        let source = chunks(&[b"data: a\n\n", b"data: b\n\n"]);
        let delivered = source.dispatch(Discard).await.expect("dispatch");
        assert_eq!(delivered, 2);
    }

    #[tokio::test]
    async fn test_transport_error_ends_stream() {
        let parts: Vec<Result<Bytes, ClientError>> = vec![
            Ok(Bytes::from_static(b"data: first\n\ndata: lost")),
            Err(ClientError::Transport("connection reset".to_string())),
            Ok(Bytes::from_static(b"\n\n")),
        ];
        let results: Vec<Result<Event, ClientError>> = stream::iter(parts).events().collect().await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().expect("first event").raw, "first");
        assert!(matches!(results[1], Err(ClientError::Transport(_))));
    }

    #[tokio::test]
    async fn test_dispatch_returns_transport_error() {
        let parts: Vec<Result<Bytes, ClientError>> = vec![
            Ok(Bytes::from_static(b"data: first\n\n")),
            Err(ClientError::Transport("timed out".to_string())),
        ];
        let mut count = 0;
        let result = stream::iter(parts).dispatch(|_event: Event| count += 1).await;

        assert!(matches!(result, Err(ClientError::Transport(_))));
        assert_eq!(count, 1);
    }
}
