//! Incremental byte-to-line decoding.
//!
//! Network chunks can end anywhere: in the middle of a line, between a
//! `\r` and its `\n`, or inside a multi-byte UTF-8 character. [`LineDecoder`]
//! absorbs chunks in order and hands back only complete lines, holding the
//! rest until more bytes arrive.

use std::char::REPLACEMENT_CHARACTER;
use std::mem;

use tracing::trace;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Turns an ordered sequence of byte chunks into complete text lines.
///
/// Lines are split on `\n`; a single `\r` directly before it is dropped, so
/// both `\n` and `\r\n` terminated streams produce the same lines. A
/// byte order mark at the very start of the stream is skipped. One decoder
/// serves exactly one stream.
///
/// # Example
/// ```
/// use runtime_client::decoder::LineDecoder;
///
/// let mut decoder = LineDecoder::new();
/// assert_eq!(decoder.feed(b"data: caf\xC3"), Vec::<String>::new());
/// assert_eq!(decoder.feed(b"\xA9\r\ntail"), vec!["data: café".to_string()]);
/// assert_eq!(decoder.finish(), Some("tail".to_string()));
/// ```
#[derive(Debug, Default)]
pub struct LineDecoder {
    /// Decoded text that has not formed a complete line yet. Never holds `\n`.
    buffer: String,
    /// Leading bytes of a UTF-8 sequence cut off by a chunk boundary.
    pending: Vec<u8>,
    /// Set once the start of the stream has been checked for a BOM.
    past_bom: bool,
}

impl LineDecoder {
    /// Create a decoder with empty buffers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume the next chunk and return the lines it completed, in order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.decode(chunk);
        self.split_lines()
    }

    /// Signal end of stream.
    ///
    /// Returns any unterminated trailing text as one last line. An
    /// incomplete UTF-8 sequence left at the very end is dropped. The
    /// decoder is back in its initial state afterwards.
    pub fn finish(&mut self) -> Option<String> {
        if !self.pending.is_empty() {
            trace!(
                bytes = self.pending.len(),
                "dropping incomplete UTF-8 sequence at end of stream"
            );
            self.pending.clear();
        }
        self.past_bom = false;

        if self.buffer.is_empty() {
            return None;
        }

        let mut line = mem::take(&mut self.buffer);
        if line.ends_with('\r') {
            line.pop();
        }
        Some(line)
    }

    /// Whether nothing is buffered (neither text nor partial characters).
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty() && self.pending.is_empty()
    }

    fn decode(&mut self, chunk: &[u8]) {
        let joined;
        let mut input = if self.pending.is_empty() {
            chunk
        } else {
            let mut bytes = mem::take(&mut self.pending);
            bytes.extend_from_slice(chunk);
            joined = bytes;
            &joined[..]
        };

        if !self.past_bom {
            // Not enough bytes yet to tell whether the stream opens with a BOM.
            if input.len() < UTF8_BOM.len() && UTF8_BOM.starts_with(input) {
                self.pending = input.to_vec();
                return;
            }
            self.past_bom = true;
            input = input.strip_prefix(UTF8_BOM).unwrap_or(input);
        }

        loop {
            match std::str::from_utf8(input) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    return;
                }
                Err(err) => {
                    let (valid, rest) = input.split_at(err.valid_up_to());
                    if let Ok(text) = std::str::from_utf8(valid) {
                        self.buffer.push_str(text);
                    }

                    match err.error_len() {
                        // Genuinely malformed bytes, not a split character.
                        Some(len) => {
                            self.buffer.push(REPLACEMENT_CHARACTER);
                            input = &rest[len..];
                        }
                        None => {
                            self.pending.extend_from_slice(rest);
                            return;
                        }
                    }
                }
            }
        }
    }

    fn split_lines(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        let mut start = 0;

        while let Some(offset) = self.buffer[start..].find('\n') {
            let end = start + offset;
            let line = &self.buffer[start..end];
            lines.push(line.strip_suffix('\r').unwrap_or(line).to_string());
            start = end + 1;
        }

        self.buffer.drain(..start);
        lines
    }
}
