//! Server-Sent Events (SSE) decoding for streaming replies.
//!
//! The backend frames its reply as newline-separated records. Records that
//! start with `data: ` carry a JSON payload of the form
//! `{"content": "<incremental text>"}`; everything else, blank separator lines
//! included, is ignored. [`FrameDecoder`] turns arbitrary byte chunks of that
//! stream into [`Delta`]s, carrying an incomplete trailing line over to the
//! next chunk.

use std::fmt;

use serde_json::Value;

/// Prefix of a record that carries a payload.
pub const DATA_PREFIX: &[u8] = b"data: ";

/// Payload the backend may send before closing the stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Message attached to a record whose payload is not valid JSON.
pub const PARSE_FAILURE: &str = "parse failure";

/// One unit of decoded stream content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delta {
    /// Incremental assistant text.
    Content(String),
    /// The stream is over.
    Done,
    /// A record could not be turned into content.
    Error(FrameError),
}

/// Why a record produced [`Delta::Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameErrorKind {
    /// The record was malformed. The stream can continue past it.
    Parse,
    /// The backend reported an error in place of content.
    Backend,
}

/// Error carried by [`Delta::Error`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameError {
    /// What went wrong.
    pub kind: FrameErrorKind,
    /// Human-readable description.
    pub message: String,
}

impl FrameError {
    /// A malformed record.
    pub fn parse(message: impl Into<String>) -> Self {
        Self {
            kind: FrameErrorKind::Parse,
            message: message.into(),
        }
    }

    /// An error record sent by the backend.
    pub fn backend(message: impl Into<String>) -> Self {
        Self {
            kind: FrameErrorKind::Backend,
            message: message.into(),
        }
    }

    /// Returns true if the stream may continue after this error.
    pub fn is_recoverable(&self) -> bool {
        self.kind == FrameErrorKind::Parse
    }
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Incremental decoder for one event stream.
///
/// A decoder holds only the unterminated tail of the last chunk, so a fresh
/// decoder is created for every session.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    consumed: usize,
}

impl FrameDecoder {
    /// Creates an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and returns the deltas of every record it completes.
    ///
    /// The returned iterator is lazy; records still in the buffer when it is
    /// dropped are decoded by the next call.
    pub fn feed(&mut self, bytes: &[u8]) -> Deltas<'_> {
        if self.consumed > 0 {
            self.buffer.drain(..self.consumed);
            self.consumed = 0;
        }
        self.buffer.extend_from_slice(bytes);
        Deltas {
            decoder: self,
            at_end: false,
            done_sent: false,
        }
    }

    /// Signals the end of the stream.
    ///
    /// Decodes a final record that lacked its newline, then yields
    /// [`Delta::Done`].
    pub fn finish(&mut self) -> Deltas<'_> {
        Deltas {
            decoder: self,
            at_end: true,
            done_sent: false,
        }
    }

    /// Number of buffered bytes not yet forming a complete record.
    pub fn pending(&self) -> usize {
        self.buffer.len() - self.consumed
    }

    fn next_line(&mut self) -> Option<&[u8]> {
        let rest = &self.buffer[self.consumed..];
        let newline = rest.iter().position(|&b| b == b'\n')?;
        let start = self.consumed;
        self.consumed += newline + 1;
        Some(trim_cr(&self.buffer[start..start + newline]))
    }

    fn take_tail(&mut self) -> Option<&[u8]> {
        if self.consumed >= self.buffer.len() {
            return None;
        }
        let start = self.consumed;
        self.consumed = self.buffer.len();
        Some(trim_cr(&self.buffer[start..]))
    }
}

/// Deltas decoded from the records currently buffered in a [`FrameDecoder`].
pub struct Deltas<'a> {
    decoder: &'a mut FrameDecoder,
    at_end: bool,
    done_sent: bool,
}

impl Iterator for Deltas<'_> {
    type Item = Delta;

    fn next(&mut self) -> Option<Delta> {
        loop {
            if let Some(line) = self.decoder.next_line() {
                if let Some(delta) = decode_record(line) {
                    return Some(delta);
                }
                continue;
            }
            if !self.at_end {
                return None;
            }
            if let Some(tail) = self.decoder.take_tail() {
                if let Some(delta) = decode_record(tail) {
                    return Some(delta);
                }
                continue;
            }
            if self.done_sent {
                return None;
            }
            self.done_sent = true;
            return Some(Delta::Done);
        }
    }
}

fn trim_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Decode a single record, without its line terminator.
fn decode_record(line: &[u8]) -> Option<Delta> {
    let payload = line.strip_prefix(DATA_PREFIX)?;
    let Ok(payload) = std::str::from_utf8(payload) else {
        return Some(Delta::Error(FrameError::parse(format!(
            "{PARSE_FAILURE}: invalid UTF-8"
        ))));
    };
    let payload = payload.trim();
    if payload == DONE_SENTINEL {
        return None;
    }
    let value: Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(_) => return Some(Delta::Error(FrameError::parse(PARSE_FAILURE))),
    };
    if let Some(content) = value.get("content").and_then(Value::as_str) {
        return Some(Delta::Content(content.to_string()));
    }
    match value.get("error")? {
        Value::String(message) => Some(Delta::Error(FrameError::backend(message.clone()))),
        other => {
            let message = other
                .get("message")
                .and_then(Value::as_str)
                .map(String::from)
                .unwrap_or_else(|| other.to_string());
            Some(Delta::Error(FrameError::backend(message)))
        }
    }
}
