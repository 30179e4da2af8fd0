//! SSE stream decoding for the text-generation endpoint.
//!
//! Text-generation servers send one `data:` line per generated token, each
//! carrying a JSON object with a `token` field.  The last event additionally
//! carries `generated_text` and, when requested, `details`.  This module
//! turns those lines into [`StreamEvent`] values and provides the byte-level
//! [`LineBuffer`] shared by every SSE decoder in the crate.

use serde_json::Value;

use crate::error::{ChatError, Result};
use crate::llm::types::StreamEvent;

// ---------------------------------------------------------------------------
// Line buffering
// ---------------------------------------------------------------------------

/// Splits a byte stream into complete lines.
///
/// Network chunks do not respect line (or UTF-8 character) boundaries, so
/// bytes are buffered until a `\n` arrives and only then decoded.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completed, without the
    /// trailing `\n` / `\r\n`.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(decode_line(&raw[..raw.len() - 1])?);
        }
        Ok(lines)
    }

    /// Flush whatever is left after the stream closed without a final
    /// newline.
    pub fn finish(&mut self) -> Result<Option<String>> {
        if self.pending.is_empty() {
            return Ok(None);
        }
        let raw = std::mem::take(&mut self.pending);
        decode_line(&raw).map(Some)
    }
}

fn decode_line(raw: &[u8]) -> Result<String> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8(raw.to_vec())
        .map_err(|e| ChatError::protocol(format!("invalid UTF-8 in stream: {e}")))
}

/// Extract the payload of an SSE `data:` line.
///
/// Returns `None` for blank lines, comments and other SSE fields.  Both
/// `data:{..}` and `data: {..}` spellings occur in the wild.
pub fn sse_data(line: &str) -> Option<&str> {
    let line = line.trim_end();
    if line.is_empty() || line.starts_with(':') {
        return None;
    }
    match line.strip_prefix("data:") {
        Some(data) => Some(data.trim_start()),
        None => {
            tracing::trace!(line, "ignoring non-data SSE line");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Text-generation decoder
// ---------------------------------------------------------------------------

/// Decodes the token events of a streaming text-generation response.
#[derive(Debug, Default)]
pub struct TextGenerationDecoder;

impl TextGenerationDecoder {
    /// Create a new decoder.
    pub fn new() -> Self {
        Self
    }

    /// Feed a single SSE line.
    ///
    /// Returns `Some(StreamEvent::Token)` for a regular token, `None` for
    /// lines that carry nothing to append (blank lines, comments, special
    /// tokens such as end-of-sequence).  The end of the generation is the end
    /// of the HTTP body; a `[DONE]` sentinel, if a proxy adds one, maps to
    /// [`StreamEvent::Done`].
    pub fn decode_line(&mut self, line: &str) -> Result<Option<StreamEvent>> {
        let Some(data) = sse_data(line) else {
            return Ok(None);
        };

        if data == "[DONE]" {
            return Ok(Some(StreamEvent::Done));
        }

        let v: Value = serde_json::from_str(data).map_err(|e| {
            ChatError::protocol(format!("invalid JSON in text-generation SSE data: {e}"))
        })?;

        if let Some(message) = v.get("error").filter(|e| !e.is_null()) {
            return Err(ChatError::transport(error_message(message, &v)));
        }

        let token = v
            .get("token")
            .filter(|t| t.is_object())
            .ok_or_else(|| ChatError::protocol("missing `token` object in stream event"))?;

        let text = token["text"]
            .as_str()
            .ok_or_else(|| ChatError::protocol("missing `token.text` in stream event"))?;

        if token["special"].as_bool().unwrap_or(false) {
            tracing::trace!(text, "skipping special token");
            return Ok(None);
        }

        Ok(Some(StreamEvent::Token(text.to_owned())))
    }
}

/// Render an `error` payload, including `error_type` when the server sent
/// one.
fn error_message(message: &Value, event: &Value) -> String {
    let text = message
        .as_str()
        .map(str::to_owned)
        .unwrap_or_else(|| message.to_string());
    match event["error_type"].as_str() {
        Some(kind) => format!("{kind}: {text}"),
        None => text,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
