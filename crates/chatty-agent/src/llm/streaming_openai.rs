//! SSE stream decoding for the OpenAI-style chat-completions endpoint.
//!
//! Each `data:` line carries a JSON chunk whose `choices[0].delta.content`
//! holds the next piece of text.  The stream terminates with a
//! `data: [DONE]` sentinel.

use serde_json::Value;

use crate::error::{ChatError, Result};
use crate::llm::streaming::sse_data;
use crate::llm::types::StreamEvent;

/// Decodes the chunks of a streaming chat-completions response.
#[derive(Debug, Default)]
pub struct ChatCompletionDecoder {
    /// Whether the `[DONE]` sentinel has been received.
    done: bool,
}

impl ChatCompletionDecoder {
    /// Create a new decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` once the `[DONE]` sentinel has been received.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed a single SSE line.
    ///
    /// Returns `Ok(Some(StreamEvent::Token))` when the chunk carries text,
    /// `Ok(Some(StreamEvent::Done))` for the sentinel and `Ok(None)` for
    /// chunks without content (the initial role-only delta, the final chunk
    /// that only sets `finish_reason`).
    pub fn decode_line(&mut self, line: &str) -> Result<Option<StreamEvent>> {
        let Some(data) = sse_data(line) else {
            return Ok(None);
        };

        if data == "[DONE]" {
            self.done = true;
            return Ok(Some(StreamEvent::Done));
        }

        let v: Value = serde_json::from_str(data).map_err(|e| {
            ChatError::protocol(format!("invalid JSON in chat-completions SSE data: {e}"))
        })?;

        if let Some(error) = v.get("error").filter(|e| !e.is_null()) {
            let reason = error["message"]
                .as_str()
                .or_else(|| error.as_str())
                .map(str::to_owned)
                .unwrap_or_else(|| error.to_string());
            return Err(ChatError::transport(reason));
        }

        let choices = v["choices"]
            .as_array()
            .ok_or_else(|| ChatError::protocol("missing `choices` array in stream chunk"))?;

        // Usage-only chunks arrive with an empty `choices` array.
        let Some(choice) = choices.first() else {
            return Ok(None);
        };

        match &choice["delta"]["content"] {
            Value::String(text) if !text.is_empty() => Ok(Some(StreamEvent::Token(text.clone()))),
            Value::String(_) | Value::Null => Ok(None),
            other => Err(ChatError::protocol(format!(
                "unexpected `delta.content` type: {other}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
