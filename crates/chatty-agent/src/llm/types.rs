//! Core types for LLM interaction.
//!
//! These types are backend-agnostic; the [`super::backend`] module translates
//! them into the wire format of each hosted endpoint.

use serde::{Deserialize, Serialize};

use crate::error::{ChatError, Result};

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// The role of a participant in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System-level instructions that shape model behavior.
    System,
    /// Input from the human user.
    User,
    /// Output from the LLM.
    Assistant,
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who produced this message.
    pub role: Role,

    /// The textual content of the message.  May be empty for the system
    /// message.
    #[serde(default)]
    pub content: String,
}

impl Message {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Generation parameters
// ---------------------------------------------------------------------------

/// Upper bound for `max_tokens`.
pub const MAX_TOKENS_LIMIT: u32 = 2048;

/// Sampling and length options for one generation.
///
/// Each backend consumes a different subset of these fields; see
/// [`super::backend::Backend::build_request`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParameters {
    /// Maximum number of new tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature, in `(0, 1]`.
    pub temperature: f32,
    /// Nucleus sampling cutoff, in `(0, 1]`.
    pub top_p: f32,
    /// Penalty applied to repeated tokens, in `(0, 1]`.
    pub repetition_penalty: f32,
    /// Always `true`; the adapter only issues streaming requests.
    #[serde(skip_deserializing)]
    pub stream: bool,
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: 0.9,
            top_p: 0.9,
            repetition_penalty: 1.0,
            stream: true,
        }
    }
}

impl GenerationParameters {
    /// Check every field against its allowed range.
    pub fn validate(&self) -> Result<()> {
        if self.max_tokens == 0 || self.max_tokens > MAX_TOKENS_LIMIT {
            return Err(ChatError::InvalidInput {
                reason: format!(
                    "max_tokens must be between 1 and {MAX_TOKENS_LIMIT}, got {}",
                    self.max_tokens
                ),
            });
        }
        check_unit_interval("temperature", self.temperature)?;
        check_unit_interval("top_p", self.top_p)?;
        check_unit_interval("repetition_penalty", self.repetition_penalty)?;
        Ok(())
    }
}

/// Accept values in the half-open interval `(0, 1]`.
fn check_unit_interval(name: &str, value: f32) -> Result<()> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ChatError::InvalidInput {
            reason: format!("{name} must be in (0, 1], got {value}"),
        })
    }
}

// ---------------------------------------------------------------------------
// Streaming events
// ---------------------------------------------------------------------------

/// A decoded item from a backend's SSE stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A chunk of generated text to append to the response.
    Token(String),
    /// The backend signalled the end of the generation.
    Done,
}
