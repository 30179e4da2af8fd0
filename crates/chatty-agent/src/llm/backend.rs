//! Backend strategies.
//!
//! Each hosted model is served through a different endpoint flavour and
//! understands a different set of generation options.  [`Backend`] is the
//! closed set of strategies; every variant owns its parameter remapping,
//! request construction and stream decoding.  Adding a model means adding a
//! variant.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::{Value, json};

use crate::error::{ChatError, Result};
use crate::llm::streaming::TextGenerationDecoder;
use crate::llm::streaming_openai::ChatCompletionDecoder;
use crate::llm::types::{GenerationParameters, Message, Role, StreamEvent};

/// Identifies which hosted model endpoint serves a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Zephyr 7B beta, driven through the chat-completions route with the
    /// structured message list.
    Zephyr,
    /// Mistral 7B Instruct v0.2, driven through the raw text-generation route
    /// with a rendered instruction prompt.
    Mistral,
}

/// A fully built HTTP request for one generation.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendRequest {
    /// Absolute endpoint URL.
    pub url: String,
    /// JSON body.
    pub body: Value,
}

impl Backend {
    /// Every backend this build knows about.
    pub const ALL: [Backend; 2] = [Backend::Zephyr, Backend::Mistral];

    /// The model name shown to users and accepted as a selector.
    pub fn model_name(self) -> &'static str {
        match self {
            Self::Zephyr => "zephyr-7b-beta",
            Self::Mistral => "Mistral-7B-Instruct-v0.2",
        }
    }

    /// The repository id of the hosted model.
    pub fn model_id(self) -> &'static str {
        match self {
            Self::Zephyr => "HuggingFaceH4/zephyr-7b-beta",
            Self::Mistral => "mistralai/Mistral-7B-Instruct-v0.2",
        }
    }

    /// Endpoint URL below the configured inference base URL.
    pub fn endpoint(self, base_url: &str) -> String {
        let base = base_url.trim_end_matches('/');
        match self {
            Self::Zephyr => format!("{base}/{}/v1/chat/completions", self.model_id()),
            Self::Mistral => format!("{base}/{}", self.model_id()),
        }
    }

    /// Remap the generation parameters into this backend's request body.
    ///
    /// Options a backend does not understand are dropped, never forwarded.
    pub fn build_request(
        self,
        base_url: &str,
        messages: &[Message],
        params: &GenerationParameters,
    ) -> BackendRequest {
        let body = match self {
            Self::Zephyr => json!({
                "model": self.model_id(),
                "messages": messages,
                "max_tokens": params.max_tokens,
                "temperature": params.temperature,
                "top_p": params.top_p,
                "stream": true,
            }),
            Self::Mistral => json!({
                "inputs": render_instruct_prompt(messages),
                "parameters": {
                    "max_new_tokens": params.max_tokens,
                    "details": true,
                    "return_full_text": false,
                },
                "stream": true,
            }),
        };

        BackendRequest {
            url: self.endpoint(base_url),
            body,
        }
    }

    /// A fresh decoder for this backend's SSE stream.
    pub fn decoder(self) -> StreamDecoder {
        match self {
            Self::Zephyr => StreamDecoder::ChatCompletion(ChatCompletionDecoder::new()),
            Self::Mistral => StreamDecoder::TextGeneration(TextGenerationDecoder::new()),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.model_name())
    }
}

impl FromStr for Backend {
    type Err = ChatError;

    /// Accepts the display model name, the repository id or the short family
    /// name, case-insensitively.
    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|b| {
                let family = match b {
                    Self::Zephyr => "zephyr",
                    Self::Mistral => "mistral",
                };
                [b.model_name(), b.model_id(), family]
                    .iter()
                    .any(|name| name.eq_ignore_ascii_case(wanted))
            })
            .ok_or_else(|| ChatError::UnsupportedModel {
                model: s.to_owned(),
            })
    }
}

// ---------------------------------------------------------------------------
// Stream decoding
// ---------------------------------------------------------------------------

/// Per-request SSE decoder, one variant per wire format.
#[derive(Debug)]
pub enum StreamDecoder {
    ChatCompletion(ChatCompletionDecoder),
    TextGeneration(TextGenerationDecoder),
}

impl StreamDecoder {
    /// Decode one SSE line.
    pub fn decode_line(&mut self, line: &str) -> Result<Option<StreamEvent>> {
        match self {
            Self::ChatCompletion(d) => d.decode_line(line),
            Self::TextGeneration(d) => d.decode_line(line),
        }
    }
}

// ---------------------------------------------------------------------------
// Prompt rendering
// ---------------------------------------------------------------------------

/// Render a message list into the Mistral instruct template.
///
/// ```text
/// <s>[INST] {system}\n\n{user} [/INST] {assistant}</s>[INST] {user} [/INST]
/// ```
///
/// The template has no system slot, so the system text is folded into the
/// first instruction.  Consecutive user messages share one instruction block.
pub fn render_instruct_prompt(messages: &[Message]) -> String {
    let mut prompt = String::from("<s>");
    let mut system = String::new();
    let mut open_instruction: Option<String> = None;

    for msg in messages {
        match msg.role {
            Role::System => {
                if !msg.content.is_empty() {
                    if !system.is_empty() {
                        system.push('\n');
                    }
                    system.push_str(&msg.content);
                }
            }
            Role::User => {
                let text = match open_instruction.take() {
                    Some(mut pending) => {
                        pending.push_str("\n\n");
                        pending.push_str(&msg.content);
                        pending
                    }
                    None if !system.is_empty() => {
                        format!("{}\n\n{}", std::mem::take(&mut system), msg.content)
                    }
                    None => msg.content.clone(),
                };
                open_instruction = Some(text);
            }
            Role::Assistant => {
                if let Some(instruction) = open_instruction.take() {
                    prompt.push_str(&format!("[INST] {instruction} [/INST]"));
                }
                prompt.push_str(&format!(" {}</s>", msg.content));
            }
        }
    }

    if let Some(instruction) = open_instruction {
        prompt.push_str(&format!("[INST] {instruction} [/INST]"));
    }

    prompt
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
