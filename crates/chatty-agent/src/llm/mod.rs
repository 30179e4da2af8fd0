//! LLM integration layer.
//!
//! This module provides the interface between the chat adapter and the hosted
//! inference endpoints.  It is organized into:
//!
//! - [`types`] -- Core data types (messages, generation parameters, stream
//!   events).
//! - [`backend`] -- Backend strategies: parameter remapping and request
//!   construction per model.
//! - [`client`] -- HTTP client that issues streaming requests.
//! - [`streaming`] -- SSE decoding for the text-generation route.
//! - [`streaming_openai`] -- SSE decoding for the chat-completions route.

pub mod backend;
pub mod client;
pub mod streaming;
pub mod streaming_openai;
pub mod types;

// Re-export the most commonly used types for convenience.
pub use backend::{Backend, BackendRequest, StreamDecoder};
pub use client::{InferenceClient, TokenStream};
pub use types::{GenerationParameters, MAX_TOKENS_LIMIT, Message, Role, StreamEvent};
