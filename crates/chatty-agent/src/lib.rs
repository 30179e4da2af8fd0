//! Streaming chat-completion adapter for hosted LLM inference endpoints.
//!
//! A chat front end hands over `(prompt, history, parameters)` and gets back
//! a lazy stream of ever-growing response strings it can render as they
//! arrive.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐     ┌───────────┐     ┌─────────────────┐
//! │  Front end │────>│  History  │────>│   ChatAdapter   │
//! │ (web, cli) │     │ normalize │     │ (prefix stream) │
//! └─────▲──────┘     └───────────┘     └────────┬────────┘
//!       │                                       │
//!       │            ┌───────────┐     ┌────────┴────────┐
//!       └────────────│ prefixes  │<────│ Backend + SSE   │
//!                    └───────────┘     │ (zephyr/mistral)│
//!                                      └─────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`history`] -- Turn list to role-tagged message list.
//! - [`completion`] -- The adapter and delta-to-prefix accumulation.
//! - [`llm`] -- Backend strategies, HTTP client, SSE decoding, wire types.
//! - [`config`] -- TOML + environment configuration.
//! - [`error`] -- Error types.

pub mod completion;
pub mod config;
pub mod error;
pub mod history;
pub mod llm;

// Re-export the most commonly used types at the crate root.
pub use completion::{
    ChatAdapter, CompletionRequest, PrefixStream, accumulate_prefixes, check_prefix_growth,
    collect_response,
};
pub use config::{ChatConfig, ChattyConfig, InferenceConfig, UnknownModelPolicy};
pub use error::{ChatError, Result};
pub use history::{Turn, normalize};
pub use llm::{Backend, GenerationParameters, InferenceClient, Message, Role};
