//! Shared application state for the web server.
//!
//! [`AppState`] is wrapped in an `Arc` and shared across all request
//! handlers.  It holds no conversation state: every chat request brings its
//! own history.

use chatty_agent::{ChatAdapter, ChatConfig};

/// Shared state accessible from every Axum handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The adapter used for chat completions.
    pub adapter: ChatAdapter,

    /// Defaults for fields a chat request leaves out.
    pub chat: ChatConfig,
}

impl AppState {
    /// Bundle the adapter with its request defaults.
    pub fn new(adapter: ChatAdapter, chat: ChatConfig) -> Self {
        Self { adapter, chat }
    }
}
