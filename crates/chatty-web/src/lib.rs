//! Web interface for chatty.
//!
//! This crate exposes the streaming chat adapter over HTTP:
//!
//! - `GET /api/status` -- version and configured defaults.
//! - `GET /api/models` -- the model catalogue.
//! - `POST /api/chat` -- a Server-Sent-Events stream of growing response
//!   prefixes for one prompt.

pub mod api;
pub mod server;
pub mod state;

pub use server::{WebServer, router};
pub use state::AppState;

/// Web server configuration.
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// The address to bind the HTTP server to.
    pub bind_addr: String,
    /// The port to listen on.
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".into(),
            port: 7860,
        }
    }
}
