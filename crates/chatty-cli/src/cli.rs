//! CLI argument definitions for chatty.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// chatty -- streaming chat against hosted open-weight models.
#[derive(Parser)]
#[command(
    name = "chatty",
    version,
    about = "Streaming chat against hosted open-weight models",
    long_about = "Chat with zephyr-7b-beta or Mistral-7B-Instruct through the hosted \
                  inference API, in the terminal or over HTTP."
)]
pub struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive chat session.
    Chat {
        #[command(flatten)]
        options: ChatOptions,
    },

    /// Send one prompt and print the streamed answer.
    Ask {
        /// The prompt to send.
        prompt: String,

        #[command(flatten)]
        options: ChatOptions,
    },

    /// Start the HTTP chat server.
    Serve {
        /// Address to bind the HTTP server to.
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,

        /// Port to listen on.
        #[arg(long, short, default_value_t = 7860)]
        port: u16,
    },

    /// List the available models.
    Models,
}

/// Per-request overrides shared by `chat` and `ask`.
#[derive(Args, Debug, Clone, Default)]
pub struct ChatOptions {
    /// Model to use instead of the configured default.
    #[arg(long, short)]
    pub model: Option<String>,

    /// System message to use instead of the configured default.
    #[arg(long, short)]
    pub system: Option<String>,

    /// Maximum number of new tokens.
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Sampling temperature in (0, 1].
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Nucleus sampling threshold in (0, 1].
    #[arg(long)]
    pub top_p: Option<f32>,

    /// Repetition penalty in (0, 1].
    #[arg(long)]
    pub repetition_penalty: Option<f32>,
}
