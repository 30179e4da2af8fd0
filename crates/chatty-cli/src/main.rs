//! CLI entry point for chatty.
//!
//! This binary provides the `chatty` command with subcommands for chatting
//! in the terminal, one-shot prompts, running the HTTP server and listing
//! models.

mod cli;
mod helpers;
mod repl;

use std::path::Path;

use anyhow::{Result, anyhow};
use clap::Parser;
use tracing::info;

use chatty_agent::{Backend, CompletionRequest};
use chatty_web::{AppState, WebConfig, WebServer};

use crate::cli::{ChatOptions, Cli, Commands};
use crate::helpers::{apply_options, build_adapter, init_tracing, load_config, stream_to_stdout};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Chat { options } => repl::cmd_chat(config_path, options).await,
        Commands::Ask { prompt, options } => cmd_ask(config_path, &prompt, &options).await,
        Commands::Serve { bind, port } => cmd_serve(config_path, bind, port).await,
        Commands::Models => cmd_models(config_path),
    }
}

// ---------------------------------------------------------------------------
// Subcommand: ask
// ---------------------------------------------------------------------------

async fn cmd_ask(config_path: Option<&Path>, prompt: &str, options: &ChatOptions) -> Result<()> {
    init_tracing("warn");

    let config = load_config(config_path)?;
    let adapter = build_adapter(&config)?;
    let chat = apply_options(&config.chat, options);

    let request = CompletionRequest::new(prompt, &chat);
    stream_to_stdout(&adapter, &request).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: serve
// ---------------------------------------------------------------------------

async fn cmd_serve(config_path: Option<&Path>, bind: String, port: u16) -> Result<()> {
    init_tracing("info");

    let config = load_config(config_path)?;
    let adapter = build_adapter(&config)?;
    let state = AppState::new(adapter, config.chat.clone());

    let server = WebServer::new(
        WebConfig {
            bind_addr: bind,
            port,
        },
        state,
    );
    info!(addr = %server.addr(), "chatty server ready");

    server
        .start()
        .await
        .map_err(|e| anyhow!("web server failed: {e}"))
}

// ---------------------------------------------------------------------------
// Subcommand: models
// ---------------------------------------------------------------------------

fn cmd_models(config_path: Option<&Path>) -> Result<()> {
    init_tracing("warn");

    let config = load_config(config_path)?;
    let default = config.chat.default_model.parse::<Backend>().ok();

    println!();
    for backend in Backend::ALL {
        let marker = if Some(backend) == default { "*" } else { " " };
        println!(
            "  {marker} {:<26} {}",
            backend.model_name(),
            backend.endpoint(&config.inference.base_url)
        );
    }
    println!();

    Ok(())
}
