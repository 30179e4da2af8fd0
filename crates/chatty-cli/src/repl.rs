//! Subcommand: `chatty chat` -- interactive REPL.
//!
//! Keeps the conversation history in memory and streams each answer to the
//! terminal as it is generated.

use std::io::{self, BufRead, Write as _};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use chatty_agent::{CompletionRequest, Turn};

use crate::cli::ChatOptions;
use crate::helpers::{apply_options, build_adapter, init_tracing, load_config, stream_to_stdout};

/// Run the interactive REPL.
pub async fn cmd_chat(config_path: Option<&Path>, options: ChatOptions) -> Result<()> {
    init_tracing("warn");

    let config = load_config(config_path)?;
    let adapter = build_adapter(&config)?;
    let chat = apply_options(&config.chat, &options);

    println!();
    println!("  chatty v{}", env!("CARGO_PKG_VERSION"));
    println!("  Model: {}", chat.default_model);
    println!("  Type a message, '/reset' to forget the conversation, or 'quit' to exit.");
    println!();

    let mut history: Vec<Turn> = Vec::new();
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line.context("failed to read input")?;
        let trimmed = line.trim();

        match trimmed {
            "" => continue,
            "quit" | "exit" => {
                info!("user requested exit");
                break;
            }
            "/reset" => {
                history.clear();
                println!("  (conversation cleared)");
                continue;
            }
            _ => {}
        }

        let request = CompletionRequest::new(trimmed, &chat).with_history(history.clone());
        match stream_to_stdout(&adapter, &request).await {
            Ok(answer) => history.push(Turn::new(trimmed, answer)),
            Err(e) => {
                warn!(error = %e, "completion failed");
                println!();
                println!("  error: {e:#}");
            }
        }
    }

    Ok(())
}
