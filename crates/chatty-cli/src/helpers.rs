//! Shared helper functions used across CLI subcommands.
//!
//! Includes tracing initialization, configuration loading and the
//! prefix-to-suffix rendering used by the terminal front ends.

use std::io::{self, Write as _};
use std::path::Path;

use anyhow::{Context, Result};
use futures::StreamExt;
use tracing::info;
use tracing_subscriber::EnvFilter;

use chatty_agent::{
    ChatAdapter, ChatConfig, ChattyConfig, CompletionRequest, PrefixStream, check_prefix_growth,
};

use crate::cli::ChatOptions;

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber with the given default log level.
///
/// Logs go to stderr so streamed answers on stdout stay clean.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Load `.env`, the optional config file and environment overrides.
pub fn load_config(path: Option<&Path>) -> Result<ChattyConfig> {
    if let Ok(env_path) = dotenvy::dotenv() {
        info!(path = %env_path.display(), "loaded environment file");
    }

    let config = ChattyConfig::load(path).context("failed to load configuration")?;
    info!(
        base_url = %config.inference.base_url,
        model = %config.chat.default_model,
        authenticated = config.inference.api_token.is_some(),
        "configuration ready"
    );
    Ok(config)
}

/// Build the adapter from loaded configuration.
pub fn build_adapter(config: &ChattyConfig) -> Result<ChatAdapter> {
    ChatAdapter::from_config(config).context("failed to create inference client")
}

/// Apply command-line overrides on top of the configured chat defaults.
pub fn apply_options(defaults: &ChatConfig, options: &ChatOptions) -> ChatConfig {
    let mut chat = defaults.clone();
    if let Some(model) = &options.model {
        chat.default_model = model.clone();
    }
    if let Some(system) = &options.system {
        chat.system_message = system.clone();
    }
    let params = &mut chat.parameters;
    params.max_tokens = options.max_tokens.unwrap_or(params.max_tokens);
    params.temperature = options.temperature.unwrap_or(params.temperature);
    params.top_p = options.top_p.unwrap_or(params.top_p);
    params.repetition_penalty = options
        .repetition_penalty
        .unwrap_or(params.repetition_penalty);
    chat
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// The part of `next` not yet shown, given that `shown` is on screen.
pub fn new_suffix<'a>(shown: &str, next: &'a str) -> chatty_agent::Result<&'a str> {
    check_prefix_growth(shown, next)?;
    Ok(&next[shown.len()..])
}

/// Run one completion, printing each new piece of text as it arrives.
///
/// Returns the full response.
pub async fn stream_to_stdout(
    adapter: &ChatAdapter,
    request: &CompletionRequest,
) -> Result<String> {
    let prefixes: PrefixStream = adapter.complete(request).await?;
    print_prefixes(prefixes).await
}

async fn print_prefixes(mut prefixes: PrefixStream) -> Result<String> {
    let mut stdout = io::stdout();
    let mut shown = String::new();

    while let Some(prefix) = prefixes.next().await {
        let prefix = prefix?;
        let suffix = new_suffix(&shown, &prefix)?;
        stdout.write_all(suffix.as_bytes())?;
        stdout.flush()?;
        shown = prefix;
    }
    println!();

    Ok(shown)
}
