//! Streaming chat completion.
//!
//! [`ChatAdapter`] is the entry point chat front ends call: it normalizes the
//! history, resolves the backend, validates parameters, opens one streaming
//! request and turns the backend's token deltas into a sequence of growing
//! response prefixes.
//!
//! Every emitted value is the *whole* response so far, so a front end can
//! simply replace what it displays:
//!
//! ```text
//! deltas:   "The"   " sky"      " is"         " blue."
//! prefixes: "The"   "The sky"   "The sky is"  "The sky is blue."
//! ```

use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{ChatConfig, ChattyConfig, UnknownModelPolicy};
use crate::error::{ChatError, Result};
use crate::history::{Turn, normalize};
use crate::llm::backend::Backend;
use crate::llm::client::InferenceClient;
use crate::llm::types::{GenerationParameters, Message};

/// A lazy, growing-prefix response stream.
///
/// Ends when the backend finishes.  An `Err` item is always the last item.
pub type PrefixStream = BoxStream<'static, Result<String>>;

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Everything a chat front end supplies for one completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The new user prompt.
    pub prompt: String,
    /// Prior exchanges, oldest first.
    #[serde(default)]
    pub history: Vec<Turn>,
    /// System directive.
    pub system_message: String,
    /// Model selector, e.g. `"zephyr-7b-beta"`.
    pub model: String,
    /// Generation options.
    #[serde(default)]
    pub parameters: GenerationParameters,
}

impl CompletionRequest {
    /// A request for `prompt` with the configured defaults and no history.
    pub fn new(prompt: impl Into<String>, defaults: &ChatConfig) -> Self {
        Self {
            prompt: prompt.into(),
            history: Vec::new(),
            system_message: defaults.system_message.clone(),
            model: defaults.default_model.clone(),
            parameters: defaults.parameters,
        }
    }

    /// Replace the history.
    pub fn with_history(mut self, history: Vec<Turn>) -> Self {
        self.history = history;
        self
    }

    /// Replace the model selector.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// The normalized message list for this request.
    pub fn messages(&self) -> Vec<Message> {
        normalize(&self.system_message, &self.history, &self.prompt)
    }
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// Streaming completion adapter.
///
/// Holds no per-conversation state: each [`ChatAdapter::complete`] call gets
/// its own accumulator and network stream, so one adapter can serve any
/// number of concurrent sessions.
#[derive(Debug, Clone)]
pub struct ChatAdapter {
    client: InferenceClient,
    unknown_model: UnknownModelPolicy,
}

impl ChatAdapter {
    /// Create an adapter around an explicitly configured client.
    pub fn new(client: InferenceClient, unknown_model: UnknownModelPolicy) -> Self {
        Self {
            client,
            unknown_model,
        }
    }

    /// Build the client and adapter from loaded configuration.
    pub fn from_config(config: &ChattyConfig) -> Result<Self> {
        let client = InferenceClient::new(&config.inference)?;
        Ok(Self::new(client, config.chat.unknown_model))
    }

    /// The policy applied to unrecognised model names.
    pub fn unknown_model_policy(&self) -> UnknownModelPolicy {
        self.unknown_model
    }

    /// Start a completion.
    ///
    /// Input problems (`UnsupportedModel` under the reject policy,
    /// `InvalidInput` for out-of-range parameters) and HTTP-level failures
    /// are returned as `Err` before any prefix is produced.  Failures after
    /// the stream started arrive as the final `Err` item of the stream.
    pub async fn complete(&self, request: &CompletionRequest) -> Result<PrefixStream> {
        let backend = match request.model.parse::<Backend>() {
            Ok(backend) => backend,
            Err(err) => match self.unknown_model {
                UnknownModelPolicy::Reject => return Err(err),
                UnknownModelPolicy::EmptyResponse => {
                    tracing::warn!(model = %request.model, "unknown model, returning empty response");
                    return Ok(stream::once(async { Ok(String::new()) }).boxed());
                }
            },
        };

        request.parameters.validate()?;

        let messages = request.messages();
        self.complete_messages(backend, &messages, &request.parameters)
            .await
    }

    /// Start a completion for an already normalized message list.
    pub async fn complete_messages(
        &self,
        backend: Backend,
        messages: &[Message],
        params: &GenerationParameters,
    ) -> Result<PrefixStream> {
        let request_id = Uuid::now_v7();
        tracing::debug!(
            %request_id,
            backend = %backend,
            messages = messages.len(),
            max_tokens = params.max_tokens,
            "starting completion"
        );

        let tokens = self.client.stream_tokens(backend, messages, params).await?;
        Ok(accumulate_prefixes(tokens)
            .inspect(move |item| match item {
                Ok(prefix) => tracing::trace!(%request_id, len = prefix.len(), "prefix"),
                Err(e) => tracing::warn!(%request_id, error = %e, "completion stream failed"),
            })
            .boxed())
    }
}

// ---------------------------------------------------------------------------
// Accumulation
// ---------------------------------------------------------------------------

/// Turn a stream of deltas into the stream of all response prefixes.
///
/// For deltas `f1..fn` the output is `r1..rn` with `r0 = ""` and
/// `ri = ri-1 + fi`: one item per delta, in arrival order.  The first error
/// is passed through and ends the stream.
pub fn accumulate_prefixes<S>(deltas: S) -> impl Stream<Item = Result<String>> + Send + 'static
where
    S: Stream<Item = Result<String>> + Send + 'static,
{
    async_stream::stream! {
        let mut response = String::new();
        let mut fragments = 0usize;
        futures::pin_mut!(deltas);

        while let Some(delta) = deltas.next().await {
            match delta {
                Ok(text) => {
                    response.push_str(&text);
                    fragments += 1;
                    yield Ok(response.clone());
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }

        tracing::info!(fragments, chars = response.chars().count(), "completion finished");
    }
}

/// Drain a prefix stream and return the final response.
///
/// Convenience for callers that do not render incrementally.
pub async fn collect_response(mut prefixes: PrefixStream) -> Result<String> {
    let mut last = String::new();
    while let Some(prefix) = prefixes.next().await {
        last = prefix?;
    }
    Ok(last)
}

/// Returns `Err` with a short description when the stream cannot have come
/// from [`accumulate_prefixes`].
pub fn check_prefix_growth(previous: &str, next: &str) -> Result<()> {
    if next.starts_with(previous) {
        Ok(())
    } else {
        Err(ChatError::protocol(format!(
            "response shrank or changed: {} -> {} bytes",
            previous.len(),
            next.len()
        )))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
