//! REST API route handlers.
//!
//! Provides endpoints for status, model discovery and streaming chat.

use std::convert::Infallible;
use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;

use chatty_agent::{
    Backend, ChatConfig, ChatError, CompletionRequest, GenerationParameters, PrefixStream, Turn,
};

use crate::state::AppState;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A [`ChatError`] rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub ChatError);

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            ChatError::InvalidInput { .. } | ChatError::UnsupportedModel { .. } => {
                StatusCode::BAD_REQUEST
            }
            ChatError::BackendTransport { .. } | ChatError::BackendProtocol { .. } => {
                StatusCode::BAD_GATEWAY
            }
            ChatError::ConfigError { .. } | ChatError::Json(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(error = %self.0, "chat request failed");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

// ---------------------------------------------------------------------------
// GET /api/status
// ---------------------------------------------------------------------------

/// Response payload for the `/api/status` endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub version: String,
    pub default_model: String,
}

/// Return basic server information.
pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        default_model: state.chat.default_model.clone(),
    })
}

// ---------------------------------------------------------------------------
// GET /api/models
// ---------------------------------------------------------------------------

/// One entry of the model catalogue.
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Selector accepted by `/api/chat`.
    pub name: String,
    /// Repository id of the hosted model.
    pub model_id: String,
    /// Whether this is the configured default.
    pub default: bool,
}

/// List the models the adapter can serve.
pub async fn models(State(state): State<Arc<AppState>>) -> Json<Vec<ModelInfo>> {
    let default = state.chat.default_model.parse::<Backend>().ok();
    Json(
        Backend::ALL
            .into_iter()
            .map(|b| ModelInfo {
                name: b.model_name().to_owned(),
                model_id: b.model_id().to_owned(),
                default: Some(b) == default,
            })
            .collect(),
    )
}

// ---------------------------------------------------------------------------
// POST /api/chat
// ---------------------------------------------------------------------------

/// Request body for `/api/chat`.  Every field except `prompt` falls back to
/// the server's configured defaults.
#[derive(Debug, Deserialize)]
pub struct ChatBody {
    pub prompt: String,
    #[serde(default)]
    pub history: Vec<Turn>,
    pub system_message: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub repetition_penalty: Option<f32>,
}

impl ChatBody {
    /// Fill unset fields from `defaults`.
    pub fn into_request(self, defaults: &ChatConfig) -> CompletionRequest {
        let base = defaults.parameters;
        CompletionRequest {
            prompt: self.prompt,
            history: self.history,
            system_message: self
                .system_message
                .unwrap_or_else(|| defaults.system_message.clone()),
            model: self.model.unwrap_or_else(|| defaults.default_model.clone()),
            parameters: GenerationParameters {
                max_tokens: self.max_tokens.unwrap_or(base.max_tokens),
                temperature: self.temperature.unwrap_or(base.temperature),
                top_p: self.top_p.unwrap_or(base.top_p),
                repetition_penalty: self.repetition_penalty.unwrap_or(base.repetition_penalty),
                stream: true,
            },
        }
    }
}

/// SSE payload of a `prefix` event.
#[derive(Debug, Serialize, Deserialize)]
pub struct PrefixEvent {
    /// The full response so far.
    pub text: String,
}

/// Stream a completion as Server-Sent Events.
///
/// Input and connection errors are answered with a plain JSON error and a
/// 4xx/5xx status.  Once streaming has started, each growing prefix is sent
/// as a `prefix` event; the stream ends with either `done` or a single
/// `error` event.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ChatBody>, JsonRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let Json(body) = body.map_err(|e| ChatError::InvalidInput {
        reason: e.body_text(),
    })?;

    let request = body.into_request(&state.chat);
    tracing::info!(
        model = %request.model,
        history = request.history.len(),
        "chat request"
    );

    let prefixes = state.adapter.complete(&request).await?;
    Ok(Sse::new(prefix_events(prefixes)).keep_alive(KeepAlive::default()))
}

/// Map prefixes to SSE events, closing with `done` or `error`.
fn prefix_events(mut prefixes: PrefixStream) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        while let Some(item) = prefixes.next().await {
            match item {
                Ok(text) => {
                    let event = Event::default()
                        .event("prefix")
                        .json_data(PrefixEvent { text })
                        .unwrap_or_else(|_| Event::default().event("prefix"));
                    yield Ok(event);
                }
                Err(e) => {
                    yield Ok(Event::default().event("error").data(e.to_string()));
                    return;
                }
            }
        }
        yield Ok(Event::default().event("done").data("[DONE]"));
    }
}
