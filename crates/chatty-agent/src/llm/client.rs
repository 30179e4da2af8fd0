//! HTTP client for hosted inference endpoints.
//!
//! [`InferenceClient`] owns a pooled `reqwest` client built from explicit
//! configuration.  It is cheap to clone and safe to share between concurrent
//! chat sessions; every call to [`InferenceClient::stream_tokens`] opens its
//! own network stream.

use std::time::Duration;

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};

use crate::config::InferenceConfig;
use crate::error::{ChatError, Result};
use crate::llm::backend::{Backend, BackendRequest};
use crate::llm::streaming::LineBuffer;
use crate::llm::types::{GenerationParameters, Message, StreamEvent};

/// A stream of text deltas from one generation request.
pub type TokenStream = BoxStream<'static, Result<String>>;

/// Client for the text-generation and chat-completions inference routes.
#[derive(Debug, Clone)]
pub struct InferenceClient {
    base_url: String,
    api_token: Option<String>,
    http: reqwest::Client,
}

impl InferenceClient {
    /// Create a new client with the given configuration.
    pub fn new(config: &InferenceConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ChatError::ConfigError {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            base_url: config.base_url.clone(),
            api_token: config.api_token.clone().filter(|t| !t.is_empty()),
            http,
        })
    }

    /// The base URL every backend endpoint is resolved against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue one streaming generation request and return its token deltas.
    ///
    /// The request is sent eagerly, so HTTP-level failures (unreachable host,
    /// 401, 429, ...) are reported here before any token is produced.  The
    /// returned stream owns the response body; dropping it closes the
    /// connection.
    pub async fn stream_tokens(
        &self,
        backend: Backend,
        messages: &[Message],
        params: &GenerationParameters,
    ) -> Result<TokenStream> {
        let request = backend.build_request(&self.base_url, messages, params);
        let resp = self.send(backend, &request).await?;
        Ok(token_stream(resp, backend))
    }

    /// POST the request and check the status code.
    async fn send(&self, backend: Backend, request: &BackendRequest) -> Result<reqwest::Response> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &self.api_token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| {
                    ChatError::ConfigError {
                        reason: format!("invalid authorization header: {e}"),
                    }
                })?,
            );
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        tracing::debug!(
            url = %request.url,
            backend = %backend,
            model_id = backend.model_id(),
            authenticated = self.api_token.is_some(),
            "sending generation request"
        );

        let resp = self
            .http
            .post(&request.url)
            .headers(headers)
            .json(&request.body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ChatError::BackendTransport {
                status: Some(status.as_u16()),
                reason: format!("API returned {status}: {text}"),
            });
        }

        Ok(resp)
    }
}

/// Turn a streaming response body into a stream of text deltas.
fn token_stream(resp: reqwest::Response, backend: Backend) -> TokenStream {
    decode_sse(resp.bytes_stream(), backend).boxed()
}

/// Decode an SSE byte stream into text deltas using the backend's wire
/// format.
///
/// Generic over the byte source so the decoding loop can be driven without a
/// network connection.  The stream ends after the first error.
pub fn decode_sse<S, B, E>(
    byte_stream: S,
    backend: Backend,
) -> impl Stream<Item = Result<String>> + Send + 'static
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<ChatError> + Send + 'static,
{
    async_stream::try_stream! {
        let mut decoder = backend.decoder();
        let mut lines = LineBuffer::new();
        let mut done = false;
        futures::pin_mut!(byte_stream);

        'read: while let Some(chunk) = byte_stream.next().await {
            let chunk = chunk.map_err(Into::<ChatError>::into)?;
            for line in lines.push(chunk.as_ref())? {
                match decoder.decode_line(&line)? {
                    Some(StreamEvent::Token(text)) => yield text,
                    Some(StreamEvent::Done) => {
                        done = true;
                        break 'read;
                    }
                    None => {}
                }
            }
        }

        if !done {
            if let Some(line) = lines.finish()? {
                if let Some(StreamEvent::Token(text)) = decoder.decode_line(&line)? {
                    yield text;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
