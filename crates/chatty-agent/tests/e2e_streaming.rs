//! End-to-end tests for the streaming completion adapter.
//!
//! These tests spin up an in-process Axum server on an ephemeral port that
//! imitates the hosted inference routes (chat-completions for Zephyr,
//! text-generation for Mistral), point a real [`ChatAdapter`] at it and check
//! the prefix stream that comes back.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use futures::StreamExt;
use serde_json::Value;
use tokio::net::TcpListener;

use chatty_agent::{
    ChatAdapter, ChatConfig, ChatError, CompletionRequest, InferenceClient, InferenceConfig,
    Turn, UnknownModelPolicy, collect_response,
};

// ── mock server ──────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct MockState {
    /// Request bodies received, in order.
    bodies: Arc<Mutex<Vec<Value>>>,
    /// Authorization headers received, in order.
    auth: Arc<Mutex<Vec<Option<String>>>>,
    /// Set when an endless stream's body is dropped by the server.
    released: Arc<AtomicBool>,
}

impl MockState {
    fn record(&self, headers: &HeaderMap, body: Value) {
        self.bodies.lock().unwrap().push(body);
        self.auth.lock().unwrap().push(
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned),
        );
    }

    fn last_body(&self) -> Value {
        self.bodies.lock().unwrap().last().cloned().expect("no request recorded")
    }
}

fn sse_response(body: Body) -> Response {
    ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
}

fn chat_chunk(content: &str) -> String {
    let chunk = serde_json::json!({
        "object": "chat.completion.chunk",
        "choices": [{"index": 0, "delta": {"content": content}}],
    });
    format!("data: {chunk}\n\n")
}

fn tgi_event(text: &str, special: bool) -> String {
    let event = serde_json::json!({
        "index": 0,
        "token": {"id": 1, "text": text, "logprob": -0.1, "special": special},
        "generated_text": null,
        "details": null,
    });
    format!("data:{event}\n\n")
}

async fn zephyr_handler(
    State(state): State<MockState>,
    headers: HeaderMap,
    axum::Json(body): axum::Json<Value>,
) -> Response {
    state.record(&headers, body);

    let mut payload = String::from(
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\"}}]}\n\n",
    );
    for part in ["The", " sky", " is", " blue."] {
        payload.push_str(&chat_chunk(part));
    }
    payload.push_str("data: [DONE]\n\n");
    sse_response(Body::from(payload))
}

async fn mistral_handler(
    State(state): State<MockState>,
    headers: HeaderMap,
    axum::Json(body): axum::Json<Value>,
) -> Response {
    state.record(&headers, body);

    let mut payload = String::new();
    for part in ["Fine", ",", " thanks"] {
        payload.push_str(&tgi_event(part, false));
    }
    payload.push_str(&tgi_event("</s>", true));
    sse_response(Body::from(payload))
}

async fn start_mock(state: MockState, router: Router<MockState>) -> String {
    let app = router.with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind to port 0");
    let addr: SocketAddr = listener.local_addr().expect("get local addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    // Small yield so the listener is ready.
    tokio::time::sleep(Duration::from_millis(10)).await;

    format!("http://127.0.0.1:{}", addr.port())
}

fn default_router() -> Router<MockState> {
    Router::new()
        .route(
            "/HuggingFaceH4/zephyr-7b-beta/v1/chat/completions",
            post(zephyr_handler),
        )
        .route("/mistralai/Mistral-7B-Instruct-v0.2", post(mistral_handler))
}

fn adapter_for(base_url: &str, token: Option<&str>, policy: UnknownModelPolicy) -> ChatAdapter {
    let config = InferenceConfig {
        base_url: base_url.to_owned(),
        api_token: token.map(str::to_owned),
        timeout_secs: 10,
    };
    ChatAdapter::new(InferenceClient::new(&config).unwrap(), policy)
}

fn request(prompt: &str, model: &str) -> CompletionRequest {
    CompletionRequest {
        prompt: prompt.to_owned(),
        history: vec![Turn::new("hi", "hello!")],
        system_message: "be terse".to_owned(),
        model: model.to_owned(),
        parameters: ChatConfig::default().parameters,
    }
}

// ── zephyr ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn zephyr_streams_growing_prefixes() {
    let state = MockState::default();
    let base = start_mock(state.clone(), default_router()).await;
    let adapter = adapter_for(&base, Some("hf_test"), UnknownModelPolicy::Reject);

    let stream = adapter
        .complete(&request("how are you?", "zephyr-7b-beta"))
        .await
        .expect("completion starts");
    let prefixes: Vec<String> = stream.map(|r| r.unwrap()).collect().await;

    assert_eq!(
        prefixes,
        vec!["The", "The sky", "The sky is", "The sky is blue."]
    );

    let body = state.last_body();
    assert_eq!(body["stream"], true);
    assert_eq!(body["max_tokens"], 1024);
    assert!(body.get("repetition_penalty").is_none());
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0]["role"], "system");
    assert_eq!(messages[0]["content"], "be terse");
    assert_eq!(messages[2]["role"], "assistant");
    assert_eq!(messages[3]["content"], "how are you?");

    let auth = state.auth.lock().unwrap().last().cloned().flatten();
    assert_eq!(auth.as_deref(), Some("Bearer hf_test"));
}

// ── mistral ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn mistral_streams_text_generation_tokens() {
    let state = MockState::default();
    let base = start_mock(state.clone(), default_router()).await;
    let adapter = adapter_for(&base, None, UnknownModelPolicy::Reject);

    let stream = adapter
        .complete(&request("how are you?", "Mistral-7B-Instruct-v0.2"))
        .await
        .expect("completion starts");
    let prefixes: Vec<String> = stream.map(|r| r.unwrap()).collect().await;

    assert_eq!(prefixes, vec!["Fine", "Fine,", "Fine, thanks"]);

    let body = state.last_body();
    assert_eq!(
        body["inputs"],
        "<s>[INST] be terse\n\nhi [/INST] hello!</s>[INST] how are you? [/INST]"
    );
    assert_eq!(body["parameters"]["max_new_tokens"], 1024);
    assert_eq!(body["parameters"]["details"], true);
    assert_eq!(body["parameters"]["return_full_text"], false);
    assert!(body["parameters"].get("temperature").is_none());

    let auth = state.auth.lock().unwrap().last().cloned().flatten();
    assert!(auth.is_none(), "no token configured, no header sent");
}

// ── unknown models ───────────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_model_is_rejected_before_any_request() {
    let state = MockState::default();
    let base = start_mock(state.clone(), default_router()).await;
    let adapter = adapter_for(&base, None, UnknownModelPolicy::Reject);

    let err = adapter
        .complete(&request("hello", "llama-3"))
        .await
        .err()
        .expect("unknown model must fail");
    assert!(matches!(err, ChatError::UnsupportedModel { ref model } if model == "llama-3"));
    assert!(state.bodies.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_model_can_degrade_to_empty_response() {
    let state = MockState::default();
    let base = start_mock(state.clone(), default_router()).await;
    let adapter = adapter_for(&base, None, UnknownModelPolicy::EmptyResponse);

    let stream = adapter.complete(&request("hello", "llama-3")).await.unwrap();
    let items: Vec<String> = stream.map(|r| r.unwrap()).collect().await;

    assert_eq!(items, vec![String::new()]);
    assert!(state.bodies.lock().unwrap().is_empty());
}

// ── input validation ─────────────────────────────────────────────────────────

#[tokio::test]
async fn invalid_parameters_fail_before_any_request() {
    let state = MockState::default();
    let base = start_mock(state.clone(), default_router()).await;
    let adapter = adapter_for(&base, None, UnknownModelPolicy::Reject);

    let mut req = request("hello", "zephyr");
    req.parameters.max_tokens = 10_000;

    let err = adapter.complete(&req).await.err().unwrap();
    assert!(matches!(err, ChatError::InvalidInput { .. }));
    assert!(state.bodies.lock().unwrap().is_empty());
}

// ── transport failures ───────────────────────────────────────────────────────

#[tokio::test]
async fn http_error_status_is_a_transport_error() {
    async fn unauthorized() -> impl IntoResponse {
        (StatusCode::UNAUTHORIZED, "{\"error\":\"Invalid credentials\"}")
    }

    let router = Router::new().route(
        "/HuggingFaceH4/zephyr-7b-beta/v1/chat/completions",
        post(unauthorized),
    );
    let base = start_mock(MockState::default(), router).await;
    let adapter = adapter_for(&base, Some("hf_bad"), UnknownModelPolicy::Reject);

    let err = adapter
        .complete(&request("hello", "zephyr"))
        .await
        .err()
        .unwrap();
    match err {
        ChatError::BackendTransport { status, reason } => {
            assert_eq!(status, Some(401));
            assert!(reason.contains("Invalid credentials"), "reason: {reason}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_endpoint_is_a_transport_error() {
    // Bind and immediately drop a listener to get a port nobody serves.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let adapter = adapter_for(
        &format!("http://127.0.0.1:{port}"),
        None,
        UnknownModelPolicy::Reject,
    );
    let err = adapter
        .complete(&request("hello", "mistral"))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, ChatError::BackendTransport { status: None, .. }));
}

#[tokio::test]
async fn failure_after_first_fragment_ends_the_stream() {
    async fn broken_stream() -> Response {
        let body = async_stream::stream! {
            yield Ok::<_, std::io::Error>(chat_chunk("The"));
            tokio::time::sleep(Duration::from_millis(50)).await;
            yield Err(std::io::Error::other("upstream went away"));
        };
        sse_response(Body::from_stream(body))
    }

    let router = Router::new().route(
        "/HuggingFaceH4/zephyr-7b-beta/v1/chat/completions",
        post(broken_stream),
    );
    let base = start_mock(MockState::default(), router).await;
    let adapter = adapter_for(&base, None, UnknownModelPolicy::Reject);

    let stream = adapter.complete(&request("hello", "zephyr")).await.unwrap();
    let items: Vec<_> = stream.collect().await;

    assert_eq!(items.len(), 2, "one prefix, then the error: {items:?}");
    assert_eq!(items[0].as_ref().unwrap(), "The");
    assert!(matches!(items[1], Err(ChatError::BackendTransport { .. })));
}

#[tokio::test]
async fn in_stream_error_event_is_reported() {
    async fn overloaded() -> Response {
        let mut payload = tgi_event("Fine", false);
        payload.push_str("data:{\"error\":\"Model is overloaded\",\"error_type\":\"overloaded\"}\n\n");
        sse_response(Body::from(payload))
    }

    let router = Router::new().route("/mistralai/Mistral-7B-Instruct-v0.2", post(overloaded));
    let base = start_mock(MockState::default(), router).await;
    let adapter = adapter_for(&base, None, UnknownModelPolicy::Reject);

    let stream = adapter.complete(&request("hello", "mistral")).await.unwrap();
    let err = collect_response(stream).await.unwrap_err();
    assert!(err.to_string().contains("Model is overloaded"));
}

// ── cancellation ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn dropping_the_stream_releases_the_connection() {
    struct ReleaseFlag(Arc<AtomicBool>);

    impl Drop for ReleaseFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    async fn endless(State(state): State<MockState>) -> Response {
        let flag = ReleaseFlag(Arc::clone(&state.released));
        let body = async_stream::stream! {
            let _flag = flag;
            loop {
                yield Ok::<_, std::io::Error>(chat_chunk("tick "));
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        };
        sse_response(Body::from_stream(body))
    }

    let state = MockState::default();
    let router = Router::new().route(
        "/HuggingFaceH4/zephyr-7b-beta/v1/chat/completions",
        post(endless),
    );
    let base = start_mock(state.clone(), router).await;
    let adapter = adapter_for(&base, None, UnknownModelPolicy::Reject);

    let mut stream = adapter.complete(&request("hello", "zephyr")).await.unwrap();
    assert_eq!(stream.next().await.unwrap().unwrap(), "tick ");
    assert_eq!(stream.next().await.unwrap().unwrap(), "tick tick ");
    drop(stream);

    let released = tokio::time::timeout(Duration::from_secs(5), async {
        while !state.released.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(released.is_ok(), "server never saw the connection close");
}

// ── concurrency ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn concurrent_completions_do_not_share_buffers() {
    let state = MockState::default();
    let base = start_mock(state.clone(), default_router()).await;
    let adapter = adapter_for(&base, None, UnknownModelPolicy::Reject);

    let zephyr_req = request("a", "zephyr");
    let mistral_req = request("b", "mistral");
    let (zephyr, mistral) = tokio::join!(
        async { collect_response(adapter.complete(&zephyr_req).await?).await },
        async { collect_response(adapter.complete(&mistral_req).await?).await },
    );

    assert_eq!(zephyr.unwrap(), "The sky is blue.");
    assert_eq!(mistral.unwrap(), "Fine, thanks");
    assert_eq!(state.bodies.lock().unwrap().len(), 2);
}
