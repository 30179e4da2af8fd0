//! Integration tests for the chatty-agent crate.
//!
//! These tests exercise history normalization, backend selection, request
//! construction and configuration through the public API, without a network
//! connection.

use chatty_agent::llm::backend::render_instruct_prompt;
use chatty_agent::{
    Backend, ChatAdapter, ChatConfig, ChatError, ChattyConfig, CompletionRequest,
    GenerationParameters, Message, Role, Turn, UnknownModelPolicy, normalize,
};

// ═══════════════════════════════════════════════════════════════════════
//  History normalization
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn normalize_long_history_preserves_order() {
    let history: Vec<Turn> = (0..5)
        .map(|i| Turn::new(format!("q{i}"), format!("a{i}")))
        .collect();
    let messages = normalize("sys", &history, "final");

    assert_eq!(messages.len(), 12);
    for (i, pair) in messages[1..11].chunks(2).enumerate() {
        assert_eq!(pair[0], Message::user(format!("q{i}")));
        assert_eq!(pair[1], Message::assistant(format!("a{i}")));
    }
    assert_eq!(messages[11], Message::user("final"));
}

#[test]
fn normalize_keeps_empty_system_message() {
    let messages = normalize("", &[Turn(None, Some("reply".into()))], "next");
    assert_eq!(messages[0].role, Role::System);
    assert!(messages[0].content.is_empty());
    assert_eq!(messages.len(), 3);
}

#[test]
fn history_from_chat_widget_json() {
    let json = r#"{
        "prompt": "how are you?",
        "history": [["hi", "hello!"], ["", null]],
        "system_message": "be terse",
        "model": "zephyr-7b-beta"
    }"#;
    let request: CompletionRequest = serde_json::from_str(json).unwrap();

    assert_eq!(request.parameters, GenerationParameters::default());
    let messages = request.messages();
    assert_eq!(
        messages,
        vec![
            Message::system("be terse"),
            Message::user("hi"),
            Message::assistant("hello!"),
            Message::user("how are you?"),
        ]
    );
}

// ═══════════════════════════════════════════════════════════════════════
//  Backends
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn every_backend_round_trips_through_its_model_name() {
    for backend in Backend::ALL {
        assert_eq!(backend.model_name().parse::<Backend>().unwrap(), backend);
        assert_eq!(backend.model_id().parse::<Backend>().unwrap(), backend);
    }
}

#[test]
fn backends_send_different_parameter_sets() {
    let messages = normalize("sys", &[], "hello");
    let params = GenerationParameters {
        max_tokens: 64,
        ..Default::default()
    };

    let zephyr = Backend::Zephyr.build_request("http://h", &messages, &params);
    let mistral = Backend::Mistral.build_request("http://h", &messages, &params);

    assert_eq!(zephyr.body["max_tokens"], 64);
    assert!(zephyr.body.get("parameters").is_none());
    assert_eq!(mistral.body["parameters"]["max_new_tokens"], 64);
    assert!(mistral.body.get("max_tokens").is_none());
    assert!(mistral.body.get("messages").is_none());
    assert_eq!(mistral.body["inputs"], render_instruct_prompt(&messages));
}

// ═══════════════════════════════════════════════════════════════════════
//  Configuration and adapter construction
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn adapter_from_config_carries_policy() {
    let mut config = ChattyConfig::default();
    config.chat.unknown_model = UnknownModelPolicy::EmptyResponse;

    let adapter = ChatAdapter::from_config(&config).unwrap();
    assert_eq!(
        adapter.unknown_model_policy(),
        UnknownModelPolicy::EmptyResponse
    );
}

#[test]
fn config_round_trips_through_toml() {
    let mut config = ChattyConfig::default();
    config.chat.default_model = "mistral".into();
    config.inference.api_token = Some("hf_x".into());

    let text = toml::to_string(&config).unwrap();
    let parsed = ChattyConfig::from_toml(&text).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn request_defaults_follow_chat_config() {
    let defaults = ChatConfig {
        system_message: "be terse".into(),
        default_model: "mistral".into(),
        ..ChatConfig::default()
    };
    let request = CompletionRequest::new("hi", &defaults);
    assert_eq!(request.model, "mistral");
    assert_eq!(request.messages()[0], Message::system("be terse"));
}

#[test]
fn error_messages_are_descriptive() {
    let err = "gpt-4o".parse::<Backend>().unwrap_err();
    assert_eq!(err.to_string(), "unsupported model: gpt-4o");

    let err = GenerationParameters {
        top_p: 0.0,
        ..Default::default()
    }
    .validate()
    .unwrap_err();
    assert!(matches!(err, ChatError::InvalidInput { .. }));
    assert!(err.to_string().contains("top_p"));
}
