mod common;

use std::sync::Arc;

use futures_util::StreamExt;
use llmanager::config::{LlmConfig, Provider};
use llmanager::error::LLMError;
use llmanager::provider::AnthropicSession;
use llmanager::provider::anthropic::JSON_PRIMING;
use llmanager::session::{ChatSession, Reply};
use llmanager::types::{Message, Role};
use serde_json::json;

use common::{MOCK_BASE, MockTransport, mock_env, sse};

fn message(text: &str) -> serde_json::Value {
    json!({
        "id": "msg_01",
        "type": "message",
        "role": "assistant",
        "model": "claude-3-5-haiku-latest",
        "content": [{"type": "text", "text": text}],
        "stop_reason": "end_turn",
        "usage": {"input_tokens": 11, "output_tokens": 4}
    })
}

fn session(mock: &Arc<MockTransport>, config: LlmConfig) -> AnthropicSession {
    AnthropicSession::new(config, &mock_env(mock, &[("ANTHROPIC_API_KEY", "sk-ant")]))
        .expect("session")
}

fn json_config() -> LlmConfig {
    let mut config = LlmConfig::new(Provider::Anthropic, "claude-3-5-haiku-latest");
    config.json_mode = true;
    config
}

#[tokio::test]
async fn plain_reply_and_vendor_headers() {
    let mock = MockTransport::new();
    mock.push_json(200, message("Hello!"));
    let mut session = session(
        &mock,
        LlmConfig::new(Provider::Anthropic, "claude-3-5-haiku-latest"),
    );
    session.add_system_prompt("be kind");

    let text = session
        .send_message("hi")
        .await
        .expect("reply")
        .into_text()
        .await
        .expect("text");
    assert_eq!(text, "Hello!");
    assert_eq!(
        session.thread().messages(),
        &[
            Message::new(Role::system(), "be kind"),
            Message::new(Role::user(), "hi"),
            Message::new(Role::assistant(), "Hello!"),
        ]
    );

    let request = &mock.requests()[0];
    assert_eq!(request.url, format!("{MOCK_BASE}/v1/messages"));
    assert_eq!(request.headers.get("x-api-key").map(String::as_str), Some("sk-ant"));
    assert_eq!(
        request.headers.get("anthropic-version").map(String::as_str),
        Some("2023-06-01")
    );
    let body = request.body.as_ref().expect("body");
    assert_eq!(body["system"], json!("be kind"));
    assert_eq!(body["messages"], json!([{"role": "user", "content": "hi"}]));
}

#[tokio::test]
async fn primed_json_reply_is_reconstructed() {
    let mock = MockTransport::new();
    mock.push_json(200, message(r#""foo": "bar"}"#));
    let mut session = session(&mock, json_config());

    match session.send_message("json please").await.expect("reply") {
        Reply::Json(value) => assert_eq!(value, json!({"foo": "bar"})),
        other => panic!("unexpected reply: {other:?}"),
    }

    let body = mock.requests()[0].body.clone().expect("body");
    assert_eq!(
        body["messages"],
        json!([
            {"role": "user", "content": "json please"},
            {"role": "assistant", "content": JSON_PRIMING}
        ])
    );
    assert_eq!(session.thread().len(), 2);
    assert_eq!(
        session.thread().last().map(|m| m.content.as_str()),
        Some("Here is the JSON requested:\n{\"foo\": \"bar\"}")
    );
}

#[tokio::test]
async fn reply_without_closing_brace_is_returned_raw() {
    let mock = MockTransport::new();
    mock.push_json(200, message(r#""foo": "bar""#));
    let mut session = session(&mock, json_config());

    match session.send_message("json please").await.expect("reply") {
        Reply::Text(text) => assert_eq!(text, r#""foo": "bar""#),
        other => panic!("unexpected reply: {other:?}"),
    }
}

#[tokio::test]
async fn streamed_priming_reply_extends_the_priming_turn() {
    let mock = MockTransport::new();
    let chunks = sse(&[
        json!({"type": "message_start", "message": {"id": "msg_01", "usage": {"input_tokens": 9, "output_tokens": 1}}}),
        json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
        json!({"type": "ping"}),
        json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "\"a\": "}}),
        json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "1}"}}),
        json!({"type": "content_block_stop", "index": 0}),
        json!({"type": "message_delta", "delta": {"stop_reason": "end_turn"}, "usage": {"output_tokens": 6}}),
        json!({"type": "message_stop"}),
    ]);
    mock.push_chunks(200, chunks);
    let mut config = json_config();
    config.stream = true;
    let mut session = session(&mock, config);

    let text = session
        .send_message("json please")
        .await
        .expect("reply")
        .into_text()
        .await
        .expect("text");
    assert_eq!(text, "\"a\": 1}");
    assert_eq!(session.thread().len(), 2);
    assert_eq!(
        session.thread().last(),
        Some(&Message::new(
            Role::assistant(),
            "Here is the JSON requested:\n{\"a\": 1}"
        ))
    );
}

#[tokio::test]
async fn abandoned_json_stream_leaves_only_the_user_turn() {
    let mock = MockTransport::new();
    mock.push_chunks(
        200,
        sse(&[
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "\"a\": "}}),
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "1"}}),
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "}"}}),
            json!({"type": "message_stop"}),
        ]),
    );
    let mut config = json_config();
    config.stream = true;
    let mut session = session(&mock, config);

    {
        let Reply::Stream(mut fragments) = session.send_message("json please").await.expect("reply")
        else {
            panic!("expected a stream");
        };
        assert_eq!(fragments.next().await.expect("fragment").expect("ok"), "\"a\": ");
    }
    assert_eq!(
        session.thread().messages(),
        &[Message::new(Role::user(), "json please")]
    );

    let body = mock.requests()[0].body.clone().expect("body");
    assert_eq!(
        body["messages"],
        json!([
            {"role": "user", "content": "json please"},
            {"role": "assistant", "content": JSON_PRIMING}
        ])
    );
}

#[tokio::test]
async fn overloaded_event_fails_the_stream() {
    let mock = MockTransport::new();
    mock.push_chunks(
        200,
        sse(&[
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "Hi"}}),
            json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}),
        ]),
    );
    let mut config = LlmConfig::new(Provider::Anthropic, "claude-3-5-haiku-latest");
    config.stream = true;
    let mut session = session(&mock, config);

    let err = session
        .send_message("hi")
        .await
        .expect("reply")
        .into_text()
        .await
        .expect_err("error event");
    assert!(matches!(err, LLMError::Provider { provider: "anthropic", .. }));
    assert_eq!(session.thread().len(), 1);
}

#[tokio::test]
async fn listing_is_static() {
    let mock = MockTransport::new();
    let session = session(
        &mock,
        LlmConfig::new(Provider::Anthropic, "claude-3-5-haiku-latest"),
    );
    let models = session.list_models().await.expect("models");
    assert!(models.iter().any(|model| model == "claude-3-5-haiku-latest"));
    assert!(mock.requests().is_empty());
}

#[test]
fn missing_key_names_the_variable() {
    let mock = MockTransport::new();
    match AnthropicSession::new(json_config(), &mock_env(&mock, &[])) {
        Err(LLMError::MissingCredential { env_var }) => assert_eq!(env_var, "ANTHROPIC_API_KEY"),
        Err(other) => panic!("unexpected error type: {other:?}"),
        Ok(_) => panic!("session should not be created without a key"),
    }
}
