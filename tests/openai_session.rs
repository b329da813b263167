mod common;

use futures_util::StreamExt;
use llmanager::config::{LlmConfig, Provider};
use llmanager::error::LLMError;
use llmanager::http::HttpMethod;
use llmanager::provider::OpenAiSession;
use llmanager::session::{ChatSession, Reply};
use llmanager::types::{Message, Role};
use serde_json::json;

use common::{MOCK_BASE, MockTransport, mock_env, sse};

fn completion(text: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "model": "gpt-4o-mini",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": text}, "finish_reason": "stop"}],
        "usage": {"prompt_tokens": 8, "completion_tokens": 2, "total_tokens": 10}
    })
}

fn delta(text: &str) -> serde_json::Value {
    json!({"choices": [{"index": 0, "delta": {"content": text}}]})
}

fn session(mock: &std::sync::Arc<MockTransport>, config: LlmConfig) -> OpenAiSession {
    OpenAiSession::new(config, &mock_env(mock, &[("OPENAI_API_KEY", "sk-test")])).expect("session")
}

#[tokio::test]
async fn send_message_appends_user_and_assistant_turns() {
    let mock = MockTransport::new();
    mock.push_json(200, completion("hello"));
    let mut session = session(&mock, LlmConfig::new(Provider::OpenAi, "gpt-4o-mini"));

    let reply = session.send_message("hi").await.expect("reply");
    match reply {
        Reply::Text(text) => assert_eq!(text, "hello"),
        other => panic!("unexpected reply: {other:?}"),
    }
    assert_eq!(
        session.thread().messages(),
        &[
            Message::new(Role::user(), "hi"),
            Message::new(Role::assistant(), "hello"),
        ]
    );

    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, HttpMethod::Post);
    assert_eq!(request.url, format!("{MOCK_BASE}/v1/chat/completions"));
    assert_eq!(
        request.headers.get("Authorization").map(String::as_str),
        Some("Bearer sk-test")
    );
    let body = request.body.as_ref().expect("body");
    assert_eq!(body["messages"], json!([{"role": "user", "content": "hi"}]));
    assert_eq!(body["stream"], json!(false));
}

#[tokio::test]
async fn system_prompt_is_sent_first() {
    let mock = MockTransport::new();
    mock.push_json(200, completion("ok"));
    let mut session = session(&mock, LlmConfig::new(Provider::OpenAi, "gpt-4o-mini"));
    session.add_system_prompt("answer tersely");
    session.send_message("hi").await.expect("reply");

    let body = mock.requests()[0].body.clone().expect("body");
    assert_eq!(
        body["messages"],
        json!([
            {"role": "system", "content": "answer tersely"},
            {"role": "user", "content": "hi"}
        ])
    );
}

#[tokio::test]
async fn json_mode_parses_the_reply() {
    let mock = MockTransport::new();
    mock.push_json(200, completion("{\"city\": \"Paris\"}"));
    let mut config = LlmConfig::new(Provider::OpenAi, "gpt-4o-mini");
    config.json_mode = true;
    let mut session = session(&mock, config);

    match session.send_message("capital of France as json").await.expect("reply") {
        Reply::Json(value) => assert_eq!(value, json!({"city": "Paris"})),
        other => panic!("unexpected reply: {other:?}"),
    }
    let body = mock.requests()[0].body.clone().expect("body");
    assert_eq!(body["response_format"], json!({"type": "json_object"}));
}

#[tokio::test]
async fn streamed_reply_is_committed_once_drained() {
    let mock = MockTransport::new();
    let mut chunks = sse(&[delta("one "), delta("two "), delta("three")]);
    chunks.push(
        "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":4,\"completion_tokens\":3,\"total_tokens\":7}}\n\n"
            .to_string(),
    );
    chunks.push("data: [DONE]\n\n".to_string());
    mock.push_chunks(200, chunks);

    let mut config = LlmConfig::new(Provider::OpenAi, "gpt-4o-mini");
    config.stream = true;
    let mut session = session(&mock, config);

    let reply = session.send_message("count").await.expect("reply");
    let Reply::Stream(mut fragments) = reply else {
        panic!("expected a stream");
    };
    let mut collected = Vec::new();
    while let Some(fragment) = fragments.next().await {
        collected.push(fragment.expect("fragment"));
    }
    assert_eq!(collected, vec!["one ", "two ", "three"]);
    assert!(fragments.is_committed());
    drop(fragments);

    assert_eq!(session.thread().len(), 2);
    assert_eq!(
        session.thread().last(),
        Some(&Message::new(Role::assistant(), "one two three"))
    );
    let body = mock.requests()[0].body.clone().expect("body");
    assert_eq!(body["stream_options"], json!({"include_usage": true}));
}

#[tokio::test]
async fn abandoned_stream_leaves_only_the_user_turn() {
    let mock = MockTransport::new();
    let mut chunks = sse(&[delta("one "), delta("two "), delta("three")]);
    chunks.push("data: [DONE]\n\n".to_string());
    mock.push_chunks(200, chunks);

    let mut config = LlmConfig::new(Provider::OpenAi, "gpt-4o-mini");
    config.stream = true;
    let mut session = session(&mock, config);

    {
        let reply = session.send_message("count").await.expect("reply");
        let Reply::Stream(mut fragments) = reply else {
            panic!("expected a stream");
        };
        assert_eq!(fragments.next().await.expect("fragment").expect("ok"), "one ");
    }
    assert_eq!(session.thread().messages(), &[Message::new(Role::user(), "count")]);
}

#[tokio::test]
async fn stream_cut_before_done_is_an_error() {
    let mock = MockTransport::new();
    mock.push_chunks(200, sse(&[delta("partial")]));

    let mut config = LlmConfig::new(Provider::OpenAi, "gpt-4o-mini");
    config.stream = true;
    let mut session = session(&mock, config);

    let reply = session.send_message("count").await.expect("reply");
    let err = reply.into_text().await.expect_err("truncated stream");
    assert!(matches!(err, LLMError::StreamClosed { .. }));
    assert_eq!(session.thread().len(), 1);
}

#[tokio::test]
async fn rejected_key_surfaces_as_auth_error() {
    let mock = MockTransport::new();
    mock.push_json(
        401,
        json!({"error": {"message": "Incorrect API key provided", "type": "invalid_request_error", "code": "invalid_api_key"}}),
    );
    let mut session = session(&mock, LlmConfig::new(Provider::OpenAi, "gpt-4o-mini"));

    match session.send_message("hi").await {
        Err(LLMError::Auth { message }) => assert!(message.contains("Incorrect API key")),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn streaming_error_status_is_parsed() {
    let mock = MockTransport::new();
    mock.push_chunks(
        429,
        [r#"{"error":{"message":"Rate limit reached","code":"rate_limit_exceeded"}}"#],
    );
    let mut config = LlmConfig::new(Provider::OpenAi, "gpt-4o-mini");
    config.stream = true;
    let mut session = session(&mock, config);

    assert!(matches!(
        session.send_message("hi").await,
        Err(LLMError::RateLimit { .. })
    ));
}

#[tokio::test]
async fn list_models_keeps_chat_models() {
    let mock = MockTransport::new();
    mock.push_json(
        200,
        json!({"object": "list", "data": [
            {"id": "gpt-4o", "object": "model"},
            {"id": "text-embedding-3-small", "object": "model"},
            {"id": "gpt-4o-mini", "object": "model"}
        ]}),
    );
    let session = session(&mock, LlmConfig::new(Provider::OpenAi, "gpt-4o-mini"));

    let models = session.list_models().await.expect("models");
    assert_eq!(models, vec!["gpt-4o", "gpt-4o-mini"]);
    let request = &mock.requests()[0];
    assert_eq!(request.method, HttpMethod::Get);
    assert_eq!(request.url, format!("{MOCK_BASE}/v1/models"));
    assert!(session.thread().is_empty());
}

#[test]
fn missing_key_names_the_variable() {
    let mock = MockTransport::new();
    match OpenAiSession::new(
        LlmConfig::new(Provider::OpenAi, "gpt-4o-mini"),
        &mock_env(&mock, &[]),
    ) {
        Err(LLMError::MissingCredential { env_var }) => assert_eq!(env_var, "OPENAI_API_KEY"),
        Err(other) => panic!("unexpected error type: {other:?}"),
        Ok(_) => panic!("session should not be created without a key"),
    }
}
