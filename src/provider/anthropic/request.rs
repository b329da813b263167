use serde_json::{Map, Value, json};

use crate::config::LlmConfig;
use crate::session::Thread;

/// Builds a Messages API body.
///
/// System turns are not a role in this API; their texts are joined into the
/// top-level `system` field. `priming` is sent as a trailing assistant turn
/// without being part of the thread. The seed is not supported and never sent.
pub(crate) fn build_anthropic_body(
    config: &LlmConfig,
    thread: &Thread,
    priming: Option<&str>,
    stream: bool,
) -> Value {
    let mut system = Vec::new();
    let mut messages = Vec::new();
    for message in thread.messages() {
        match message.role.as_str() {
            "system" => system.push(message.content.as_str()),
            role => {
                let role = if message.role.is_assistant() { "assistant" } else { role };
                messages.push(json!({"role": role, "content": message.content}));
            }
        }
    }
    if let Some(priming) = priming {
        messages.push(json!({"role": "assistant", "content": priming}));
    }

    let mut body = Map::new();
    body.insert("model".to_string(), Value::String(config.model.clone()));
    if !system.is_empty() {
        body.insert("system".to_string(), Value::String(system.join("\n\n")));
    }
    body.insert("messages".to_string(), Value::Array(messages));
    body.insert("max_tokens".to_string(), Value::from(config.max_tokens));
    body.insert("temperature".to_string(), Value::from(config.temperature));
    body.insert("top_p".to_string(), Value::from(config.top_p));
    body.insert("stream".to_string(), Value::Bool(stream));
    Value::Object(body)
}
