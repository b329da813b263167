use serde_json::{Map, Value, json};

use crate::config::LlmConfig;
use crate::session::Thread;

/// Builds a `generateContent` body.
///
/// Gemini only knows `user` and `model` turns; system turns become the
/// `system_instruction`.
pub(crate) fn build_gemini_body(config: &LlmConfig, thread: &Thread) -> Value {
    let mut system = Vec::new();
    let mut contents = Vec::new();
    for message in thread.messages() {
        if message.role.as_str() == "system" {
            system.push(json!({"text": message.content}));
            continue;
        }
        let role = if message.role.is_assistant() { "model" } else { "user" };
        contents.push(json!({"role": role, "parts": [{"text": message.content}]}));
    }

    let mut generation = Map::new();
    generation.insert("maxOutputTokens".to_string(), Value::from(config.max_tokens));
    generation.insert("temperature".to_string(), Value::from(config.temperature));
    generation.insert("topP".to_string(), Value::from(config.top_p));
    generation.insert("candidateCount".to_string(), Value::from(1));
    if let Some(seed) = config.seed {
        generation.insert("seed".to_string(), Value::from(seed));
    }

    let mut body = Map::new();
    if !system.is_empty() {
        body.insert("system_instruction".to_string(), json!({"parts": system}));
    }
    body.insert("contents".to_string(), Value::Array(contents));
    body.insert("generationConfig".to_string(), Value::Object(generation));
    Value::Object(body)
}
