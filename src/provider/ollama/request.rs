use serde_json::{Map, Value, json};

use crate::config::LlmConfig;
use crate::session::Thread;

pub(crate) fn build_chat_body(config: &LlmConfig, thread: &Thread, stream: bool) -> Value {
    let mut options = Map::new();
    if let Some(seed) = config.seed {
        options.insert("seed".to_string(), Value::from(seed));
    }
    options.insert("temperature".to_string(), Value::from(config.temperature));
    options.insert("top_p".to_string(), Value::from(config.top_p));
    options.insert("num_predict".to_string(), Value::from(config.max_tokens));

    let mut body = Map::new();
    body.insert("model".to_string(), Value::String(config.model.clone()));
    body.insert(
        "messages".to_string(),
        Value::Array(
            thread
                .messages()
                .iter()
                .map(|message| json!({"role": message.role.as_str(), "content": message.content}))
                .collect(),
        ),
    );
    body.insert("stream".to_string(), Value::Bool(stream));
    if config.json_mode {
        body.insert("format".to_string(), Value::String("json".to_string()));
    }
    body.insert("options".to_string(), Value::Object(options));
    Value::Object(body)
}

pub(crate) fn build_pull_body(model: &str) -> Value {
    json!({"model": model, "stream": false})
}
