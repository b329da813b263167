use serde_json::{Map, Value, json};

use crate::config::LlmConfig;
use crate::session::Thread;

pub(crate) fn build_openai_body(config: &LlmConfig, thread: &Thread, stream: bool) -> Value {
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
    body.insert(
        "max_completion_tokens".to_string(),
        Value::from(config.max_tokens),
    );
    body.insert("temperature".to_string(), Value::from(config.temperature));
    body.insert("top_p".to_string(), Value::from(config.top_p));
    if let Some(seed) = config.seed {
        body.insert("seed".to_string(), Value::from(seed));
    }
    let format = if config.json_mode { "json_object" } else { "text" };
    body.insert("response_format".to_string(), json!({"type": format}));
    body.insert("stream".to_string(), Value::Bool(stream));
    if stream {
        body.insert(
            "stream_options".to_string(),
            json!({"include_usage": true}),
        );
    }
    Value::Object(body)
}
