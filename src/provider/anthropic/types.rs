use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct AnthropicMessageResponse {
    #[serde(default)]
    pub(crate) content: Vec<AnthropicContentBlock>,
    #[serde(default)]
    pub(crate) stop_reason: Option<String>,
    #[serde(default)]
    pub(crate) usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct AnthropicContentBlock {
    #[serde(rename = "type")]
    pub(crate) kind: String,
    #[serde(default)]
    pub(crate) text: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub(crate) struct AnthropicUsage {
    #[serde(default)]
    pub(crate) input_tokens: Option<u64>,
    #[serde(default)]
    pub(crate) output_tokens: Option<u64>,
}

/// One server-sent event of a streaming response.
#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum AnthropicStreamEvent {
    MessageStart {
        message: AnthropicStreamMessage,
    },
    ContentBlockDelta {
        delta: AnthropicDelta,
    },
    MessageDelta {
        #[serde(default)]
        usage: Option<AnthropicUsage>,
    },
    MessageStop,
    Error {
        error: AnthropicStreamError,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct AnthropicStreamMessage {
    #[serde(default)]
    pub(crate) usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct AnthropicDelta {
    #[serde(default)]
    pub(crate) text: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct AnthropicStreamError {
    #[serde(default, rename = "type")]
    pub(crate) kind: Option<String>,
    #[serde(default)]
    pub(crate) message: Option<String>,
}
