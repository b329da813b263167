use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct OpenAiChatResponse {
    #[serde(default)]
    pub(crate) model: Option<String>,
    #[serde(default)]
    pub(crate) choices: Vec<OpenAiResponseChoice>,
    #[serde(default)]
    pub(crate) usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct OpenAiResponseChoice {
    #[serde(default)]
    pub(crate) message: Option<OpenAiResponseMessage>,
    #[serde(default)]
    pub(crate) finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct OpenAiResponseMessage {
    #[serde(default)]
    pub(crate) content: Option<String>,
    #[serde(default)]
    pub(crate) refusal: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct OpenAiUsage {
    #[serde(default)]
    pub(crate) prompt_tokens: Option<u64>,
    #[serde(default)]
    pub(crate) completion_tokens: Option<u64>,
    #[serde(default)]
    pub(crate) total_tokens: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct OpenAiStreamChunk {
    #[serde(default)]
    pub(crate) choices: Vec<OpenAiStreamChoice>,
    #[serde(default)]
    pub(crate) usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct OpenAiStreamChoice {
    #[serde(default)]
    pub(crate) delta: Option<OpenAiStreamDelta>,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct OpenAiStreamDelta {
    #[serde(default)]
    pub(crate) content: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct OpenAiModelList {
    #[serde(default)]
    pub(crate) data: Vec<OpenAiModel>,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct OpenAiModel {
    pub(crate) id: String,
}
