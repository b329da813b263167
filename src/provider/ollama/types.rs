use serde::Deserialize;

/// Shape shared by `/api/chat` replies and every line of its stream.
#[derive(Debug, Deserialize, Clone, Default)]
pub(crate) struct OllamaChatResponse {
    #[serde(default)]
    pub(crate) message: Option<OllamaMessage>,
    #[serde(default)]
    pub(crate) done: bool,
    #[serde(default)]
    pub(crate) done_reason: Option<String>,
    #[serde(default)]
    pub(crate) prompt_eval_count: Option<u64>,
    #[serde(default)]
    pub(crate) eval_count: Option<u64>,
    #[serde(default)]
    pub(crate) error: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct OllamaMessage {
    #[serde(default)]
    pub(crate) content: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub(crate) struct OllamaTagsResponse {
    #[serde(default)]
    pub(crate) models: Vec<OllamaModelTag>,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct OllamaModelTag {
    pub(crate) name: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub(crate) struct OllamaPullResponse {
    #[serde(default)]
    pub(crate) status: Option<String>,
    #[serde(default)]
    pub(crate) error: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub(crate) struct CatalogResponse {
    #[serde(default)]
    pub(crate) models: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct CatalogEntry {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) tags: Vec<String>,
}
