use crate::error::LLMError;
use crate::stream::ChunkUpdate;
use crate::types::TokenUsage;

use super::PROVIDER_ID;
use super::types::{CatalogResponse, OllamaChatResponse, OllamaTagsResponse};

fn usage_of(resp: &OllamaChatResponse) -> Option<TokenUsage> {
    if resp.prompt_eval_count.is_none() && resp.eval_count.is_none() {
        return None;
    }
    Some(
        TokenUsage {
            prompt_tokens: resp.prompt_eval_count,
            completion_tokens: resp.eval_count,
            total_tokens: None,
        }
        .with_derived_total(),
    )
}

pub(crate) fn extract_reply(resp: OllamaChatResponse) -> Result<(String, Option<TokenUsage>), LLMError> {
    if let Some(error) = resp.error {
        return Err(LLMError::provider(PROVIDER_ID, error));
    }
    if resp.done_reason.as_deref() == Some("length") {
        tracing::warn!("reply was truncated at max_tokens");
    }
    let usage = usage_of(&resp);
    let text = resp.message.map(|message| message.content).unwrap_or_default();
    Ok((text, usage))
}

/// One JSON line of a streaming chat; the line with `done: true` ends it.
pub(crate) fn parse_stream_line(data: &str) -> Result<ChunkUpdate, LLMError> {
    let line: OllamaChatResponse = serde_json::from_str(data).map_err(|err| {
        LLMError::provider(PROVIDER_ID, format!("failed to parse stream line: {err}"))
    })?;
    if let Some(error) = line.error {
        return Err(LLMError::provider(PROVIDER_ID, error));
    }
    Ok(ChunkUpdate {
        usage: usage_of(&line),
        done: line.done,
        text: line.message.map(|message| message.content),
    })
}

pub(crate) fn local_model_names(tags: OllamaTagsResponse) -> Vec<String> {
    tags.models.into_iter().map(|model| model.name).collect()
}

/// `name:tag` for every tag of every catalog entry.
pub(crate) fn catalog_model_names(catalog: CatalogResponse) -> Vec<String> {
    catalog
        .models
        .into_iter()
        .flat_map(|entry| {
            let name = entry.name;
            entry
                .tags
                .into_iter()
                .map(move |tag| format!("{name}:{tag}"))
        })
        .collect()
}

/// `llama3` matches an installed `llama3:latest`.
pub(crate) fn is_installed(installed: &[String], model: &str) -> bool {
    installed.iter().any(|name| {
        name == model || (!model.contains(':') && name.strip_suffix(":latest") == Some(model))
    })
}
