use crate::error::LLMError;
use crate::stream::ChunkUpdate;
use crate::types::TokenUsage;

use super::PROVIDER_ID;
use super::types::{OpenAiChatResponse, OpenAiModelList, OpenAiStreamChunk, OpenAiUsage};

pub(crate) fn convert_usage(usage: OpenAiUsage) -> TokenUsage {
    TokenUsage {
        prompt_tokens: usage.prompt_tokens,
        completion_tokens: usage.completion_tokens,
        total_tokens: usage.total_tokens,
    }
    .with_derived_total()
}

/// Text of the first choice plus usage.
pub(crate) fn extract_reply(
    resp: OpenAiChatResponse,
) -> Result<(String, Option<TokenUsage>), LLMError> {
    let usage = resp.usage.map(convert_usage);
    let choice = resp
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LLMError::provider(PROVIDER_ID, "response contained no choices"))?;
    if let Some(reason) = choice.finish_reason.as_deref() {
        if reason == "length" {
            tracing::warn!("reply was truncated at max_tokens");
        }
    }
    let message = choice
        .message
        .ok_or_else(|| LLMError::provider(PROVIDER_ID, "first choice carried no message"))?;
    match (message.content, message.refusal) {
        (Some(content), _) => Ok((content, usage)),
        (None, Some(refusal)) => Err(LLMError::provider(
            PROVIDER_ID,
            format!("model refused: {refusal}"),
        )),
        (None, None) => Ok((String::new(), usage)),
    }
}

pub(crate) fn parse_stream_chunk(data: &str) -> Result<ChunkUpdate, LLMError> {
    let chunk: OpenAiStreamChunk = serde_json::from_str(data).map_err(|err| {
        LLMError::provider(PROVIDER_ID, format!("failed to parse stream chunk: {err}"))
    })?;
    let text = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content);
    Ok(ChunkUpdate {
        text,
        usage: chunk.usage.map(convert_usage),
        done: false,
    })
}

/// Chat model identifiers only, sorted.
pub(crate) fn chat_model_ids(list: OpenAiModelList) -> Vec<String> {
    let mut ids: Vec<String> = list
        .data
        .into_iter()
        .map(|model| model.id)
        .filter(|id| id.starts_with("gpt"))
        .collect();
    ids.sort();
    ids
}
