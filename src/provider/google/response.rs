use crate::error::LLMError;
use crate::stream::ChunkUpdate;
use crate::types::TokenUsage;

use super::PROVIDER_ID;
use super::types::{GeminiModelPage, GeminiResponse, GeminiUsageMetadata};

pub(crate) fn convert_usage(usage: GeminiUsageMetadata) -> TokenUsage {
    TokenUsage {
        prompt_tokens: usage.prompt_token_count,
        completion_tokens: usage.candidates_token_count,
        total_tokens: usage.total_token_count,
    }
}

fn candidate_text(resp: &GeminiResponse) -> Option<String> {
    let content = resp.candidates.first()?.content.as_ref()?;
    let text: String = content
        .parts
        .iter()
        .filter_map(|part| part.text.as_deref())
        .collect();
    Some(text)
}

/// Text of the first candidate plus usage.
pub(crate) fn extract_reply(resp: GeminiResponse) -> Result<(String, Option<TokenUsage>), LLMError> {
    if resp.candidates.is_empty() {
        let reason = resp
            .prompt_feedback
            .as_ref()
            .and_then(|feedback| feedback.block_reason.clone());
        return Err(match reason {
            Some(reason) => LLMError::provider(PROVIDER_ID, format!("prompt blocked: {reason}")),
            None => LLMError::provider(PROVIDER_ID, "response contained no candidates"),
        });
    }
    if let Some(reason) = resp.candidates[0].finish_reason.as_deref() {
        if reason == "MAX_TOKENS" {
            tracing::warn!("reply was truncated at max_tokens");
        }
    }
    let text = candidate_text(&resp).unwrap_or_default();
    Ok((text, resp.usage_metadata.map(convert_usage)))
}

pub(crate) fn parse_stream_chunk(data: &str) -> Result<ChunkUpdate, LLMError> {
    let chunk: GeminiResponse = serde_json::from_str(data).map_err(|err| {
        LLMError::provider(PROVIDER_ID, format!("failed to parse stream chunk: {err}"))
    })?;
    if let Some(error) = chunk.error {
        let message = error.message.unwrap_or_else(|| "unknown error".to_string());
        return Err(LLMError::provider(
            PROVIDER_ID,
            match error.status {
                Some(status) => format!("stream aborted ({status}): {message}"),
                None => format!("stream aborted: {message}"),
            },
        ));
    }
    Ok(ChunkUpdate {
        text: candidate_text(&chunk),
        usage: chunk.usage_metadata.map(convert_usage),
        done: false,
    })
}

/// Identifiers of one listing page that can generate content, without the
/// `models/` prefix.
pub(crate) fn generative_model_ids(page: GeminiModelPage) -> Vec<String> {
    page.models
        .into_iter()
        .filter(|model| {
            model
                .supported_generation_methods
                .iter()
                .any(|method| method == "generateContent")
        })
        .map(|model| {
            model
                .name
                .strip_prefix("models/")
                .map(str::to_string)
                .unwrap_or(model.name)
        })
        .collect()
}
