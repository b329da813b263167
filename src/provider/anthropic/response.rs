use crate::error::LLMError;
use crate::stream::ChunkUpdate;
use crate::types::TokenUsage;

use super::PROVIDER_ID;
use super::types::{AnthropicMessageResponse, AnthropicStreamEvent, AnthropicUsage};

pub(crate) fn convert_usage(usage: AnthropicUsage) -> TokenUsage {
    TokenUsage {
        prompt_tokens: usage.input_tokens,
        completion_tokens: usage.output_tokens,
        total_tokens: None,
    }
}

/// Concatenated text blocks plus usage.
pub(crate) fn extract_reply(resp: AnthropicMessageResponse) -> (String, Option<TokenUsage>) {
    if resp.stop_reason.as_deref() == Some("max_tokens") {
        tracing::warn!("reply was truncated at max_tokens");
    }
    let text = resp
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect::<String>();
    let usage = resp
        .usage
        .map(|usage| convert_usage(usage).with_derived_total());
    (text, usage)
}

pub(crate) fn parse_stream_event(data: &str) -> Result<ChunkUpdate, LLMError> {
    let event: AnthropicStreamEvent = serde_json::from_str(data).map_err(|err| {
        LLMError::provider(PROVIDER_ID, format!("failed to parse stream event: {err}"))
    })?;
    let update = match event {
        AnthropicStreamEvent::MessageStart { message } => ChunkUpdate {
            usage: message.usage.map(convert_usage),
            ..ChunkUpdate::default()
        },
        AnthropicStreamEvent::ContentBlockDelta { delta } => ChunkUpdate {
            text: delta.text,
            ..ChunkUpdate::default()
        },
        AnthropicStreamEvent::MessageDelta { usage } => ChunkUpdate {
            usage: usage.map(|usage| TokenUsage {
                // input counts arrive with message_start
                prompt_tokens: None,
                ..convert_usage(usage)
            }),
            ..ChunkUpdate::default()
        },
        AnthropicStreamEvent::MessageStop => ChunkUpdate::done(),
        AnthropicStreamEvent::Error { error } => {
            let kind = error.kind.unwrap_or_else(|| "error".to_string());
            let message = error.message.unwrap_or_else(|| "unknown error".to_string());
            return Err(LLMError::provider(PROVIDER_ID, format!("{kind}: {message}")));
        }
        AnthropicStreamEvent::Other => ChunkUpdate::default(),
    };
    Ok(update)
}
