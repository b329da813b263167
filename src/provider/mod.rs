//! Vendor adapters. Each submodule speaks one wire protocol and exposes a
//! [`ChatSession`](crate::session::ChatSession) implementation.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::Span;

use crate::config::LlmConfig;
use crate::error::LLMError;

pub mod anthropic;
pub mod google;
pub mod ollama;
pub mod openai;

pub use anthropic::AnthropicSession;
pub use google::GoogleSession;
pub use ollama::OllamaSession;
pub use openai::OpenAiSession;

/// Logs the outgoing body when the session was configured as verbose.
pub(crate) fn log_request_body(config: &LlmConfig, span: &Span, body: &Value) {
    if config.verbose {
        span.in_scope(|| tracing::debug!(body = %body, "request body"));
    }
}

pub(crate) fn parse_body<T: DeserializeOwned>(
    provider: &'static str,
    text: &str,
) -> Result<T, LLMError> {
    serde_json::from_str(text).map_err(|err| {
        LLMError::provider(provider, format!("failed to parse {provider} response: {err}"))
    })
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Logs a model listing one identifier per line, as the CLI presents it.
pub(crate) fn log_models(span: &Span, heading: &str, models: &[String]) {
    span.in_scope(|| {
        tracing::info!("{heading}");
        for model in models {
            tracing::info!("  {model}");
        }
    });
}
