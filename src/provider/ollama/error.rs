use serde::Deserialize;

use crate::error::{LLMError, classify_status};

use super::PROVIDER_ID;

/// Ollama reports failures as `{"error": "..."}`.
pub(crate) fn parse_ollama_error(status: u16, body: &str) -> LLMError {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<String>,
    }

    let message = match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody { error: Some(error) }) => error,
        _ => format!("status {status}: {body}"),
    };
    classify_status(PROVIDER_ID, status, message, None, None)
}
