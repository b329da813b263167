use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{LLMError, classify_status};

use super::PROVIDER_ID;

pub(crate) fn parse_openai_error(status: u16, body: &str, retry_after: Option<Duration>) -> LLMError {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<InnerError>,
    }
    #[derive(Deserialize)]
    struct InnerError {
        message: Option<String>,
        code: Option<Value>,
    }

    if let Ok(ErrorBody { error: Some(error) }) = serde_json::from_str::<ErrorBody>(body) {
        let code = error.code.as_ref().and_then(|code| match code {
            Value::String(code) => Some(code.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        });
        let mut message = error.message.unwrap_or_else(|| "unknown error".to_string());
        if let Some(code) = &code {
            message = format!("{message} ({code})");
        }
        return classify_status(PROVIDER_ID, status, message, code.as_deref(), retry_after);
    }
    classify_status(
        PROVIDER_ID,
        status,
        format!("status {status}: {body}"),
        None,
        retry_after,
    )
}
