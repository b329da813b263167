use std::time::Duration;

use serde::Deserialize;

use crate::error::{LLMError, classify_status};

use super::PROVIDER_ID;

/// Parses error responses returned by the Messages API.
///
/// The error `type` doubles as the code hint (`not_found_error`,
/// `rate_limit_error`, ...).
pub(crate) fn parse_anthropic_error(
    status: u16,
    body: &str,
    retry_after: Option<Duration>,
) -> LLMError {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<InnerError>,
    }

    #[derive(Deserialize)]
    struct InnerError {
        message: Option<String>,
        r#type: Option<String>,
    }

    if let Ok(ErrorBody { error: Some(error) }) = serde_json::from_str::<ErrorBody>(body) {
        let message = error.message.unwrap_or_else(|| "unknown error".to_string());
        let status = match error.r#type.as_deref() {
            Some("not_found_error") => 404,
            Some("authentication_error") => 401,
            _ => status,
        };
        return classify_status(
            PROVIDER_ID,
            status,
            message,
            error.r#type.as_deref(),
            retry_after,
        );
    }

    classify_status(
        PROVIDER_ID,
        status,
        format!("status {status}: {body}"),
        None,
        retry_after,
    )
}
