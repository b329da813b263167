use std::time::Duration;

use serde::Deserialize;

use crate::error::{LLMError, classify_status};

use super::PROVIDER_ID;

/// Parses `{"error": {"code", "message", "status"}}` bodies.
///
/// An invalid key comes back as 400 `INVALID_ARGUMENT`; it is reported as an
/// auth failure.
pub(crate) fn parse_gemini_error(status: u16, body: &str, retry_after: Option<Duration>) -> LLMError {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<InnerError>,
    }

    #[derive(Deserialize)]
    struct InnerError {
        message: Option<String>,
        status: Option<String>,
    }

    if let Ok(ErrorBody { error: Some(error) }) = serde_json::from_str::<ErrorBody>(body) {
        let message = error.message.unwrap_or_else(|| "unknown error".to_string());
        let effective = match error.status.as_deref() {
            Some("UNAUTHENTICATED" | "PERMISSION_DENIED") => 401,
            Some("NOT_FOUND") => 404,
            Some("RESOURCE_EXHAUSTED") => 429,
            Some("INVALID_ARGUMENT") if message.contains("API key") => 401,
            _ => status,
        };
        return classify_status(
            PROVIDER_ID,
            effective,
            message,
            error.status.as_deref(),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_key_is_an_auth_error() {
        let body = r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#;
        assert!(matches!(
            parse_gemini_error(400, body, None),
            LLMError::Auth { .. }
        ));
    }

    #[test]
    fn quota_exhaustion_is_a_rate_limit() {
        let body = r#"{"error":{"code":429,"message":"Resource has been exhausted","status":"RESOURCE_EXHAUSTED"}}"#;
        assert!(matches!(
            parse_gemini_error(429, body, None),
            LLMError::RateLimit { .. }
        ));
    }

    #[test]
    fn unknown_model_is_model_not_found() {
        let body = r#"{"error":{"code":404,"message":"models/gemini-9 is not found for API version v1beta","status":"NOT_FOUND"}}"#;
        assert!(matches!(
            parse_gemini_error(404, body, None),
            LLMError::ModelNotFound { .. }
        ));
    }
}
