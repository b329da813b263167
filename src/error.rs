use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Aggregates every failure mode exposed by the library.
///
/// Construction-time variants (`InvalidConfig`, `ConfigFile`, `MissingCredential`,
/// `UnsupportedProvider`) are terminal for the interactive tool; generation-time
/// variants surface transport or vendor failures for a single turn.
#[derive(Debug, Error)]
pub enum LLMError {
    /// Represents transport-layer or networking failures.
    #[error("transport error: {message}")]
    Transport { message: String },
    /// Reports credentials rejected by the provider.
    #[error("auth failure: {message}")]
    Auth { message: String },
    /// Indicates that the provider throttled the request.
    #[error("rate limited: {message}")]
    RateLimit {
        /// Raw message returned by the upstream provider.
        message: String,
        /// Optional wait duration suggested by the provider.
        retry_after: Option<Duration>,
    },
    /// Indicates that the thread or expected completion exceeds the model window.
    #[error("token limit exceeded: {message}")]
    TokenLimitExceeded { message: String },
    /// Signals validation failures in the request payload.
    #[error("invalid request: {message}")]
    Validation { message: String },
    /// Indicates that the requested model could not be resolved.
    #[error("model not found: {message}")]
    ModelNotFound {
        /// Model identifier extracted from the error payload when available.
        model: Option<String>,
        /// Full error message returned by the provider.
        message: String,
    },
    /// Raised when a configuration value is missing, unknown or malformed.
    #[error("invalid configuration for {field}: {reason}")]
    InvalidConfig {
        /// Name of the configuration field that failed validation.
        field: String,
        /// Additional context explaining why the field is invalid.
        reason: String,
    },
    /// Raised when the configuration file cannot be read or is not JSON.
    #[error("failed to load config file {}: {message}", path.display())]
    ConfigFile { path: PathBuf, message: String },
    /// The credential environment variable of a remote provider is absent.
    #[error("{env_var} environment variable should be set (or provided in the '.env' file)")]
    MissingCredential { env_var: String },
    /// No session implementation is registered for the requested identifier.
    #[error("unsupported provider: {provider}")]
    UnsupportedProvider { provider: String },
    /// Signals that a stream failed before the provider reported its end.
    #[error("stream closed unexpectedly: {message}")]
    StreamClosed { message: String },
    /// Reading the user's input or writing a reply to the terminal failed.
    #[error("terminal I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Wraps provider-defined errors that cannot be normalized.
    #[error("provider {provider} error: {message}")]
    Provider {
        /// Identifier of the provider, such as `openai`.
        provider: &'static str,
        /// Human-readable error message returned by the provider.
        message: String,
    },
}

impl LLMError {
    /// Creates an [`LLMError::Transport`] from a textual description.
    ///
    /// # Examples
    ///
    /// ```
    /// use llmanager::error::LLMError;
    ///
    /// let err = LLMError::transport("dns lookup failed");
    /// assert!(matches!(err, LLMError::Transport { .. }));
    /// ```
    pub fn transport<T: Into<String>>(message: T) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates an [`LLMError::Provider`] with the given provider id and message.
    ///
    /// # Examples
    ///
    /// ```
    /// use llmanager::error::LLMError;
    ///
    /// let err = LLMError::provider("openai", "bad JSON payload");
    /// assert!(matches!(err, LLMError::Provider { provider: "openai", .. }));
    /// ```
    pub fn provider<T: Into<String>>(provider: &'static str, message: T) -> Self {
        Self::Provider {
            provider,
            message: message.into(),
        }
    }

    pub(crate) fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Maps a non-2xx status plus the vendor's extracted message onto the taxonomy.
///
/// `code_hint` carries the vendor error code or status string when the body has one.
pub(crate) fn classify_status(
    provider: &'static str,
    status: u16,
    message: String,
    code_hint: Option<&str>,
    retry_after: Option<Duration>,
) -> LLMError {
    if looks_like_token_limit_error(code_hint, &message) {
        return LLMError::TokenLimitExceeded { message };
    }
    match status {
        401 | 403 => LLMError::Auth { message },
        404 => LLMError::ModelNotFound {
            model: extract_model_identifier(&message),
            message,
        },
        429 => LLMError::RateLimit {
            message,
            retry_after,
        },
        400 | 422 => LLMError::Validation { message },
        _ => LLMError::Provider { provider, message },
    }
}

/// Returns `true` when an error code or message suggests a context/window overflow.
pub(crate) fn looks_like_token_limit_error(code_hint: Option<&str>, message: &str) -> bool {
    if let Some(code) = code_hint {
        let lower = code.to_ascii_lowercase();
        if matches!(
            lower.as_str(),
            "context_length_exceeded"
                | "max_context_length_exceeded"
                | "prompt_tokens_exceeded"
                | "context_window_exceeded"
        ) {
            return true;
        }
    }

    let lower_message = message.to_ascii_lowercase();
    const HINTS: [&str; 5] = [
        "context length",
        "context window",
        "token limit",
        "maximum context",
        "prompt is too long",
    ];
    HINTS.iter().any(|needle| lower_message.contains(needle))
}

/// Attempts to extract a model identifier from an error payload.
pub(crate) fn extract_model_identifier(message: &str) -> Option<String> {
    for delimiter in ['`', '"', '\''] {
        if let Some(value) = between_delimiters(message, delimiter) {
            if !value.trim().is_empty() {
                return Some(value.trim().to_string());
            }
        }
    }
    None
}

fn between_delimiters(message: &str, delimiter: char) -> Option<&str> {
    let start = message.find(delimiter)? + delimiter.len_utf8();
    let rest = &message[start..];
    let end = rest.find(delimiter)?;
    Some(&rest[..end])
}
