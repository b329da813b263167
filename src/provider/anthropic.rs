//! Anthropic Messages API.

mod error;
mod request;
mod response;
mod session;
mod types;

pub use session::AnthropicSession;

pub(crate) const PROVIDER_ID: &str = "anthropic";
pub(crate) const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub(crate) const API_VERSION: &str = "2023-06-01";

/// Assistant turn appended before a JSON-mode request; the model continues it.
pub const JSON_PRIMING: &str = "Here is the JSON requested:\n{";

/// Models offered by `list_models`; the API has no listing the CLI relies on.
pub(crate) const KNOWN_MODELS: [&str; 5] = [
    "claude-3-5-haiku-latest",
    "claude-3-5-sonnet-latest",
    "claude-3-7-sonnet-latest",
    "claude-sonnet-4-0",
    "claude-opus-4-0",
];
