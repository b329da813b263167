//! OpenAI Chat Completions.

mod error;
mod request;
mod response;
mod session;
mod types;

pub use session::OpenAiSession;

pub(crate) const PROVIDER_ID: &str = "openai";
pub(crate) const DEFAULT_BASE_URL: &str = "https://api.openai.com";
