//! Google Gemini `generateContent`.

mod error;
mod request;
mod response;
mod session;
mod types;

pub use session::GoogleSession;

pub(crate) const PROVIDER_ID: &str = "google";
pub(crate) const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub(crate) const API_VERSION: &str = "v1beta";
