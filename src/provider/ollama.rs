//! Locally hosted models through the Ollama REST API.

mod error;
mod request;
mod response;
mod session;
mod types;

pub use session::OllamaSession;

pub(crate) const PROVIDER_ID: &str = "ollama";
pub(crate) const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub(crate) const DEFAULT_PORT: u16 = 11434;
pub(crate) const HOST_ENV: &str = "OLLAMA_HOST";

/// Community-maintained index of pullable models.
pub const CATALOG_URL: &str = "https://ollama-models.zwz.workers.dev/";

/// Turns an `OLLAMA_HOST` value (`0.0.0.0`, `gpu-box:11434`,
/// `https://ollama.internal`) into a base URL.
pub(crate) fn host_to_base_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.contains("://") {
        return host.to_string();
    }
    if host.contains(':') {
        format!("http://{host}")
    } else {
        format!("http://{host}:{DEFAULT_PORT}")
    }
}
