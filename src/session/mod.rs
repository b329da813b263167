//! The unified conversational contract and the state every session shares.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{Span, info};

use crate::config::{LlmConfig, Provider};
use crate::error::LLMError;
use crate::http::DynHttpTransport;
use crate::http::reqwest::default_dyn_transport;
use crate::stream::FragmentStream;
use crate::types::{Message, Role, TokenUsage};

pub mod json_mode;
mod reply;

pub use reply::ReplyStream;

/// Stateful implementation of one provider's conversational contract.
///
/// A session exclusively owns its [`Thread`]; nothing else mutates it.
#[async_trait]
pub trait ChatSession: Send + Sync {
    fn provider(&self) -> Provider;

    /// Read-only view of the configuration the session was built with.
    fn config(&self) -> &LlmConfig;

    fn thread(&self) -> &Thread;

    /// Appends one turn. No I/O and no validation beyond the provider's role encoding.
    fn add_message_to_thread(&mut self, content: &str, role: Role);

    /// Appends a system turn using the provider's spelling of the system role.
    fn add_system_prompt(&mut self, content: &str) {
        self.add_message_to_thread(content, Role::system());
    }

    /// Logs provider-reported token counts; absent counters are logged as `unknown`.
    fn report_usage(&self, usage: Option<&TokenUsage>);

    /// Wraps a fragment stream so the assistant turn is committed once it is drained.
    fn stream_response(&mut self, fragments: FragmentStream) -> ReplyStream<'_>;

    /// Sends one user turn and returns the model's reply.
    ///
    /// # Errors
    ///
    /// Transport and vendor failures are returned as-is; callers are expected to
    /// treat them as fatal. JSON-mode parse failures never surface here.
    async fn send_message<'a>(&'a mut self, content: &str) -> Result<Reply<'a>, LLMError>;

    /// Lists model identifiers available for this provider and logs them.
    async fn list_models(&self) -> Result<Vec<String>, LLMError>;
}

/// Outcome of [`ChatSession::send_message`].
pub enum Reply<'a> {
    /// Whole reply text.
    Text(String),
    /// JSON-mode reply that parsed successfully.
    Json(Value),
    /// Lazy fragments; the thread is updated only after the stream is drained.
    Stream(ReplyStream<'a>),
}

impl Reply<'_> {
    pub fn is_stream(&self) -> bool {
        matches!(self, Reply::Stream(_))
    }

    /// Returns the reply as text, draining a stream if necessary.
    pub async fn into_text(self) -> Result<String, LLMError> {
        match self {
            Reply::Text(text) => Ok(text),
            Reply::Json(value) => Ok(value.to_string()),
            Reply::Stream(stream) => stream.collect_text().await,
        }
    }
}

impl fmt::Debug for Reply<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Reply::Json(value) => f.debug_tuple("Json").field(value).finish(),
            Reply::Stream(stream) => f.debug_tuple("Stream").field(stream).finish(),
        }
    }
}

/// Ordered, append-only list of turns owned by one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Thread {
    messages: Vec<Message>,
}

impl Thread {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub(crate) fn push(&mut self, role: Role, content: impl Into<String>) {
        self.messages.push(Message::new(role, content));
    }

    /// Records a completed assistant reply.
    pub(crate) fn commit_assistant(&mut self, role: Role, text: String) {
        self.push(role, text);
    }
}

/// Logs a usage record inside the session's span.
pub fn report_usage(span: &Span, usage: Option<&TokenUsage>) {
    fn count(value: Option<u64>) -> String {
        value.map_or_else(|| "unknown".to_string(), |value| value.to_string())
    }

    span.in_scope(|| match usage {
        Some(usage) => info!(
            "usage: prompt_tokens={} completion_tokens={} total_tokens={}",
            count(usage.prompt_tokens),
            count(usage.completion_tokens),
            count(usage.total_tokens),
        ),
        None => info!("usage: unknown"),
    });
}

pub(crate) fn session_span(config: &LlmConfig) -> Span {
    tracing::info_span!("session", provider = config.provider.id(), model = %config.model)
}

/// Source of provider credentials, read once per session construction.
pub trait SecretSource: Send + Sync {
    fn secret(&self, name: &str) -> Option<String>;
}

/// Reads secrets from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSecrets;

impl SecretSource for EnvSecrets {
    fn secret(&self, name: &str) -> Option<String> {
        std::env::var(name)
            .ok()
            .filter(|value| !value.trim().is_empty())
    }
}

impl SecretSource for HashMap<String, String> {
    fn secret(&self, name: &str) -> Option<String> {
        self.get(name).filter(|value| !value.trim().is_empty()).cloned()
    }
}

/// Collaborators handed to every session constructor.
#[derive(Clone)]
pub struct SessionEnv {
    transport: DynHttpTransport,
    secrets: Arc<dyn SecretSource>,
    base_urls: HashMap<Provider, String>,
}

impl SessionEnv {
    pub fn new(transport: DynHttpTransport, secrets: Arc<dyn SecretSource>) -> Self {
        Self {
            transport,
            secrets,
            base_urls: HashMap::new(),
        }
    }

    /// reqwest transport plus credentials from the process environment.
    pub fn from_process_env() -> Result<Self, LLMError> {
        Ok(Self::new(default_dyn_transport()?, Arc::new(EnvSecrets)))
    }

    /// Points one provider at a proxy or compatible server.
    pub fn with_base_url(mut self, provider: Provider, base_url: impl Into<String>) -> Self {
        self.base_urls.insert(provider, base_url.into());
        self
    }

    pub fn transport(&self) -> DynHttpTransport {
        self.transport.clone()
    }

    pub(crate) fn base_url(&self, provider: Provider, default: &str) -> String {
        self.base_urls
            .get(&provider)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    pub(crate) fn secret(&self, name: &str) -> Option<String> {
        self.secrets.secret(name)
    }

    /// Reads `{PROVIDER}_API_KEY`.
    ///
    /// # Errors
    ///
    /// Returns [`LLMError::MissingCredential`] naming the variable when it is unset.
    pub(crate) fn require_credential(&self, provider: Provider) -> Result<String, LLMError> {
        let env_var = provider.api_key_env();
        self.secrets
            .secret(&env_var)
            .ok_or(LLMError::MissingCredential { env_var })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_preserves_insertion_order() {
        let mut thread = Thread::new();
        thread.push(Role::system(), "be brief");
        assert_eq!(thread.len(), 1);
        thread.push(Role::user(), "hi");
        assert_eq!(thread.len(), 2);
        assert_eq!(
            thread.messages(),
            &[
                Message::new(Role::system(), "be brief"),
                Message::new(Role::user(), "hi"),
            ]
        );
    }

    #[test]
    fn commit_opens_a_new_turn_after_user() {
        let mut thread = Thread::new();
        thread.push(Role::user(), "hi");
        thread.commit_assistant(Role::assistant(), "hello".to_string());
        assert_eq!(thread.len(), 2);
        assert_eq!(thread.last(), Some(&Message::new(Role::assistant(), "hello")));
    }

    #[test]
    fn credential_lookup_names_the_variable() {
        let env = SessionEnv::new(
            default_dyn_transport().expect("transport"),
            Arc::new(HashMap::from([("OPENAI_API_KEY".to_string(), "  ".to_string())])),
        );
        match env.require_credential(Provider::OpenAi) {
            Err(LLMError::MissingCredential { env_var }) => assert_eq!(env_var, "OPENAI_API_KEY"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn base_url_override_wins() {
        let env = SessionEnv::new(
            default_dyn_transport().expect("transport"),
            Arc::new(HashMap::new()),
        )
        .with_base_url(Provider::Ollama, "http://gpu-box:11434");
        assert_eq!(
            env.base_url(Provider::Ollama, "http://localhost:11434"),
            "http://gpu-box:11434"
        );
        assert_eq!(
            env.base_url(Provider::OpenAi, "https://api.openai.com"),
            "https://api.openai.com"
        );
    }
}
