//! Maps provider identifiers to session constructors.

use std::collections::HashMap;

use crate::config::{LlmConfig, Provider};
use crate::error::LLMError;
use crate::provider::{AnthropicSession, GoogleSession, OllamaSession, OpenAiSession};
use crate::session::{ChatSession, SessionEnv};

/// Builds a session for one provider.
pub type SessionConstructor =
    fn(LlmConfig, &SessionEnv) -> Result<Box<dyn ChatSession>, LLMError>;

/// Static table from [`Provider`] to its [`SessionConstructor`].
///
/// # Examples
///
/// ```
/// use llmanager::config::Provider;
/// use llmanager::registry::SessionRegistry;
///
/// let registry = SessionRegistry::builtin();
/// assert!(registry.resolve("ollama").is_ok());
/// assert!(registry.resolve("mistral").is_err());
/// assert_eq!(registry.providers().len(), Provider::ALL.len());
/// ```
#[derive(Clone)]
pub struct SessionRegistry {
    constructors: HashMap<Provider, SessionConstructor>,
}

impl SessionRegistry {
    /// Registry with no providers.
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Registry with every built-in provider.
    pub fn builtin() -> Self {
        Self::empty()
            .register(Provider::OpenAi, OpenAiSession::boxed)
            .register(Provider::Anthropic, AnthropicSession::boxed)
            .register(Provider::Google, GoogleSession::boxed)
            .register(Provider::Ollama, OllamaSession::boxed)
    }

    pub fn register(mut self, provider: Provider, constructor: SessionConstructor) -> Self {
        self.constructors.insert(provider, constructor);
        self
    }

    /// Registered providers in registration-independent, stable order.
    pub fn providers(&self) -> Vec<Provider> {
        Provider::ALL
            .into_iter()
            .filter(|provider| self.constructors.contains_key(provider))
            .collect()
    }

    pub fn constructor(&self, provider: Provider) -> Result<SessionConstructor, LLMError> {
        self.constructors
            .get(&provider)
            .copied()
            .ok_or_else(|| LLMError::UnsupportedProvider {
                provider: provider.id().to_string(),
            })
    }

    /// Resolves a provider identifier to its variant and constructor.
    ///
    /// Pure: no session is built and nothing is read from the environment.
    ///
    /// # Errors
    ///
    /// [`LLMError::UnsupportedProvider`] naming the identifier when it is not a
    /// known provider or has no registered constructor.
    pub fn resolve(&self, id: &str) -> Result<(Provider, SessionConstructor), LLMError> {
        let provider: Provider = id.parse()?;
        let constructor =
            self.constructor(provider)
                .map_err(|_| LLMError::UnsupportedProvider {
                    provider: id.to_string(),
                })?;
        Ok((provider, constructor))
    }

    /// Constructs the session for `config.provider`.
    pub fn build(
        &self,
        config: LlmConfig,
        env: &SessionEnv,
    ) -> Result<Box<dyn ChatSession>, LLMError> {
        let constructor = self.constructor(config.provider)?;
        constructor(config, env)
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
