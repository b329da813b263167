//! Shared data structures for conversation turns and usage accounting.
//!
//! Providers translate these into their own wire formats; the rest of the crate
//! stays agnostic of per-vendor role spellings and payload shapes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Role string of a turn.
///
/// Kept as a string so provider-specific spellings (Gemini's `model`) can be
/// stored without a lossy mapping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(pub String);

impl Role {
    pub fn system() -> Self {
        Self("system".to_string())
    }

    pub fn user() -> Self {
        Self("user".to_string())
    }

    pub fn assistant() -> Self {
        Self("assistant".to_string())
    }

    /// Gemini's spelling of the assistant role.
    pub fn model() -> Self {
        Self("model".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` for every spelling of the model's own turns.
    pub fn is_assistant(&self) -> bool {
        matches!(self.0.as_str(), "assistant" | "model")
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One turn of a conversation.
///
/// # Examples
///
/// ```
/// use llmanager::types::{Message, Role};
///
/// let msg = Message::new(Role::user(), "hi");
/// assert_eq!(msg.role, Role::user());
/// assert_eq!(msg.content, "hi");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Provider-reported token counters, normalized.
///
/// Every counter is optional: vendors omit fields, and streams may never
/// report usage at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

impl TokenUsage {
    /// Fills `total_tokens` from the two parts when the provider left it out.
    pub fn with_derived_total(mut self) -> Self {
        if self.total_tokens.is_none() {
            if let (Some(prompt), Some(completion)) = (self.prompt_tokens, self.completion_tokens) {
                self.total_tokens = Some(prompt + completion);
            }
        }
        self
    }

    /// Merges counters reported in several stream events; later values win.
    pub fn merge(&mut self, other: TokenUsage) {
        self.prompt_tokens = other.prompt_tokens.or(self.prompt_tokens);
        self.completion_tokens = other.completion_tokens.or(self.completion_tokens);
        self.total_tokens = other.total_tokens.or(self.total_tokens);
    }
}
