//! Provider-agnostic chat sessions for OpenAI, Anthropic, Google Gemini and
//! Ollama, plus the terminal chat loop built on them.

pub mod chat_loop;
pub mod config;
pub mod error;
pub mod http;
pub mod provider;
pub mod registry;
pub mod session;
pub mod stream;
pub mod types;

pub use config::{LlmConfig, Provider};
pub use error::LLMError;
pub use registry::SessionRegistry;
pub use session::{ChatSession, Reply, ReplyStream, SessionEnv, Thread};
pub use types::*;
