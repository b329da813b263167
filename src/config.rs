use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::LLMError;

/// Closed set of supported providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Anthropic,
    Google,
    Ollama,
}

impl Provider {
    /// Every variant, in registration order.
    pub const ALL: [Provider; 4] = [
        Provider::OpenAi,
        Provider::Anthropic,
        Provider::Google,
        Provider::Ollama,
    ];

    /// Lowercase identifier used on the command line and in config file names.
    pub fn id(self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Google => "google",
            Provider::Ollama => "ollama",
        }
    }

    /// Human-facing name, used in the chat loop banner and reply prefix.
    pub fn display_name(self) -> &'static str {
        match self {
            Provider::OpenAi => "OpenAI",
            Provider::Anthropic => "Anthropic",
            Provider::Google => "Google",
            Provider::Ollama => "Ollama",
        }
    }

    /// Name of the credential variable, `{PROVIDER}_API_KEY`.
    ///
    /// # Examples
    ///
    /// ```
    /// use llmanager::config::Provider;
    ///
    /// assert_eq!(Provider::Anthropic.api_key_env(), "ANTHROPIC_API_KEY");
    /// ```
    pub fn api_key_env(self) -> String {
        format!("{}_API_KEY", self.id().to_ascii_uppercase())
    }

    /// Only the locally-hosted provider runs without a remote credential.
    pub fn requires_credential(self) -> bool {
        !matches!(self, Provider::Ollama)
    }

    /// Identifiers of every variant, for help texts.
    pub fn list_all() -> Vec<&'static str> {
        Self::ALL.iter().map(|provider| provider.id()).collect()
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Provider {
    type Err = LLMError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim();
        Self::ALL
            .into_iter()
            .find(|provider| provider.id().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| LLMError::UnsupportedProvider {
                provider: value.to_string(),
            })
    }
}

pub const DEFAULT_MAX_TOKENS: u32 = 3000;
pub const DEFAULT_TEMPERATURE: f64 = 1.0;
pub const DEFAULT_TOP_P: f64 = 1.0;

/// Generation parameters shared read-only with a session.
///
/// Built once at startup from a provider-specific JSON file plus the provider
/// chosen on the command line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LlmConfig {
    pub provider: Provider,
    /// Model identifier passed verbatim to the provider.
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    /// Nucleus sampling probability.
    pub top_p: f64,
    pub seed: Option<i64>,
    pub json_mode: bool,
    pub stream: bool,
    pub verbose: bool,
}

impl LlmConfig {
    /// Creates a configuration with every optional parameter at its default.
    pub fn new(provider: Provider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
            seed: None,
            json_mode: false,
            stream: false,
            verbose: false,
        }
    }

    /// Default location of the config file for `provider`.
    pub fn default_path(provider: Provider) -> PathBuf {
        PathBuf::from(format!("configs/{}_config.json", provider.id()))
    }

    /// Reads and validates a config file.
    ///
    /// # Errors
    ///
    /// Returns [`LLMError::ConfigFile`] when the file cannot be read or parsed and
    /// [`LLMError::InvalidConfig`] naming the offending field otherwise.
    pub fn from_json_file(provider: Provider, path: impl AsRef<Path>) -> Result<Self, LLMError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|err| LLMError::ConfigFile {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        let value: Value = serde_json::from_str(&text).map_err(|err| LLMError::ConfigFile {
            path: path.to_path_buf(),
            message: format!("invalid JSON: {err}"),
        })?;
        Self::from_json_value(provider, value)
    }

    /// Validates an in-memory JSON document.
    ///
    /// # Examples
    ///
    /// ```
    /// use llmanager::config::{LlmConfig, Provider};
    ///
    /// let config = LlmConfig::from_json_str(Provider::OpenAi, r#"{"model":"m","temperature":0.2}"#).unwrap();
    /// assert_eq!(config.max_tokens, 3000);
    /// assert_eq!(config.temperature, 0.2);
    /// ```
    pub fn from_json_str(provider: Provider, text: &str) -> Result<Self, LLMError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|err| LLMError::invalid_config("<root>", format!("invalid JSON: {err}")))?;
        Self::from_json_value(provider, value)
    }

    pub fn from_json_value(provider: Provider, value: Value) -> Result<Self, LLMError> {
        validate_document(&value)?;
        let file: ConfigFile = serde_json::from_value(value)
            .map_err(|err| LLMError::invalid_config("<root>", err.to_string()))?;
        let config = Self {
            provider,
            model: file.model,
            max_tokens: file.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: file.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            top_p: file.top_p.unwrap_or(DEFAULT_TOP_P),
            seed: file.seed,
            json_mode: file.json_mode,
            stream: file.stream,
            verbose: file.verbose,
        };
        config.check_ranges()?;
        Ok(config)
    }

    fn check_ranges(&self) -> Result<(), LLMError> {
        if self.model.trim().is_empty() {
            return Err(LLMError::invalid_config("model", "must not be empty"));
        }
        if self.max_tokens == 0 {
            return Err(LLMError::invalid_config("max_tokens", "must be positive"));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(LLMError::invalid_config(
                "temperature",
                "must be between 0.0 and 2.0",
            ));
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(LLMError::invalid_config("top_p", "must be between 0.0 and 1.0"));
        }
        Ok(())
    }
}

/// On-disk shape of a provider config file; `provider` is supplied separately.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    model: String,
    #[serde(default)]
    max_tokens: Option<u32>,
    #[serde(default)]
    temperature: Option<f64>,
    #[serde(default)]
    top_p: Option<f64>,
    #[serde(default)]
    seed: Option<i64>,
    #[serde(default)]
    json_mode: bool,
    #[serde(default)]
    stream: bool,
    #[serde(default)]
    verbose: bool,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Text,
    Integer,
    Number,
    Flag,
}

const FIELDS: [(&str, FieldKind, bool); 8] = [
    ("model", FieldKind::Text, false),
    ("max_tokens", FieldKind::Integer, true),
    ("temperature", FieldKind::Number, true),
    ("top_p", FieldKind::Number, true),
    ("seed", FieldKind::Integer, true),
    ("json_mode", FieldKind::Flag, false),
    ("stream", FieldKind::Flag, false),
    ("verbose", FieldKind::Flag, false),
];

/// Schema check run before typed deserialization so errors can name the field.
fn validate_document(value: &Value) -> Result<(), LLMError> {
    let object = value
        .as_object()
        .ok_or_else(|| LLMError::invalid_config("<root>", "expected a JSON object"))?;

    for key in object.keys() {
        if key == "provider" {
            return Err(LLMError::invalid_config(
                key,
                "the provider is selected on the command line, not in the config file",
            ));
        }
        if !FIELDS.iter().any(|(name, _, _)| name == key) {
            return Err(LLMError::invalid_config(
                key,
                "additional properties are not allowed",
            ));
        }
    }

    if !object.contains_key("model") {
        return Err(LLMError::invalid_config("model", "field required"));
    }

    for (name, kind, nullable) in FIELDS {
        let Some(field) = object.get(name) else {
            continue;
        };
        if field.is_null() && nullable {
            continue;
        }
        if kind == FieldKind::Integer && field.is_u64() && !field.is_i64() {
            return Err(LLMError::invalid_config(
                name,
                format!("{field} is out of range for a 64-bit signed integer"),
            ));
        }
        let ok = match kind {
            FieldKind::Text => field.is_string(),
            FieldKind::Integer => field.is_i64(),
            FieldKind::Number => field.is_number(),
            FieldKind::Flag => field.is_boolean(),
        };
        if !ok {
            let expected = match kind {
                FieldKind::Text => "a string",
                FieldKind::Integer => "an integer",
                FieldKind::Number => "a number",
                FieldKind::Flag => "a boolean",
            };
            return Err(LLMError::invalid_config(
                name,
                format!("expected {expected}, got {field}"),
            ));
        }
    }

    if let Some(max_tokens) = object.get("max_tokens").and_then(Value::as_i64) {
        if max_tokens <= 0 || max_tokens > i64::from(u32::MAX) {
            return Err(LLMError::invalid_config("max_tokens", "must be positive"));
        }
    }

    Ok(())
}
