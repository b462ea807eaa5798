//! Explicit configuration objects, built once at startup and passed into
//! constructors. Nothing in this crate reads the process environment.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Default bound on a single model call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Engine behavior knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Model identifier passed to the client on every call.
    pub model: String,
    /// Upper bound on one model call. Expiry surfaces as `ModelUnavailable`.
    pub timeout: Duration,
    /// Replaces the opening paragraph of the system prompt. The response
    /// format rules are always appended.
    pub preamble: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            preamble: None,
        }
    }
}

/// Which model API a client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    OpenAi,
    Anthropic,
    /// No network: answers are derived from the prompt itself.
    Offline,
}

impl Provider {
    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            Provider::OpenAi => Some("https://api.openai.com"),
            Provider::Anthropic => Some("https://api.anthropic.com"),
            Provider::Offline => None,
        }
    }

    /// Environment variable conventionally holding this provider's key,
    /// or `None` when the provider needs no key. Only startup code should
    /// consult it.
    pub fn api_key_var(&self) -> Option<&'static str> {
        match self {
            Provider::OpenAi => Some("OPENAI_API_KEY"),
            Provider::Anthropic => Some("ANTHROPIC_API_KEY"),
            Provider::Offline => None,
        }
    }
}

/// Connection settings for the HTTP model clients.
#[derive(Clone, PartialEq)]
pub struct ModelConfig {
    pub provider: Provider,
    pub api_key: String,
    /// Overrides the provider's default base URL (proxies, test servers).
    pub base_url: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Transport-level timeout for one HTTP request.
    pub timeout: Duration,
}

impl ModelConfig {
    pub fn new(provider: Provider, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            base_url: None,
            max_tokens: 500,
            temperature: 0.7,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .or(self.provider.default_base_url())
            .unwrap_or_default()
            .trim_end_matches('/')
    }
}

// Keeps the key out of logs.
impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("provider", &self.provider)
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url())
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_defaults_per_provider() {
        let mut config = ModelConfig::new(Provider::Anthropic, "k");
        assert_eq!(config.base_url(), "https://api.anthropic.com");
        config.base_url = Some("http://localhost:8089/".to_string());
        assert_eq!(config.base_url(), "http://localhost:8089");
    }

    #[test]
    fn debug_redacts_key() {
        let config = ModelConfig::new(Provider::OpenAi, "sk-secret");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn provider_parses_lowercase() {
        let p: Provider = serde_json::from_str("\"anthropic\"").unwrap();
        assert_eq!(p, Provider::Anthropic);
        assert_eq!(Provider::OpenAi.api_key_var(), Some("OPENAI_API_KEY"));
        let p: Provider = serde_json::from_str("\"offline\"").unwrap();
        assert_eq!(p, Provider::Offline);
        assert_eq!(p.api_key_var(), None);
        assert_eq!(ModelConfig::new(p, "").base_url(), "");
    }
}
