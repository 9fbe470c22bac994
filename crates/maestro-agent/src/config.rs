use crate::failover::RetryPolicy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Inference provider behind a [`ModelConfig`].
pub enum LlmProvider {
    /// Anthropic messages API.
    Claude,
    /// OpenAI chat completions.
    OpenAi,
    /// OpenRouter, OpenAI-compatible.
    OpenRouter,
    /// Groq cloud inference, OpenAI-compatible API, free tier with rate limits.
    Groq,
    /// Offline deterministic backend. No network, no API key.
    Echo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// One model endpoint plus its optional fallback chain.
pub struct ModelConfig {
    /// Provider the request goes to.
    pub provider: LlmProvider,
    /// Provider-specific model name.
    pub model_id: String,
    #[serde(default)]
    /// Empty for providers that need no key.
    pub api_key: String,
    /// Overrides the provider's default endpoint.
    pub api_base_url: Option<String>,
    #[serde(default = "default_temperature")]
    /// Sampling temperature.
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    /// Completion token limit.
    pub max_tokens: u32,
    #[serde(default)]
    /// Tried in order once this model gives up.
    pub fallback_models: Vec<ModelConfig>,
    #[serde(default)]
    /// Retry budget per backend; defaults apply when fallbacks are set.
    pub retry_policy: Option<RetryPolicy>,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    2000
}

impl ModelConfig {
    /// Model with default sampling settings and no fallbacks.
    pub fn new(
        provider: LlmProvider,
        model_id: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            model_id: model_id.into(),
            api_key: api_key.into(),
            api_base_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            fallback_models: Vec::new(),
            retry_policy: None,
        }
    }

    /// Offline configuration used when no model section is given.
    pub fn echo() -> Self {
        Self::new(LlmProvider::Echo, "echo", "")
    }

    /// Point the provider at a custom endpoint.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    /// Configured endpoint, or the provider default.
    pub fn base_url(&self) -> &str {
        if let Some(url) = &self.api_base_url {
            url
        } else {
            match self.provider {
                LlmProvider::Claude => "https://api.anthropic.com",
                LlmProvider::OpenAi => "https://api.openai.com",
                LlmProvider::OpenRouter => "https://openrouter.ai/api",
                LlmProvider::Groq => "https://api.groq.com/openai",
                LlmProvider::Echo => "local://echo",
            }
        }
    }

    /// Whether requests need an API key.
    pub fn requires_api_key(&self) -> bool {
        !matches!(self.provider, LlmProvider::Echo)
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::echo()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_toml() {
        let config: ModelConfig = toml::from_str(
            r#"
            provider = "groq"
            model_id = "llama-3.3-70b-versatile"
            "#,
        )
        .unwrap();
        assert_eq!(config.provider, LlmProvider::Groq);
        assert_eq!(config.max_tokens, 2000);
        assert!(config.api_key.is_empty());
        assert_eq!(config.base_url(), "https://api.groq.com/openai");
    }

    #[test]
    fn test_base_url_override() {
        let config = ModelConfig::new(LlmProvider::OpenAi, "gpt-4o-mini", "k")
            .with_base_url("http://localhost:9999");
        assert_eq!(config.base_url(), "http://localhost:9999");
    }

    #[test]
    fn test_echo_needs_no_key() {
        assert!(!ModelConfig::echo().requires_api_key());
        assert!(ModelConfig::new(LlmProvider::Claude, "m", "").requires_api_key());
    }
}
