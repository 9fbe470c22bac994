use crate::backends::claude::ClaudeBackend;
use crate::backends::echo::EchoBackend;
use crate::backends::openai::OpenAiBackend;
use crate::backends::InferenceBackend;
use crate::config::{LlmProvider, ModelConfig};
use crate::failover::FailoverBackend;
use async_trait::async_trait;
use maestro_core::{MaestroError, MaestroResult};

/// Inference client that dispatches to the configured provider backend.
///
/// When `fallback_models` or a `retry_policy` is configured, the primary and
/// fallback backends are wrapped in a [`FailoverBackend`].
pub struct InferenceClient {
    backend: Box<dyn InferenceBackend>,
}

impl InferenceClient {
    /// Build the backend chain for `config`.
    ///
    /// Fails when a provider that needs an API key has none.
    pub fn new(config: ModelConfig) -> MaestroResult<Self> {
        if config.requires_api_key() && config.api_key.is_empty() {
            return Err(MaestroError::Config(format!(
                "model '{}' requires an api_key",
                config.model_id
            )));
        }

        if config.fallback_models.is_empty() && config.retry_policy.is_none() {
            return Ok(Self {
                backend: backend_for(config),
            });
        }

        let policy = config.retry_policy.clone().unwrap_or_default();
        let mut chain = vec![backend_for(config.clone())];
        for fallback in config.fallback_models {
            chain.push(backend_for(fallback));
        }
        Ok(Self {
            backend: Box::new(FailoverBackend::new(chain, policy)?),
        })
    }

    /// Create from a pre-built backend (for custom/external providers).
    pub fn from_backend(backend: Box<dyn InferenceBackend>) -> Self {
        Self { backend }
    }
}

fn backend_for(config: ModelConfig) -> Box<dyn InferenceBackend> {
    match config.provider {
        LlmProvider::Claude => Box::new(ClaudeBackend::new(config)),
        LlmProvider::OpenAi | LlmProvider::OpenRouter | LlmProvider::Groq => {
            Box::new(OpenAiBackend::new(config))
        }
        LlmProvider::Echo => Box::new(EchoBackend::new(config.model_id)),
    }
}

#[async_trait]
impl InferenceBackend for InferenceClient {
    async fn infer(&self, system_prompt: Option<&str>, prompt: &str) -> MaestroResult<String> {
        self.backend.infer(system_prompt, prompt).await
    }
}
