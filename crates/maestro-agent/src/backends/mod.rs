/// Anthropic.
pub mod claude;
/// Offline echo.
pub mod echo;
/// OpenAI-compatible providers.
pub mod openai;

use async_trait::async_trait;
use maestro_core::MaestroResult;
use std::sync::Arc;

/// Trait for the text-generation collaborator.
///
/// Each provider (Claude, OpenAI, Groq, Echo, etc.) implements this trait
/// to handle API communication. Callers treat it as a black box that may
/// fail or return malformed text, and define their own fallback.
///
/// To add a new provider:
/// 1. Create a new module in `backends/`
/// 2. Implement `InferenceBackend` for your struct
/// 3. Add the variant to `LlmProvider` enum in `config.rs`
/// 4. Wire it up in `InferenceClient::new()` in `client.rs`
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Single-turn completion: optional system prompt plus one user prompt.
    async fn infer(&self, system_prompt: Option<&str>, prompt: &str) -> MaestroResult<String>;
}

#[async_trait]
impl<T: InferenceBackend + ?Sized> InferenceBackend for Arc<T> {
    async fn infer(&self, system_prompt: Option<&str>, prompt: &str) -> MaestroResult<String> {
        (**self).infer(system_prompt, prompt).await
    }
}

#[async_trait]
impl<T: InferenceBackend + ?Sized> InferenceBackend for Box<T> {
    async fn infer(&self, system_prompt: Option<&str>, prompt: &str) -> MaestroResult<String> {
        (**self).infer(system_prompt, prompt).await
    }
}
