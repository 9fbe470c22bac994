use super::InferenceBackend;
use crate::config::{LlmProvider, ModelConfig};
use async_trait::async_trait;
use maestro_core::{MaestroError, MaestroResult};

/// Chat-completions backend shared by OpenAI, OpenRouter and Groq.
pub struct OpenAiBackend {
    config: ModelConfig,
    http: reqwest::Client,
}

impl OpenAiBackend {
    /// Backend for `config` with a fresh HTTP client.
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn build_messages(&self, system_prompt: Option<&str>, prompt: &str) -> Vec<serde_json::Value> {
        let mut api_messages: Vec<serde_json::Value> = Vec::new();

        if let Some(sys) = system_prompt {
            api_messages.push(serde_json::json!({
                "role": "system",
                "content": sys
            }));
        }

        api_messages.push(serde_json::json!({
            "role": "user",
            "content": prompt
        }));

        api_messages
    }

    fn add_provider_headers(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json");

        // OpenRouter requires extra headers
        if matches!(self.config.provider, LlmProvider::OpenRouter) {
            request.header("X-Title", "Maestro")
        } else {
            request
        }
    }
}

#[async_trait]
impl InferenceBackend for OpenAiBackend {
    async fn infer(&self, system_prompt: Option<&str>, prompt: &str) -> MaestroResult<String> {
        let url = format!("{}/v1/chat/completions", self.config.base_url());

        let body = serde_json::json!({
            "model": self.config.model_id,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "messages": self.build_messages(system_prompt, prompt),
        });

        let request = self.add_provider_headers(self.http.post(&url));

        let resp = request
            .json(&body)
            .send()
            .await
            .map_err(|e| MaestroError::Http(e.to_string()))?;

        let status = resp.status();
        let resp_body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| MaestroError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(MaestroError::Http(format!(
                "OpenAI API error {status}: {resp_body}"
            )));
        }

        parse_openai_response(&resp_body)
    }
}

/// Extract the first choice's message content.
pub fn parse_openai_response(body: &serde_json::Value) -> MaestroResult<String> {
    body["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| MaestroError::Inference("Missing content in OpenAI response".into()))
}
