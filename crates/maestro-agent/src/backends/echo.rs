use super::InferenceBackend;
use async_trait::async_trait;
use maestro_core::MaestroResult;

const MAX_ECHO_CHARS: usize = 160;

/// Deterministic offline backend.
///
/// Answers with the first non-empty line of the prompt, stripped of JSON
/// brackets. It never produces JSON, so every structured call site takes its
/// fallback path.
#[derive(Debug, Default, Clone)]
pub struct EchoBackend {
    label: String,
}

impl EchoBackend {
    /// Echo backend tagging its replies with `label`.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

#[async_trait]
impl InferenceBackend for EchoBackend {
    async fn infer(&self, _system_prompt: Option<&str>, prompt: &str) -> MaestroResult<String> {
        let line = prompt
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or_default();
        let cleaned: String = line
            .chars()
            .filter(|c| !matches!(c, '{' | '}' | '[' | ']'))
            .take(MAX_ECHO_CHARS)
            .collect();
        if self.label.is_empty() {
            Ok(format!("Echo: {cleaned}"))
        } else {
            Ok(format!("Echo ({}): {cleaned}", self.label))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echo_first_line_without_brackets() {
        let backend = EchoBackend::default();
        let out = backend
            .infer(None, "\n   Task: {build} [it]\nsecond line")
            .await
            .unwrap();
        assert_eq!(out, "Echo: Task: build it");
    }

    #[tokio::test]
    async fn test_echo_is_deterministic() {
        let backend = EchoBackend::new("demo");
        let a = backend.infer(Some("sys"), "same").await.unwrap();
        let b = backend.infer(None, "same").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a, "Echo (demo): same");
    }
}
