use crate::prompts::{self, ORCHESTRATOR_SYSTEM_PROMPT};
use maestro_agent::InferenceBackend;
use maestro_core::{MaestroError, MaestroResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

const FALLBACK_CONFIDENCE: f64 = 0.5;

/// Merged answer for a set of competing results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictResolution {
    /// Disagreements the resolver found.
    pub conflicts_identified: Vec<String>,
    /// Merged answer.
    pub resolution: Value,
    /// In `[0, 1]`.
    pub confidence: f64,
    /// Why the resolver settled on `resolution`.
    pub reasoning: String,
    /// `confidence` reached the consensus threshold.
    pub accepted: bool,
}

/// Task context handed to the resolver.
#[derive(Debug, Clone, Copy)]
pub struct ConflictContext<'a> {
    /// Task title.
    pub title: &'a str,
    /// Task description.
    pub description: &'a str,
}

/// Ask inference to reconcile `candidates`.
///
/// Falls back to the first candidate (or `{}`) at confidence 0.5 when the
/// model fails or answers in the wrong shape.
pub async fn resolve(
    inference: &dyn InferenceBackend,
    context: ConflictContext<'_>,
    candidates: &[Value],
    consensus_threshold: f64,
) -> ConflictResolution {
    let prompt = prompts::conflict_resolution(context.title, context.description, candidates);
    let parsed = match inference
        .infer(Some(ORCHESTRATOR_SYSTEM_PROMPT), &prompt)
        .await
    {
        Ok(reply) => parse_resolution(&reply),
        Err(e) => Err(e),
    };

    let mut resolution = match parsed {
        Ok(resolution) => {
            info!(
                candidates = candidates.len(),
                confidence = resolution.confidence,
                "Conflict resolved"
            );
            resolution
        }
        Err(e) => {
            warn!(error = %e, "Conflict resolution failed, using first candidate");
            fallback(candidates, &e)
        }
    };
    resolution.accepted = resolution.confidence >= consensus_threshold;
    resolution
}

fn parse_resolution(reply: &str) -> MaestroResult<ConflictResolution> {
    let value = prompts::extract_json(reply)
        .ok_or_else(|| MaestroError::Inference("resolution is not JSON".into()))?;
    let object = value
        .as_object()
        .ok_or_else(|| MaestroError::Inference("resolution is not a JSON object".into()))?;

    let resolution = object
        .get("resolution")
        .cloned()
        .ok_or_else(|| MaestroError::Inference("resolution field missing".into()))?;
    let confidence = object
        .get("confidence_score")
        .and_then(Value::as_f64)
        .filter(|c| (0.0..=1.0).contains(c))
        .ok_or_else(|| MaestroError::Inference("confidence_score missing or out of range".into()))?;
    let conflicts_identified = object
        .get("conflicts_identified")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect()
        })
        .unwrap_or_default();
    let reasoning = object
        .get("reasoning")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok(ConflictResolution {
        conflicts_identified,
        resolution,
        confidence,
        reasoning,
        accepted: false,
    })
}

fn fallback(candidates: &[Value], error: &MaestroError) -> ConflictResolution {
    ConflictResolution {
        conflicts_identified: vec!["Resolution failed".to_string()],
        resolution: candidates
            .first()
            .cloned()
            .unwrap_or_else(|| Value::Object(serde_json::Map::new())),
        confidence: FALLBACK_CONFIDENCE,
        reasoning: format!("Automatic fallback due to resolution error: {error}"),
        accepted: false,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct Reply(MaestroResult<&'static str>);

    #[async_trait]
    impl InferenceBackend for Reply {
        async fn infer(&self, _system: Option<&str>, _prompt: &str) -> MaestroResult<String> {
            match &self.0 {
                Ok(text) => Ok((*text).to_string()),
                Err(e) => Err(MaestroError::Inference(e.to_string())),
            }
        }
    }

    const CONTEXT: ConflictContext<'static> = ConflictContext {
        title: "Estimate",
        description: "Market size",
    };

    #[tokio::test]
    async fn test_empty_candidates_under_failure() {
        let backend = Reply(Err(MaestroError::Inference("offline".into())));
        let resolution = resolve(&backend, CONTEXT, &[], 0.7).await;
        assert_eq!(resolution.confidence, 0.5);
        assert_eq!(resolution.resolution, json!({}));
        assert_eq!(resolution.conflicts_identified, vec!["Resolution failed"]);
        assert!(resolution.reasoning.contains("offline"));
        assert!(!resolution.accepted);
    }

    #[tokio::test]
    async fn test_model_resolution_is_used() {
        let backend = Reply(Ok(r#"{
            "conflicts_identified": ["size differs"],
            "resolution": "about 3B",
            "confidence_score": 0.82,
            "reasoning": "averaged"
        }"#));
        let candidates = [json!("2B"), json!("4B")];
        let resolution = resolve(&backend, CONTEXT, &candidates, 0.7).await;
        assert_eq!(resolution.resolution, json!("about 3B"));
        assert_eq!(resolution.conflicts_identified, vec!["size differs"]);
        assert!(resolution.accepted);
    }

    #[tokio::test]
    async fn test_out_of_range_confidence_is_malformed() {
        let backend = Reply(Ok(r#"{"resolution": "x", "confidence_score": 7}"#));
        let candidates = [json!({"answer": 1}), json!({"answer": 2})];
        let resolution = resolve(&backend, CONTEXT, &candidates, 0.4).await;
        assert_eq!(resolution.resolution, json!({"answer": 1}));
        assert_eq!(resolution.confidence, 0.5);
        assert!(resolution.accepted);
    }
}
