use crate::config::PlatformConfig;
use crate::prompts::{self, ORCHESTRATOR_SYSTEM_PROMPT};
use maestro_agent::InferenceBackend;
use maestro_core::{MaestroError, MaestroResult, Task, TaskRequest};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Outcome of assessing a task.
#[derive(Debug, Clone)]
pub enum Decomposition {
    /// Run the task directly.
    Atomic,
    /// Hand the work to these subtasks, in order.
    Composite(Vec<TaskRequest>),
}

#[derive(Debug, Deserialize)]
struct SubtaskSpec {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    required_capabilities: BTreeSet<String>,
    #[serde(default = "default_subtask_priority")]
    priority: i32,
}

fn default_subtask_priority() -> i32 {
    1
}

/// Decide whether `task` runs directly or is split into subtasks.
///
/// Never fails: inference errors and malformed replies degrade to the
/// capability-count heuristic during assessment and to `Atomic` during
/// planning.
pub async fn decompose(
    inference: &dyn InferenceBackend,
    task: &Task,
    config: &PlatformConfig,
) -> Decomposition {
    if task.depth >= config.max_decomposition_depth {
        debug!(
            task_id = %task.id,
            depth = task.depth,
            "Depth limit reached, running task directly"
        );
        return Decomposition::Atomic;
    }
    if !needs_decomposition(inference, task).await {
        return Decomposition::Atomic;
    }
    match plan_subtasks(inference, task, config.max_subtasks).await {
        Ok(subtasks) => Decomposition::Composite(subtasks),
        Err(e) => {
            warn!(task_id = %task.id, error = %e, "Decomposition failed, running task directly");
            Decomposition::Atomic
        }
    }
}

async fn needs_decomposition(inference: &dyn InferenceBackend, task: &Task) -> bool {
    let heuristic = task.required_capabilities.len() > 2;
    let reply = match inference
        .infer(Some(ORCHESTRATOR_SYSTEM_PROMPT), &prompts::assessment(task))
        .await
    {
        Ok(reply) => reply,
        Err(e) => {
            warn!(task_id = %task.id, error = %e, heuristic, "Complexity assessment failed");
            return heuristic;
        }
    };
    match prompts::extract_json(&reply)
        .as_ref()
        .and_then(|v| v.get("needs_decomposition"))
        .and_then(Value::as_bool)
    {
        Some(decision) => decision,
        None => {
            warn!(task_id = %task.id, heuristic, "Malformed complexity assessment");
            heuristic
        }
    }
}

async fn plan_subtasks(
    inference: &dyn InferenceBackend,
    task: &Task,
    max_subtasks: usize,
) -> MaestroResult<Vec<TaskRequest>> {
    let reply = inference
        .infer(
            Some(ORCHESTRATOR_SYSTEM_PROMPT),
            &prompts::decomposition(task, max_subtasks),
        )
        .await?;
    let value = prompts::extract_json(&reply)
        .ok_or_else(|| MaestroError::Inference("subtask list is not JSON".into()))?;
    let specs: Vec<SubtaskSpec> = serde_json::from_value(value)?;
    if specs.is_empty() {
        return Err(MaestroError::Inference("subtask list is empty".into()));
    }
    if specs.len() > max_subtasks {
        return Err(MaestroError::Inference(format!(
            "{} subtasks exceeds the limit of {max_subtasks}",
            specs.len()
        )));
    }

    let mut requests = Vec::with_capacity(specs.len());
    for spec in specs {
        let request = TaskRequest::new(spec.title, spec.description)
            .with_type(task.task_type.clone())
            .with_capabilities(spec.required_capabilities)
            .with_priority(spec.priority);
        request.validate()?;
        requests.push(request);
    }
    Ok(requests)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replies from a fixed script, in order.
    struct Scripted(Mutex<Vec<MaestroResult<String>>>);

    impl Scripted {
        fn new(replies: Vec<MaestroResult<&str>>) -> Self {
            Self(Mutex::new(
                replies
                    .into_iter()
                    .rev()
                    .map(|r| r.map(str::to_string))
                    .collect(),
            ))
        }
    }

    #[async_trait]
    impl InferenceBackend for Scripted {
        async fn infer(&self, _system: Option<&str>, _prompt: &str) -> MaestroResult<String> {
            self.0
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(MaestroError::Inference("script exhausted".into())))
        }
    }

    fn offline() -> MaestroError {
        MaestroError::Inference("offline".into())
    }

    fn three_caps() -> Task {
        Task::new("Launch", "Plan a launch").with_capabilities([
            "market_research",
            "content_creation",
            "translation",
        ])
    }

    #[tokio::test]
    async fn test_assessment_failure_uses_capability_heuristic() {
        let config = PlatformConfig::default();
        let small = Task::new("Fix", "").with_capabilities(["code_generation", "debugging"]);
        let backend = Scripted::new(vec![Err(offline())]);
        assert!(matches!(
            decompose(&backend, &small, &config).await,
            Decomposition::Atomic
        ));

        let backend = Scripted::new(vec![
            Ok("not json at all"),
            Ok(r#"[{"title": "Research", "required_capabilities": ["market_research"]}]"#),
        ]);
        match decompose(&backend, &three_caps(), &config).await {
            Decomposition::Composite(subtasks) => {
                assert_eq!(subtasks.len(), 1);
                assert_eq!(subtasks[0].priority, 1);
            }
            other => panic!("Expected composite, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_composite_subtasks_inherit_type() {
        let task = three_caps().with_type("creative_task");
        let backend = Scripted::new(vec![
            Ok(r#"{"needs_decomposition": true, "reasoning": "two parts"}"#),
            Ok(r#"```json
            [
              {"title": "Research", "description": "d1", "required_capabilities": ["market_research"], "priority": 3, "depends_on": []},
              {"title": "Write", "description": "d2", "required_capabilities": ["content_creation"]}
            ]
            ```"#),
        ]);
        match decompose(&backend, &task, &PlatformConfig::default()).await {
            Decomposition::Composite(subtasks) => {
                assert_eq!(subtasks.len(), 2);
                assert_eq!(subtasks[0].title, "Research");
                assert_eq!(subtasks[0].priority, 3);
                assert!(subtasks.iter().all(|s| s.task_type == "creative_task"));
            }
            other => panic!("Expected composite, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_bad_plans_fall_back_to_atomic() {
        let config = PlatformConfig {
            max_subtasks: 1,
            ..PlatformConfig::default()
        };
        for plan in [
            Ok("[]"),
            Ok(r#"[{"title": "a"}, {"title": "b"}]"#),
            Ok(r#"[{"title": "  "}]"#),
            Ok(r#"[{"description": "no title"}]"#),
            Err(offline()),
        ] {
            let backend = Scripted::new(vec![Ok(r#"{"needs_decomposition": true}"#), plan]);
            assert!(matches!(
                decompose(&backend, &three_caps(), &config).await,
                Decomposition::Atomic
            ));
        }
    }

    #[tokio::test]
    async fn test_depth_limit_skips_inference() {
        let config = PlatformConfig {
            max_decomposition_depth: 1,
            ..PlatformConfig::default()
        };
        let parent = three_caps();
        let child = three_caps().with_parent(&parent);
        let backend = Scripted::new(vec![]);
        assert!(matches!(
            decompose(&backend, &child, &config).await,
            Decomposition::Atomic
        ));
        assert!(backend.0.lock().unwrap().is_empty());
    }
}
