use crate::prompts::{self, ORCHESTRATOR_SYSTEM_PROMPT};
use maestro_agent::InferenceBackend;
use maestro_core::Task;
use serde_json::{json, Value};
use tracing::warn;

/// Merge the results of `parent`'s children, given in child order.
///
/// An inference failure yields the raw results plus an error note instead.
pub async fn synthesize(
    inference: &dyn InferenceBackend,
    parent: &Task,
    child_results: &[Value],
) -> Value {
    match inference
        .infer(
            Some(ORCHESTRATOR_SYSTEM_PROMPT),
            &prompts::synthesis(parent, child_results),
        )
        .await
    {
        Ok(text) => Value::String(text),
        Err(e) => {
            warn!(
                task_id = %parent.id,
                error = %e,
                "Synthesis failed, keeping raw subtask results"
            );
            json!({
                "synthesized_results": child_results,
                "error": e.to_string(),
            })
        }
    }
}
