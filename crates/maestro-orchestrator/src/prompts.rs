//! Prompt builders for the engine's own inference calls, plus a lenient
//! JSON extractor for model replies.

use maestro_core::Task;
use serde_json::Value;

/// System prompt for the engine's own calls.
pub const ORCHESTRATOR_SYSTEM_PROMPT: &str = "\
You coordinate a team of specialised agents. Break work down, merge results, \
and settle disagreements. When asked for JSON, reply with JSON only.";

fn capability_list(task: &Task) -> String {
    let caps: Vec<&str> = task
        .required_capabilities
        .iter()
        .map(String::as_str)
        .collect();
    format!("[{}]", caps.join(", "))
}

/// Ask whether `task` should be decomposed.
pub fn assessment(task: &Task) -> String {
    format!(
        "Analyze this task and determine if it needs to be broken down into subtasks:\n\n\
         Title: {}\nDescription: {}\nRequired Capabilities: {}\n\n\
         Consider:\n\
         1. Task complexity and scope\n\
         2. Multiple capability requirements\n\
         3. Potential for parallel execution\n\n\
         Respond with JSON: {{\"needs_decomposition\": true/false, \"reasoning\": \"explanation\"}}",
        task.title,
        task.description,
        capability_list(task)
    )
}

/// Ask for at most `max_subtasks` subtasks as a JSON array.
pub fn decomposition(task: &Task, max_subtasks: usize) -> String {
    format!(
        "Decompose this complex task into smaller, manageable subtasks:\n\n\
         Title: {}\nDescription: {}\nRequired Capabilities: {}\n\n\
         Create at most {max_subtasks} subtasks that:\n\
         1. Can be executed independently or with minimal dependencies\n\
         2. Each require specific capabilities\n\
         3. Together accomplish the main task\n\n\
         Respond with JSON array of subtasks:\n\
         [{{\"title\": \"Subtask title\", \"description\": \"Detailed description\", \
         \"required_capabilities\": [\"capability1\"], \"priority\": 1, \"depends_on\": []}}]",
        task.title,
        task.description,
        capability_list(task)
    )
}

/// Ask to merge child results into one.
pub fn synthesis(parent: &Task, child_results: &[Value]) -> String {
    let lines: Vec<String> = child_results.iter().map(|r| format!("- {r}")).collect();
    format!(
        "Synthesize the results from multiple subtasks into a coherent final result:\n\n\
         Original Task: {}\nDescription: {}\n\n\
         Subtask Results:\n{}\n\n\
         Provide a comprehensive synthesis that:\n\
         1. Combines all relevant information\n\
         2. Resolves any conflicts or contradictions\n\
         3. Presents a unified, actionable result",
        parent.title,
        parent.description,
        lines.join("\n")
    )
}

/// Ask to reconcile competing results.
pub fn conflict_resolution(title: &str, description: &str, candidates: &[Value]) -> String {
    let rendered =
        serde_json::to_string_pretty(candidates).unwrap_or_else(|_| "[]".to_string());
    format!(
        "Resolve conflicts between multiple agent results for the same task:\n\n\
         Task: {title}\nDescription: {description}\n\n\
         Conflicting Results:\n{rendered}\n\n\
         Analyze the results and provide:\n\
         1. Identification of key conflicts\n\
         2. Assessment of result quality and reliability\n\
         3. A consensus resolution that combines the best elements\n\
         4. Confidence score for the final resolution\n\n\
         Respond with JSON:\n\
         {{\"conflicts_identified\": [\"conflict1\"], \"resolution\": \"final resolved result\", \
         \"confidence_score\": 0.0-1.0, \"reasoning\": \"explanation of resolution approach\"}}"
    )
}

/// Parse the first JSON object or array in `text`.
///
/// Models often wrap JSON in markdown fences or prose; both are tolerated.
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }
    let start = trimmed.find(['{', '['])?;
    let closer = if trimmed[start..].starts_with('{') { '}' } else { ']' };
    let end = trimmed.rfind(closer)?;
    if end < start {
        return None;
    }
    serde_json::from_str(&trimmed[start..=end]).ok()
}
