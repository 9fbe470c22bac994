use uuid::Uuid;

use crate::task::TaskStatus;

/// Top-level error type for the Maestro engine.
///
/// Each variant corresponds to a subsystem that can produce errors.
#[derive(Debug, thiserror::Error)]
pub enum MaestroError {
    /// An error raised while an agent processed a task.
    #[error("Agent error: {0}")]
    Agent(String),

    /// The inference collaborator returned nothing usable.
    #[error("Inference error: {0}")]
    Inference(String),

    /// An error from an outbound HTTP request (e.g. LLM API call).
    #[error("HTTP error: {0}")]
    Http(String),

    /// An error from the task store.
    #[error("Store error: {0}")]
    Store(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// No task with the given id is known.
    #[error("Task not found: {0}")]
    TaskNotFound(Uuid),

    /// No agent with the given id is registered in the pool.
    #[error("Agent not found: {0}")]
    AgentNotFound(Uuid),

    /// No collaboration session with the given id exists.
    #[error("Collaboration not found: {0}")]
    CollaborationNotFound(Uuid),

    /// A submission was rejected before it became a task.
    #[error("Invalid task: {0}")]
    InvalidTask(String),

    /// A status change outside the task state machine was attempted.
    #[error("Invalid task transition: {from} -> {to}")]
    InvalidTransition {
        /// Status the task was in.
        from: TaskStatus,
        /// Status that was requested.
        to: TaskStatus,
    },

    /// An error from the orchestration engine itself.
    #[error("Orchestrator error: {0}")]
    Orchestrator(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`MaestroError`].
pub type MaestroResult<T> = Result<T, MaestroError>;
