use async_trait::async_trait;
use maestro_core::{MaestroResult, Message, Task};

/// Everything a store holds, as loaded at startup.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    /// Tasks ordered by creation time.
    pub tasks: Vec<Task>,
    /// Messages in append order.
    pub messages: Vec<Message>,
}

/// Persistence collaborator of the orchestrator.
///
/// No transactional semantics are required; callers log and discard errors.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Load every task and message.
    async fn load_all(&self) -> MaestroResult<StoreSnapshot>;
    /// Insert or replace a task by id.
    async fn upsert_task(&self, task: &Task) -> MaestroResult<()>;
    /// Append a message to the log.
    async fn append_message(&self, message: &Message) -> MaestroResult<()>;
}
