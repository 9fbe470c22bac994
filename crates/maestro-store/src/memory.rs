use crate::store::{StoreSnapshot, TaskStore};
use async_trait::async_trait;
use maestro_core::{MaestroResult, Message, Task};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-process store. Contents vanish with the process.
#[derive(Default)]
pub struct MemoryStore {
    tasks: RwLock<HashMap<Uuid, Task>>,
    messages: RwLock<Vec<Message>>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populated store, for restore scenarios.
    pub fn with_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            tasks: RwLock::new(snapshot.tasks.into_iter().map(|t| (t.id, t)).collect()),
            messages: RwLock::new(snapshot.messages),
        }
    }

    /// Stored copy of task `id`.
    pub async fn task(&self, id: Uuid) -> Option<Task> {
        self.tasks.read().await.get(&id).cloned()
    }

    /// Number of stored tasks.
    pub async fn task_count(&self) -> usize {
        self.tasks.read().await.len()
    }

    /// Number of stored messages.
    pub async fn message_count(&self) -> usize {
        self.messages.read().await.len()
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn load_all(&self) -> MaestroResult<StoreSnapshot> {
        let mut tasks: Vec<Task> = self.tasks.read().await.values().cloned().collect();
        tasks.sort_by_key(|t| t.created_at);
        Ok(StoreSnapshot {
            tasks,
            messages: self.messages.read().await.clone(),
        })
    }

    async fn upsert_task(&self, task: &Task) -> MaestroResult<()> {
        self.tasks.write().await.insert(task.id, task.clone());
        Ok(())
    }

    async fn append_message(&self, message: &Message) -> MaestroResult<()> {
        self.messages.write().await.push(message.clone());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use maestro_core::{MessageType, TaskStatus};

    #[tokio::test]
    async fn test_upsert_replaces() {
        let store = MemoryStore::new();
        let mut task = Task::new("t", "d");
        store.upsert_task(&task).await.unwrap();
        task.transition(TaskStatus::Assigned).unwrap();
        store.upsert_task(&task).await.unwrap();

        assert_eq!(store.task_count().await, 1);
        assert_eq!(
            store.task(task.id).await.unwrap().status,
            TaskStatus::Assigned
        );
    }

    #[tokio::test]
    async fn test_load_all_orders_tasks_by_creation() {
        let store = MemoryStore::new();
        let first = Task::new("first", "");
        let second = Task::new("second", "");
        store.upsert_task(&second).await.unwrap();
        store.upsert_task(&first).await.unwrap();
        store
            .append_message(&Message::new(Uuid::new_v4(), MessageType::StatusUpdate, "m"))
            .await
            .unwrap();

        let snapshot = store.load_all().await.unwrap();
        assert_eq!(snapshot.tasks[0].title, "first");
        assert_eq!(snapshot.messages.len(), 1);
    }
}
