use maestro_core::{Message, Task};
use maestro_store::TaskStore;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

enum StoreOp {
    Task(Box<Task>),
    Message(Box<Message>),
    Flush(oneshot::Sender<()>),
}

/// Fire-and-forget handle onto the background store writer.
///
/// Writes are applied one at a time in submission order. A failed write is
/// logged and dropped; the in-memory state stays authoritative.
#[derive(Clone)]
pub struct PersistenceHandle {
    tx: Option<mpsc::UnboundedSender<StoreOp>>,
}

impl PersistenceHandle {
    /// Start the writer task for `store`. Must be called within a tokio runtime.
    pub fn spawn(store: Arc<dyn TaskStore>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(op) = rx.recv().await {
                match op {
                    StoreOp::Task(task) => {
                        if let Err(e) = store.upsert_task(&task).await {
                            warn!(task_id = %task.id, error = %e, "Failed to persist task");
                        }
                    }
                    StoreOp::Message(message) => {
                        if let Err(e) = store.append_message(&message).await {
                            warn!(
                                message_id = %message.id,
                                error = %e,
                                "Failed to persist message"
                            );
                        }
                    }
                    StoreOp::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
            debug!("Store writer stopped");
        });
        Self { tx: Some(tx) }
    }

    /// A handle that drops every write.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Whether a store is attached.
    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Queue an upsert of `task`.
    pub fn task(&self, task: &Task) {
        self.send(StoreOp::Task(Box::new(task.clone())));
    }

    /// Queue an append of `message`.
    pub fn message(&self, message: &Message) {
        self.send(StoreOp::Message(Box::new(message.clone())));
    }

    /// Wait until every write issued before this call has been attempted.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.send(StoreOp::Flush(done)) {
            let _ = wait.await;
        }
    }

    fn send(&self, op: StoreOp) -> bool {
        match &self.tx {
            Some(tx) => tx.send(op).is_ok(),
            None => false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use maestro_core::{MaestroError, MaestroResult, MessageType};
    use maestro_store::{MemoryStore, StoreSnapshot};
    use uuid::Uuid;

    struct BrokenStore;

    #[async_trait]
    impl TaskStore for BrokenStore {
        async fn load_all(&self) -> MaestroResult<StoreSnapshot> {
            Ok(StoreSnapshot::default())
        }

        async fn upsert_task(&self, _task: &Task) -> MaestroResult<()> {
            Err(MaestroError::Store("disk full".into()))
        }

        async fn append_message(&self, _message: &Message) -> MaestroResult<()> {
            Err(MaestroError::Store("disk full".into()))
        }
    }

    #[tokio::test]
    async fn test_writes_land_in_order() {
        let store = Arc::new(MemoryStore::new());
        let handle = PersistenceHandle::spawn(store.clone());

        let mut task = Task::new("t", "d");
        handle.task(&task);
        task.title = "renamed".into();
        handle.task(&task);
        handle.message(&Message::new(Uuid::new_v4(), MessageType::StatusUpdate, "hi"));
        handle.flush().await;

        assert_eq!(store.task(task.id).await.unwrap().title, "renamed");
        assert_eq!(store.message_count().await, 1);
    }

    #[tokio::test]
    async fn test_failures_are_swallowed() {
        let handle = PersistenceHandle::spawn(Arc::new(BrokenStore));
        handle.task(&Task::new("t", "d"));
        handle.flush().await;
        handle.task(&Task::new("u", "d"));
        handle.flush().await;
        assert!(handle.is_enabled());
    }

    #[tokio::test]
    async fn test_disabled_handle_flushes_immediately() {
        let handle = PersistenceHandle::disabled();
        handle.task(&Task::new("t", "d"));
        handle.flush().await;
        assert!(!handle.is_enabled());
    }
}
