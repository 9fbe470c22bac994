use crate::store::{StoreSnapshot, TaskStore};
use async_trait::async_trait;
use maestro_core::{MaestroResult, Message, Task};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing::warn;
use uuid::Uuid;

/// File-based store: `tasks/<id>.json` per task plus `messages.jsonl`.
///
/// Unreadable task files and message lines are skipped on load with a warning.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `dir`, creating it if needed.
    pub async fn new(dir: PathBuf) -> MaestroResult<Self> {
        tokio::fs::create_dir_all(dir.join("tasks")).await?;
        Ok(Self { dir })
    }

    fn task_path(&self, id: Uuid) -> PathBuf {
        self.dir.join("tasks").join(format!("{id}.json"))
    }

    fn messages_path(&self) -> PathBuf {
        self.dir.join("messages.jsonl")
    }

    async fn load_tasks(&self) -> MaestroResult<Vec<Task>> {
        let mut entries = tokio::fs::read_dir(self.dir.join("tasks")).await?;
        let mut tasks = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let data = tokio::fs::read_to_string(&path).await?;
            match serde_json::from_str::<Task>(&data) {
                Ok(task) => tasks.push(task),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable task file")
                }
            }
        }
        tasks.sort_by_key(|t| t.created_at);
        Ok(tasks)
    }

    async fn load_messages(&self) -> MaestroResult<Vec<Message>> {
        let path = self.messages_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let data = tokio::fs::read_to_string(&path).await?;
        let mut messages = Vec::new();
        for (lineno, line) in data.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Message>(line) {
                Ok(message) => messages.push(message),
                Err(e) => warn!(line = lineno + 1, error = %e, "Skipping unreadable message line"),
            }
        }
        Ok(messages)
    }
}

#[async_trait]
impl TaskStore for FileStore {
    async fn load_all(&self) -> MaestroResult<StoreSnapshot> {
        Ok(StoreSnapshot {
            tasks: self.load_tasks().await?,
            messages: self.load_messages().await?,
        })
    }

    async fn upsert_task(&self, task: &Task) -> MaestroResult<()> {
        let json = serde_json::to_string_pretty(task)?;
        tokio::fs::write(self.task_path(task.id), json).await?;
        Ok(())
    }

    async fn append_message(&self, message: &Message) -> MaestroResult<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.messages_path())
            .await?;
        let mut line = serde_json::to_string(message)?;
        line.push('\n');
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use maestro_core::MessageType;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_corrupt_entries_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().to_path_buf()).await.unwrap();

        let task = Task::new("good", "");
        store.upsert_task(&task).await.unwrap();
        tokio::fs::write(tmp.path().join("tasks").join("broken.json"), "{not json")
            .await
            .unwrap();

        store
            .append_message(&Message::new(Uuid::new_v4(), MessageType::Error, "ok"))
            .await
            .unwrap();
        let mut log = tokio::fs::OpenOptions::new()
            .append(true)
            .open(tmp.path().join("messages.jsonl"))
            .await
            .unwrap();
        log.write_all(b"garbage\n\n").await.unwrap();

        let snapshot = store.load_all().await.unwrap();
        assert_eq!(snapshot.tasks.len(), 1);
        assert_eq!(snapshot.tasks[0].id, task.id);
        assert_eq!(snapshot.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_dir_loads_nothing() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().join("nested")).await.unwrap();
        let snapshot = store.load_all().await.unwrap();
        assert!(snapshot.tasks.is_empty());
        assert!(snapshot.messages.is_empty());
    }
}
