use crate::store::{StoreSnapshot, TaskStore};
use async_trait::async_trait;
use maestro_core::{MaestroError, MaestroResult, Message, Task};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Arc;

/// SQLite-backed store. Task and message bodies are stored as JSON.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

fn store_err(e: impl std::fmt::Display) -> MaestroError {
    MaestroError::Store(e.to_string())
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> MaestroResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(store_err)?;
        Self::init(conn)
    }

    /// Private in-memory database.
    pub fn in_memory() -> MaestroResult<Self> {
        Self::init(Connection::open_in_memory().map_err(store_err)?)
    }

    fn init(conn: Connection) -> MaestroResult<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                parent_id TEXT,
                created_at TEXT NOT NULL,
                body TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS messages (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL,
                body TEXT NOT NULL
            );",
        )
        .map_err(store_err)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> MaestroResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> MaestroResult<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            f(&guard)
        })
        .await
        .map_err(store_err)?
    }
}

#[async_trait]
impl TaskStore for SqliteStore {
    async fn load_all(&self) -> MaestroResult<StoreSnapshot> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT body FROM tasks ORDER BY created_at")
                .map_err(store_err)?;
            let tasks = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(store_err)?
                .map(|body| {
                    let body = body.map_err(store_err)?;
                    Ok(serde_json::from_str::<Task>(&body)?)
                })
                .collect::<MaestroResult<Vec<_>>>()?;

            let mut stmt = conn
                .prepare("SELECT body FROM messages ORDER BY seq")
                .map_err(store_err)?;
            let messages = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(store_err)?
                .map(|body| {
                    let body = body.map_err(store_err)?;
                    Ok(serde_json::from_str::<Message>(&body)?)
                })
                .collect::<MaestroResult<Vec<_>>>()?;

            Ok(StoreSnapshot { tasks, messages })
        })
        .await
    }

    async fn upsert_task(&self, task: &Task) -> MaestroResult<()> {
        let body = serde_json::to_string(task)?;
        let id = task.id.to_string();
        let status = task.status.as_str();
        let parent = task.parent_id.map(|p| p.to_string());
        let created = task.created_at.to_rfc3339();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO tasks (id, status, parent_id, created_at, body)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET status = excluded.status, body = excluded.body",
                params![id, status, parent, created, body],
            )
            .map_err(store_err)?;
            Ok(())
        })
        .await
    }

    async fn append_message(&self, message: &Message) -> MaestroResult<()> {
        let body = serde_json::to_string(message)?;
        let id = message.id.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO messages (id, body) VALUES (?1, ?2)",
                params![id, body],
            )
            .map_err(store_err)?;
            Ok(())
        })
        .await
    }
}
