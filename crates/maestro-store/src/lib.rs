//! Task store implementations for the Maestro orchestration engine.
//!
//! The engine treats storage as an opaque upsert/load collaborator: it loads
//! everything once at startup and then writes every task change and message.
//!
//! - [`MemoryStore`] keeps everything in process (tests, ephemeral runs).
//! - [`FileStore`] writes one JSON file per task plus a JSON Lines message log.
//! - `SqliteStore` (feature `sqlite`) keeps both in a single SQLite database.

/// JSON file store.
pub mod file;
/// In-process store.
pub mod memory;
#[cfg(feature = "sqlite")]
/// SQLite store.
pub mod sqlite;
/// The store trait.
pub mod store;

pub use file::FileStore;
pub use memory::MemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
pub use store::{StoreSnapshot, TaskStore};
