//! Core types and error definitions for the Maestro orchestration engine.
//!
//! This crate provides the foundational types shared across all Maestro crates:
//! the error taxonomy, the task data model with its status state machine, and
//! the inter-agent message log entries.
//!
//! # Main types
//!
//! - [`MaestroError`]: Unified error enum for all Maestro subsystems.
//! - [`MaestroResult`]: Convenience alias for `Result<T, MaestroError>`.
//! - [`Task`]: A unit of work tracked by the orchestrator.
//! - [`TaskStatus`]: Lifecycle state of a [`Task`].
//! - [`TaskRequest`]: Submission payload used to create a [`Task`].
//! - [`Message`]: An entry in the append-only inter-agent message log.

/// Error taxonomy shared by every crate in the workspace.
pub mod error;
/// Inter-agent messages.
pub mod message;
/// Tasks, their status state machine and submission requests.
pub mod task;

pub use error::{MaestroError, MaestroResult};
pub use message::{Message, MessageType};
pub use task::{StatusChange, Task, TaskRequest, TaskStatus};

/// Opaque, ordered key-value map attached to tasks and messages.
pub type Metadata = std::collections::BTreeMap<String, serde_json::Value>;
