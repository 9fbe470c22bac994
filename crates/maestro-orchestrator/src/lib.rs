//! Multi-agent orchestration engine.
//!
//! Accepts task submissions, decides whether each one should be split into
//! subtasks, matches atomic tasks to the best available agent through a FIFO
//! queue, retries failed executions, and merges subtask results back into
//! their parent.
//!
//! # Main types
//!
//! - [`Orchestrator`]: The engine facade; build one with [`Orchestrator::builder`].
//! - [`AgentPool`]: All agents plus the capability index.
//! - [`TaskQueue`]: FIFO queue of tasks waiting for an agent.
//! - [`CollaborationBroker`]: Opens and closes collaboration sessions.
//! - [`SystemMetrics`]: Engine-wide counters for dashboards.

/// Collaboration sessions between agents.
pub mod collaboration;
/// Engine tunables.
pub mod config;
/// Reconciliation of competing results.
pub mod conflict;
/// Complexity assessment and subtask planning.
pub mod decomposer;
/// The orchestration engine.
pub mod engine;
/// Capability matching and agent scoring.
pub mod matcher;
/// Engine-wide metrics.
pub mod monitor;
/// Background store writer.
pub mod persistence;
/// Agent pool and capability index.
pub mod pool;
/// Prompts for the engine's own inference calls.
pub mod prompts;
/// Merging of subtask results.
pub mod synthesizer;
/// FIFO scheduler queue.
pub mod task_queue;
/// Status views returned to callers.
pub mod types;

pub use collaboration::{
    CollaborationBroker, CollaborationKind, CollaborationOutcome, CollaborationRequest,
    CollaborationSession, SessionStatus,
};
pub use config::PlatformConfig;
pub use conflict::ConflictResolution;
pub use decomposer::Decomposition;
pub use engine::{Orchestrator, OrchestratorBuilder};
pub use matcher::{find_best_agent, MatchScore};
pub use monitor::SystemMetrics;
pub use persistence::PersistenceHandle;
pub use pool::AgentPool;
pub use task_queue::TaskQueue;
pub use types::{AgentSummary, SystemStatus};
