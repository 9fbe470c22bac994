use crate::monitor::SystemMetrics;
use maestro_core::Message;
use serde::{Deserialize, Serialize};

pub use maestro_agent::AgentSummary;

/// Point-in-time view of the whole engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatus {
    /// Counters since startup.
    pub metrics: SystemMetrics,
    /// Tasks Assigned or InProgress.
    pub active_tasks: usize,
    /// Tasks in Pending status.
    pub pending_tasks: usize,
    /// Entries waiting in the scheduler queue.
    pub queue_length: usize,
    /// Agents in the pool.
    pub total_agents: usize,
    /// Every agent, in pool order.
    pub agent_status: Vec<AgentSummary>,
    /// Open collaboration sessions.
    pub active_collaborations: usize,
    /// Newest messages, oldest first.
    pub recent_messages: Vec<Message>,
}
