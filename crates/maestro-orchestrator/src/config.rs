use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables of the orchestration engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Retries granted to a failed task before it stays Failed.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Per-execution time limit in seconds; 0 disables it.
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,
    /// Minimum confidence for a conflict resolution to count as accepted.
    #[serde(default = "default_consensus_threshold")]
    pub consensus_threshold: f64,
    /// Tasks at this depth are never decomposed further.
    #[serde(default = "default_max_decomposition_depth")]
    pub max_decomposition_depth: u32,
    /// Subtask lists longer than this are rejected.
    #[serde(default = "default_max_subtasks")]
    pub max_subtasks: usize,
    /// Messages included in the status view.
    #[serde(default = "default_recent_messages")]
    pub recent_messages: usize,
    /// Messages kept in memory; older ones remain only in the store.
    #[serde(default = "default_message_log_capacity")]
    pub message_log_capacity: usize,
}

fn default_max_retries() -> u32 {
    3
}

fn default_task_timeout_secs() -> u64 {
    300
}

fn default_consensus_threshold() -> f64 {
    0.7
}

fn default_max_decomposition_depth() -> u32 {
    3
}

fn default_max_subtasks() -> usize {
    8
}

fn default_recent_messages() -> usize {
    10
}

fn default_message_log_capacity() -> usize {
    1000
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            task_timeout_secs: default_task_timeout_secs(),
            consensus_threshold: default_consensus_threshold(),
            max_decomposition_depth: default_max_decomposition_depth(),
            max_subtasks: default_max_subtasks(),
            recent_messages: default_recent_messages(),
            message_log_capacity: default_message_log_capacity(),
        }
    }
}

impl PlatformConfig {
    /// Per-task execution timeout; `None` when `task_timeout_secs` is zero.
    pub fn task_timeout(&self) -> Option<Duration> {
        (self.task_timeout_secs > 0).then(|| Duration::from_secs(self.task_timeout_secs))
    }
}
