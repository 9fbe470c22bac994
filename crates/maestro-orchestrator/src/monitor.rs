use crate::pool::AgentPool;
use serde::{Deserialize, Serialize};

/// Aggregate engine counters plus figures derived from the pool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemMetrics {
    /// Tasks ever submitted, subtasks included.
    pub total_tasks: u64,
    /// Includes parents completed by synthesis.
    pub completed_tasks: u64,
    /// Failure events, so a task retried twice counts twice.
    pub failed_tasks: u64,
    /// Retries granted.
    pub retried_tasks: u64,
    /// Agents Idle or Busy.
    pub active_agents: usize,
    /// Running mean of successful execution durations, in seconds.
    pub average_response_time: f64,
    /// Σ load / Σ capacity.
    pub system_load: f64,
    #[serde(skip)]
    responses: u64,
}

impl SystemMetrics {
    /// All counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a successful execution into the response-time mean.
    pub fn record_response(&mut self, secs: f64) {
        self.responses += 1;
        let n = self.responses as f64;
        self.average_response_time = (self.average_response_time * (n - 1.0) + secs) / n;
    }

    /// Copy of the counters with the pool-derived fields filled in.
    pub fn snapshot(&self, pool: &AgentPool) -> SystemMetrics {
        SystemMetrics {
            active_agents: pool.active_count(),
            system_load: pool.system_load(),
            ..self.clone()
        }
    }
}
