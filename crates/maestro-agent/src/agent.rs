use crate::backends::InferenceBackend;
use crate::kinds::AgentKind;
use chrono::{DateTime, Utc};
use maestro_core::Task;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::AbortHandle;
use tracing::{debug, warn};
use uuid::Uuid;

/// Success-rate multiplier applied on every failed execution.
pub const FAILURE_DECAY: f64 = 0.95;

/// Operational status of an [`Agent`].
///
/// Idle and Busy follow the current load. Offline and Error are imposed from
/// outside and survive task completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Running, no tasks in flight.
    Idle,
    /// At least one task in flight.
    Busy,
    /// Taken out of rotation.
    Offline,
    /// Faulted; skipped until reset.
    Error,
}

impl AgentStatus {
    /// Idle or Busy.
    pub fn is_available(self) -> bool {
        matches!(self, AgentStatus::Idle | AgentStatus::Busy)
    }
}

/// Running performance metrics of one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMetrics {
    /// Successful executions.
    pub tasks_completed: u64,
    /// Incremental mean of successful execution times, in seconds.
    pub average_completion_time: f64,
    /// Starts at 1.0 and decays by [`FAILURE_DECAY`] per failure.
    pub success_rate: f64,
    /// Time of the last finished execution.
    pub last_active: DateTime<Utc>,
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self {
            tasks_completed: 0,
            average_completion_time: 0.0,
            success_rate: 1.0,
            last_active: Utc::now(),
        }
    }
}

/// Serializable view of an agent for listings and dashboards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSummary {
    /// Agent id.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Agent kind.
    pub agent_type: AgentKind,
    /// Status at snapshot time.
    pub status: AgentStatus,
    /// Held capabilities.
    pub capabilities: BTreeSet<String>,
    /// Tasks in flight.
    pub current_load: usize,
    /// Tasks holding a load slot, in id order.
    pub current_tasks: Vec<Uuid>,
    /// Concurrency limit.
    pub max_concurrent_tasks: usize,
    /// Tie-break weight used by the matcher.
    pub priority_weight: f64,
    /// Running metrics.
    pub metrics: AgentMetrics,
}

/// Tagged result of [`Agent::execute_task`]. Execution never returns an error.
#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    /// The agent produced a result.
    Success {
        value: serde_json::Value,
        duration: Duration,
    },
    /// Inference failed, timed out or the work panicked.
    Failure {
        error: String,
        duration: Duration,
    },
}

impl ExecutionOutcome {
    /// Wall-clock time spent on the task.
    pub fn duration(&self) -> Duration {
        match self {
            ExecutionOutcome::Success { duration, .. }
            | ExecutionOutcome::Failure { duration, .. } => *duration,
        }
    }

    /// True for [`ExecutionOutcome::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Success { .. })
    }
}

#[derive(Debug)]
struct AgentRuntime {
    status: AgentStatus,
    current_tasks: BTreeSet<Uuid>,
    metrics: AgentMetrics,
}

impl AgentRuntime {
    fn sync_status(&mut self) {
        if self.status.is_available() {
            self.status = if self.current_tasks.is_empty() {
                AgentStatus::Idle
            } else {
                AgentStatus::Busy
            };
        }
    }
}

/// A stateful worker with a fixed capability set and concurrency limit.
///
/// The runtime state sits behind a short-lived lock that is never held
/// across an await point.
#[derive(Debug)]
pub struct Agent {
    id: Uuid,
    kind: AgentKind,
    name: String,
    capabilities: BTreeSet<String>,
    max_concurrent: usize,
    priority_weight: f64,
    state: Mutex<AgentRuntime>,
}

impl Agent {
    /// New idle agent with a fresh id. A zero limit is raised to one.
    pub fn new<I, S>(
        kind: AgentKind,
        name: impl Into<String>,
        capabilities: I,
        max_concurrent: usize,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: Uuid::new_v4(),
            kind,
            name: name.into(),
            capabilities: capabilities.into_iter().map(Into::into).collect(),
            max_concurrent: max_concurrent.max(1),
            priority_weight: 1.0,
            state: Mutex::new(AgentRuntime {
                status: AgentStatus::Idle,
                current_tasks: BTreeSet::new(),
                metrics: AgentMetrics::default(),
            }),
        }
    }

    /// Set the matcher tie-break weight.
    pub fn with_priority_weight(mut self, weight: f64) -> Self {
        self.priority_weight = weight;
        self
    }

    /// Unique agent id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Agent type.
    pub fn kind(&self) -> AgentKind {
        self.kind
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Capabilities this agent holds.
    pub fn capabilities(&self) -> &BTreeSet<String> {
        &self.capabilities
    }

    /// Concurrency limit.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Current status.
    pub fn status(&self) -> AgentStatus {
        self.state.lock().status
    }

    /// Tasks currently holding a slot.
    pub fn current_load(&self) -> usize {
        self.state.lock().current_tasks.len()
    }

    /// Snapshot of the running metrics.
    pub fn metrics(&self) -> AgentMetrics {
        self.state.lock().metrics.clone()
    }

    /// Current success rate in `(0, 1]`.
    pub fn success_rate(&self) -> f64 {
        self.state.lock().metrics.success_rate
    }

    /// True iff every required capability is held. No partial credit.
    pub fn can_handle(&self, required: &BTreeSet<String>) -> bool {
        required.is_subset(&self.capabilities)
    }

    /// `load / max * (1 / success_rate)`; lower is better.
    pub fn load_score(&self) -> f64 {
        let state = self.state.lock();
        let load = state.current_tasks.len() as f64 / self.max_concurrent as f64;
        load / state.metrics.success_rate
    }

    /// Whether another task fits under the concurrency limit.
    pub fn has_capacity(&self) -> bool {
        self.state.lock().current_tasks.len() < self.max_concurrent
    }

    /// Claim a load slot for `task_id` ahead of execution.
    ///
    /// Fails when the agent is Offline/Error or already at its limit.
    pub fn reserve(&self, task_id: Uuid) -> bool {
        let mut state = self.state.lock();
        if !state.status.is_available() {
            return false;
        }
        if !state.current_tasks.contains(&task_id)
            && state.current_tasks.len() >= self.max_concurrent
        {
            return false;
        }
        state.current_tasks.insert(task_id);
        state.sync_status();
        true
    }

    /// Drop `task_id` from the current load.
    pub fn release(&self, task_id: Uuid) {
        let mut state = self.state.lock();
        state.current_tasks.remove(&task_id);
        state.sync_status();
    }

    /// Impose Offline/Error, or lift it with Idle/Busy (which then follow load).
    pub fn set_status(&self, status: AgentStatus) {
        let mut state = self.state.lock();
        state.status = status;
        state.sync_status();
    }

    /// Point-in-time view of identity, load and metrics.
    pub fn summary(&self) -> AgentSummary {
        let state = self.state.lock();
        AgentSummary {
            id: self.id,
            name: self.name.clone(),
            agent_type: self.kind,
            status: state.status,
            capabilities: self.capabilities.clone(),
            current_load: state.current_tasks.len(),
            current_tasks: state.current_tasks.iter().copied().collect(),
            max_concurrent_tasks: self.max_concurrent,
            priority_weight: self.priority_weight,
            metrics: state.metrics.clone(),
        }
    }

    /// Run `task` through this agent's kind-specific processing.
    ///
    /// Processing runs on its own tokio task so a panic surfaces as a
    /// `Failure`. With `timeout` set, processing that outlives it is aborted
    /// and reported as a `Failure`. The task id leaves the current load on
    /// every exit path, including cancellation of this future.
    pub async fn execute_task(
        &self,
        task: Task,
        inference: Arc<dyn InferenceBackend>,
        timeout: Option<Duration>,
    ) -> ExecutionOutcome {
        let task_id = task.id;
        {
            let mut state = self.state.lock();
            state.current_tasks.insert(task_id);
            state.sync_status();
            state.metrics.last_active = Utc::now();
        }

        let started = Instant::now();
        let kind = self.kind;
        let handle = tokio::spawn(async move { kind.process(&task, inference.as_ref()).await });
        let guard = LoadGuard {
            agent: self,
            task_id,
            abort: Some(handle.abort_handle()),
        };

        let joined = match timeout {
            Some(limit) => match tokio::time::timeout(limit, handle).await {
                Ok(joined) => Some(joined),
                Err(_) => None,
            },
            None => Some(handle.await),
        };
        let duration = started.elapsed();

        let outcome = match joined {
            Some(Ok(Ok(value))) => ExecutionOutcome::Success { value, duration },
            Some(Ok(Err(e))) => ExecutionOutcome::Failure {
                error: e.to_string(),
                duration,
            },
            Some(Err(join_err)) => ExecutionOutcome::Failure {
                error: format!("agent processing aborted: {join_err}"),
                duration,
            },
            None => ExecutionOutcome::Failure {
                error: format!("timed out after {:.1}s", duration.as_secs_f64()),
                duration,
            },
        };

        self.record(&outcome);
        match &outcome {
            ExecutionOutcome::Success { .. } => {
                debug!(
                    agent = %self.name,
                    task_id = %task_id,
                    secs = duration.as_secs_f64(),
                    "Task processed"
                );
            }
            ExecutionOutcome::Failure { error, .. } => {
                warn!(
                    agent = %self.name,
                    task_id = %task_id,
                    error = %error,
                    "Task processing failed"
                );
            }
        }
        drop(guard);
        outcome
    }

    fn record(&self, outcome: &ExecutionOutcome) {
        let mut state = self.state.lock();
        let metrics = &mut state.metrics;
        match outcome {
            ExecutionOutcome::Success { duration, .. } => {
                metrics.tasks_completed += 1;
                let n = metrics.tasks_completed as f64;
                metrics.average_completion_time =
                    (metrics.average_completion_time * (n - 1.0) + duration.as_secs_f64()) / n;
            }
            ExecutionOutcome::Failure { .. } => {
                metrics.success_rate *= FAILURE_DECAY;
            }
        }
        metrics.last_active = Utc::now();
    }
}

/// Releases the load slot and stops processing when execution ends.
struct LoadGuard<'a> {
    agent: &'a Agent,
    task_id: Uuid,
    abort: Option<AbortHandle>,
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        if let Some(abort) = self.abort.take() {
            abort.abort();
        }
        self.agent.release(self.task_id);
    }
}
