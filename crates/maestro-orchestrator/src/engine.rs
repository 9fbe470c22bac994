use crate::collaboration::{
    CollaborationBroker, CollaborationOutcome, CollaborationRequest, CollaborationSession,
};
use crate::config::PlatformConfig;
use crate::conflict::{self, ConflictContext, ConflictResolution};
use crate::decomposer::{self, Decomposition};
use crate::matcher;
use crate::monitor::SystemMetrics;
use crate::persistence::PersistenceHandle;
use crate::pool::AgentPool;
use crate::synthesizer;
use crate::task_queue::TaskQueue;
use crate::types::{AgentSummary, SystemStatus};
use chrono::Utc;
use maestro_agent::{Agent, AgentRegistry, AgentStatus, ExecutionOutcome, InferenceBackend};
use maestro_core::{
    MaestroError, MaestroResult, Message, MessageType, Task, TaskRequest, TaskStatus,
};
use maestro_store::TaskStore;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, RwLock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Mutable engine state. Every logical mutation happens under one write lock
/// and no lock is held across inference or agent execution.
#[derive(Default)]
struct EngineState {
    tasks: HashMap<Uuid, Task>,
    queue: TaskQueue,
    messages: VecDeque<Message>,
    collaborations: CollaborationBroker,
    metrics: SystemMetrics,
    /// Parents whose synthesis is running.
    synthesizing: HashSet<Uuid>,
}

/// Dispatched executions that have not finished yet.
#[derive(Default)]
struct Inflight {
    count: AtomicUsize,
    idle: Notify,
}

struct InflightGuard(Arc<Inflight>);

impl InflightGuard {
    fn new(inflight: Arc<Inflight>) -> Self {
        inflight.count.fetch_add(1, Ordering::SeqCst);
        Self(inflight)
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// The orchestration engine.
///
/// Accepts tasks, decomposes the complex ones, matches work to agents
/// through a FIFO queue, retries failures, synthesizes parent results, and
/// brokers collaboration between agents. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Orchestrator {
    config: Arc<PlatformConfig>,
    pool: Arc<AgentPool>,
    registry: Arc<AgentRegistry>,
    inference: Arc<dyn InferenceBackend>,
    state: Arc<RwLock<EngineState>>,
    persistence: PersistenceHandle,
    inflight: Arc<Inflight>,
}

/// Builder for [`Orchestrator`].
pub struct OrchestratorBuilder {
    inference: Arc<dyn InferenceBackend>,
    config: PlatformConfig,
    registry: AgentRegistry,
    agents: Option<Vec<Agent>>,
    store: Option<Arc<dyn TaskStore>>,
}

impl OrchestratorBuilder {
    /// Engine tunables.
    pub fn config(mut self, config: PlatformConfig) -> Self {
        self.config = config;
        self
    }

    /// Agent types and task categories. Agents are built from it unless
    /// [`OrchestratorBuilder::agents`] supplies them directly.
    pub fn registry(mut self, registry: AgentRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Use these agents instead of building them from the registry.
    pub fn agents(mut self, agents: Vec<Agent>) -> Self {
        self.agents = Some(agents);
        self
    }

    /// Persist tasks and messages to `store` and restore from it on build.
    pub fn store(mut self, store: Arc<dyn TaskStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Build the engine, restoring tasks and messages from the store if one
    /// was given. Must be called within a tokio runtime.
    pub async fn build(self) -> MaestroResult<Orchestrator> {
        let pool = match self.agents {
            Some(agents) => AgentPool::new(agents),
            None => AgentPool::from_registry(&self.registry)?,
        };
        info!(agents = pool.len(), "Agent pool ready");

        let mut state = EngineState::default();
        let mut interrupted = Vec::new();
        let persistence = match self.store {
            Some(store) => {
                match store.load_all().await {
                    Ok(snapshot) => {
                        interrupted =
                            restore(&mut state, snapshot.tasks, snapshot.messages, &self.config);
                        info!(
                            tasks = state.tasks.len(),
                            queued = state.queue.len(),
                            messages = state.messages.len(),
                            "Restored engine state from store"
                        );
                    }
                    Err(e) => warn!(error = %e, "Failed to load store, starting empty"),
                }
                PersistenceHandle::spawn(store)
            }
            None => PersistenceHandle::disabled(),
        };
        for id in &interrupted {
            if let Some(task) = state.tasks.get(id) {
                persistence.task(task);
            }
        }
        let waiting_parents: Vec<Uuid> = state
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::InProgress && t.is_composite())
            .map(|t| t.id)
            .collect();
        debug!(
            persistent = persistence.is_enabled(),
            "Persistence configured"
        );

        let engine = Orchestrator {
            config: Arc::new(self.config),
            pool: Arc::new(pool),
            registry: Arc::new(self.registry),
            inference: self.inference,
            state: Arc::new(RwLock::new(state)),
            persistence,
            inflight: Arc::new(Inflight::default()),
        };
        for parent in waiting_parents {
            engine.check_parent_completion(parent).await;
        }
        engine.schedule().await;
        Ok(engine)
    }
}

/// Load stored tasks and messages into `state`.
///
/// Leaf tasks a previous run left Assigned or InProgress have no agent behind
/// them any more; they go back to Pending and their ids are returned.
fn restore(
    state: &mut EngineState,
    mut tasks: Vec<Task>,
    messages: Vec<Message>,
    config: &PlatformConfig,
) -> Vec<Uuid> {
    tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    let mut interrupted = Vec::new();
    for mut task in tasks {
        state.metrics.total_tasks += 1;
        if task.status.is_active() && !task.is_composite() {
            match task.requeue_interrupted() {
                Ok(()) => {
                    warn!(task_id = %task.id, title = %task.title, "Requeueing interrupted task");
                    interrupted.push(task.id);
                }
                Err(e) => warn!(task_id = %task.id, error = %e, "Cannot requeue interrupted task"),
            }
        }
        match task.status {
            TaskStatus::Completed => state.metrics.completed_tasks += 1,
            TaskStatus::Failed => state.metrics.failed_tasks += 1,
            TaskStatus::Pending if !task.is_composite() => state.queue.push(task.id),
            _ => {}
        }
        state.tasks.insert(task.id, task);
    }
    let skip = messages.len().saturating_sub(config.message_log_capacity);
    state.messages.extend(messages.into_iter().skip(skip));
    interrupted
}

impl Orchestrator {
    /// Start configuring an engine around `inference`.
    pub fn builder(inference: Arc<dyn InferenceBackend>) -> OrchestratorBuilder {
        OrchestratorBuilder {
            inference,
            config: PlatformConfig::default(),
            registry: AgentRegistry::default(),
            agents: None,
            store: None,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    /// The agent pool.
    pub fn pool(&self) -> &AgentPool {
        &self.pool
    }

    // --- Submission & decomposition ---

    /// Accept a new task and start working on it.
    ///
    /// Returns once the task (and any subtasks) has been queued; execution
    /// continues in the background.
    pub async fn submit_task(&self, request: TaskRequest) -> MaestroResult<Uuid> {
        request.validate()?;
        let task = self.prepare(request).into_task();
        let id = task.id;
        info!(
            task_id = %id,
            title = %task.title,
            task_type = %task.task_type,
            "Task submitted"
        );
        {
            let mut state = self.state.write().await;
            state.metrics.total_tasks += 1;
            self.persistence.task(&task);
            state.tasks.insert(id, task);
        }
        self.admit(id).await;
        Ok(id)
    }

    /// Fill in category capabilities when the request names none.
    fn prepare(&self, mut request: TaskRequest) -> TaskRequest {
        if request.required_capabilities.is_empty() {
            if let Some(caps) = self.registry.category_capabilities(&request.task_type) {
                request.required_capabilities = caps.clone();
            }
        }
        request
    }

    /// Assess `root` and every subtask it spawns, queueing the atomic ones.
    async fn admit(&self, root: Uuid) {
        let mut worklist = VecDeque::from([root]);
        while let Some(id) = worklist.pop_front() {
            let Some(task) = self.state.read().await.tasks.get(&id).cloned() else {
                continue;
            };
            match decomposer::decompose(self.inference.as_ref(), &task, &self.config).await {
                Decomposition::Atomic => {
                    self.enqueue(id).await;
                    self.schedule().await;
                }
                Decomposition::Composite(requests) => {
                    let children = self.attach_subtasks(id, requests).await;
                    if children.is_empty() {
                        self.enqueue(id).await;
                        self.schedule().await;
                    }
                    worklist.extend(children);
                }
            }
        }
    }

    async fn enqueue(&self, id: Uuid) {
        let mut state = self.state.write().await;
        let pending = state
            .tasks
            .get(&id)
            .is_some_and(|t| t.status == TaskStatus::Pending);
        if pending && !state.queue.contains(id) {
            state.queue.push(id);
            debug!(task_id = %id, queued = state.queue.len(), "Task queued");
        }
    }

    /// Create the subtasks of `parent_id` and hand the parent off to them.
    /// Returns the new child ids; empty when the parent could not be handed off.
    async fn attach_subtasks(&self, parent_id: Uuid, requests: Vec<TaskRequest>) -> Vec<Uuid> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let Some(parent) = state.tasks.get_mut(&parent_id) else {
            return Vec::new();
        };
        if let Err(e) = parent.transition(TaskStatus::InProgress) {
            warn!(task_id = %parent_id, error = %e, "Cannot hand task off to subtasks");
            return Vec::new();
        }

        let children: Vec<Task> = requests
            .into_iter()
            .map(|request| self.prepare(request).into_task().with_parent(parent))
            .collect();
        let ids: Vec<Uuid> = children.iter().map(|c| c.id).collect();
        parent.children.extend(ids.iter().copied());
        self.persistence.task(parent);

        for child in children {
            state.metrics.total_tasks += 1;
            self.persistence.task(&child);
            state.tasks.insert(child.id, child);
        }
        info!(task_id = %parent_id, subtasks = ids.len(), "Task decomposed");
        ids
    }

    // --- Scheduling & execution ---

    /// Drain the queue head-first, assigning tasks until one finds no agent.
    async fn schedule(&self) {
        let mut assignments = Vec::new();
        {
            let mut guard = self.state.write().await;
            let state = &mut *guard;
            while let Some(id) = state.queue.pop() {
                let Some(task) = state.tasks.get_mut(&id) else {
                    continue;
                };
                if task.status != TaskStatus::Pending {
                    continue;
                }
                let Some((agent, score)) =
                    matcher::find_best_agent(&self.pool, &task.required_capabilities)
                else {
                    state.queue.push(id);
                    debug!(
                        task_id = %id,
                        queued = state.queue.len(),
                        "No agent available"
                    );
                    break;
                };
                if !agent.reserve(id) {
                    state.queue.push(id);
                    break;
                }
                if let Err(e) = task.transition(TaskStatus::Assigned) {
                    agent.release(id);
                    warn!(task_id = %id, error = %e, "Cannot assign task");
                    continue;
                }
                task.assigned_agent = Some(agent.id());
                self.persistence.task(task);
                info!(
                    task_id = %id,
                    agent_id = %agent.id(),
                    agent = %agent.name(),
                    score = score.total,
                    "Task assigned"
                );
                assignments.push((id, agent.clone()));
            }
        }
        for (id, agent) in assignments {
            self.spawn_dispatch(id, agent);
        }
    }

    fn spawn_dispatch(&self, task_id: Uuid, agent: Arc<Agent>) {
        let guard = InflightGuard::new(self.inflight.clone());
        let engine = self.clone();
        tokio::spawn(async move {
            engine.dispatch(task_id, agent).await;
            drop(guard);
        });
    }

    async fn dispatch(&self, task_id: Uuid, agent: Arc<Agent>) {
        let started = {
            let mut state = self.state.write().await;
            let mut started = None;
            if let Some(task) = state.tasks.get_mut(&task_id) {
                match task.transition(TaskStatus::InProgress) {
                    Ok(()) => {
                        self.persistence.task(task);
                        started = Some(task.clone());
                    }
                    Err(e) => warn!(task_id = %task_id, error = %e, "Cannot start task"),
                }
            }
            started
        };

        if let Some(task) = started {
            let outcome = agent
                .execute_task(task, self.inference.clone(), self.config.task_timeout())
                .await;
            self.record_outcome(task_id, &agent, outcome).await;
        } else {
            agent.release(task_id);
        }
        self.schedule().await;
    }

    async fn record_outcome(&self, task_id: Uuid, agent: &Agent, outcome: ExecutionOutcome) {
        let secs = outcome.duration().as_secs_f64();
        debug!(
            task_id = %task_id,
            agent = %agent.name(),
            success = outcome.is_success(),
            secs,
            "Execution finished"
        );
        let parent = {
            let mut guard = self.state.write().await;
            let state = &mut *guard;
            let Some(task) = state.tasks.get_mut(&task_id) else {
                return;
            };

            match outcome {
                ExecutionOutcome::Success { value, .. } => {
                    if let Err(e) = task.complete(value, Some(secs)) {
                        warn!(task_id = %task_id, error = %e, "Cannot complete task");
                        return;
                    }
                    self.persistence.task(task);
                    info!(task_id = %task_id, agent = %agent.name(), secs, "Task completed");
                    let parent = task.parent_id;
                    let notice = Message::new(
                        agent.id(),
                        MessageType::TaskResponse,
                        format!("Completed task '{}'", task.title),
                    )
                    .for_task(task_id);

                    state.metrics.completed_tasks += 1;
                    state.metrics.record_response(secs);
                    self.post(state, notice);
                    parent
                }
                ExecutionOutcome::Failure { error, .. } => {
                    if let Err(e) = task.fail(error.clone()) {
                        warn!(task_id = %task_id, error = %e, "Cannot fail task");
                        return;
                    }
                    state.metrics.failed_tasks += 1;

                    if task.retry_count < self.config.max_retries {
                        if let Err(e) = task.reset_for_retry() {
                            warn!(task_id = %task_id, error = %e, "Cannot reset task for retry");
                            return;
                        }
                        self.persistence.task(task);
                        warn!(
                            task_id = %task_id,
                            attempt = task.retry_count,
                            max_retries = self.config.max_retries,
                            error = %error,
                            "Task failed, retrying"
                        );
                        state.metrics.retried_tasks += 1;
                        state.queue.push(task_id);
                        return;
                    }

                    self.persistence.task(task);
                    error!(
                        task_id = %task_id,
                        retries = task.retry_count,
                        error = %error,
                        "Task failed permanently"
                    );
                    let parent = task.parent_id;
                    let notice = Message::new(
                        agent.id(),
                        MessageType::Error,
                        format!("Task '{}' failed: {error}", task.title),
                    )
                    .for_task(task_id);
                    self.post(state, notice);
                    self.fail_ancestors(state, task_id, parent);
                    return;
                }
            }
        };

        if let Some(parent_id) = parent {
            self.check_parent_completion(parent_id).await;
        }
    }

    /// Fail every InProgress ancestor of a permanently failed subtask.
    fn fail_ancestors(&self, state: &mut EngineState, failed: Uuid, mut parent: Option<Uuid>) {
        let mut cause = failed;
        while let Some(id) = parent {
            let Some(ancestor) = state.tasks.get_mut(&id) else {
                break;
            };
            if ancestor.status != TaskStatus::InProgress {
                break;
            }
            if ancestor.fail(format!("subtask {cause} failed")).is_err() {
                break;
            }
            self.persistence.task(ancestor);
            error!(task_id = %id, subtask = %cause, "Parent task failed");
            state.metrics.failed_tasks += 1;
            cause = id;
            parent = ancestor.parent_id;
        }
    }

    /// Synthesize `parent_id` once all of its children completed, then walk up.
    ///
    /// Running it again for a parent that already completed does nothing.
    async fn check_parent_completion(&self, parent_id: Uuid) {
        let mut next = Some(parent_id);
        while let Some(id) = next.take() {
            let ready = {
                let mut guard = self.state.write().await;
                let state = &mut *guard;
                let Some(parent) = state.tasks.get(&id) else {
                    return;
                };
                if parent.status != TaskStatus::InProgress
                    || !parent.is_composite()
                    || state.synthesizing.contains(&id)
                {
                    return;
                }

                let children: Vec<&Task> = parent
                    .children
                    .iter()
                    .filter_map(|child| state.tasks.get(child))
                    .collect();
                let done = children
                    .iter()
                    .filter(|c| c.status == TaskStatus::Completed)
                    .count();
                let total = parent.children.len();

                if done < total {
                    if let Some(parent) = state.tasks.get_mut(&id) {
                        parent.progress = 100.0 * done as f64 / total as f64;
                        self.persistence.task(parent);
                    }
                    debug!(task_id = %id, done, total, "Waiting for subtasks");
                    None
                } else {
                    let results: Vec<Value> = children
                        .iter()
                        .map(|c| c.result.clone().unwrap_or(Value::Null))
                        .collect();
                    let snapshot = parent.clone();
                    state.synthesizing.insert(id);
                    Some((snapshot, results))
                }
            };
            let Some((parent, results)) = ready else {
                return;
            };

            info!(task_id = %id, subtasks = results.len(), "All subtasks completed, synthesizing");
            let merged = synthesizer::synthesize(self.inference.as_ref(), &parent, &results).await;

            let mut guard = self.state.write().await;
            let state = &mut *guard;
            state.synthesizing.remove(&id);
            let Some(task) = state.tasks.get_mut(&id) else {
                return;
            };
            let secs = task
                .started_at
                .map(|at| (Utc::now() - at).num_milliseconds() as f64 / 1000.0);
            match task.complete(merged, secs) {
                Ok(()) => {
                    self.persistence.task(task);
                    info!(task_id = %id, "Parent task completed");
                    next = task.parent_id;
                    state.metrics.completed_tasks += 1;
                }
                Err(e) => {
                    warn!(task_id = %id, error = %e, "Parent changed state during synthesis");
                }
            }
        }
    }

    fn post(&self, state: &mut EngineState, message: Message) {
        debug!(
            message_id = %message.id,
            sender = %message.sender,
            kind = ?message.message_type,
            "Message posted"
        );
        self.persistence.message(&message);
        state.messages.push_back(message);
        while state.messages.len() > self.config.message_log_capacity {
            state.messages.pop_front();
        }
    }

    // --- Queries ---

    /// Snapshot of one task.
    pub async fn get_task(&self, id: Uuid) -> MaestroResult<Task> {
        self.state
            .read()
            .await
            .tasks
            .get(&id)
            .cloned()
            .ok_or(MaestroError::TaskNotFound(id))
    }

    /// Tasks newest first, optionally filtered by status.
    pub async fn list_tasks(&self, status: Option<TaskStatus>, limit: usize) -> Vec<Task> {
        let state = self.state.read().await;
        let mut tasks: Vec<&Task> = state
            .tasks
            .values()
            .filter(|t| match status {
                Some(wanted) => t.status == wanted,
                None => true,
            })
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tasks.into_iter().take(limit).cloned().collect()
    }

    /// Summaries of every agent, in pool order.
    pub fn list_agents(&self) -> Vec<AgentSummary> {
        self.pool.agents().iter().map(|a| a.summary()).collect()
    }

    /// Current counters.
    pub async fn metrics(&self) -> SystemMetrics {
        self.state.read().await.metrics.snapshot(&self.pool)
    }

    /// Tasks, queue, agents, collaborations and recent messages in one view.
    pub async fn system_status(&self) -> SystemStatus {
        let state = self.state.read().await;
        SystemStatus {
            metrics: state.metrics.snapshot(&self.pool),
            active_tasks: state
                .tasks
                .values()
                .filter(|t| t.status.is_active())
                .count(),
            pending_tasks: state
                .tasks
                .values()
                .filter(|t| t.status == TaskStatus::Pending)
                .count(),
            queue_length: state.queue.len(),
            total_agents: self.pool.len(),
            agent_status: self.list_agents(),
            active_collaborations: state.collaborations.active_count(),
            recent_messages: last_n(&state.messages, self.config.recent_messages),
        }
    }

    /// The newest `limit` messages, oldest first.
    pub async fn messages(&self, limit: usize) -> Vec<Message> {
        last_n(&self.state.read().await.messages, limit)
    }

    // --- Agents ---

    /// Impose or lift Offline/Error on an agent. Lifting it may free work.
    pub async fn set_agent_status(
        &self,
        agent_id: Uuid,
        status: AgentStatus,
    ) -> MaestroResult<()> {
        let agent = self
            .pool
            .get(agent_id)
            .ok_or(MaestroError::AgentNotFound(agent_id))?;
        agent.set_status(status);
        info!(
            agent_id = %agent_id,
            agent = %agent.name(),
            status = ?status,
            "Agent status changed"
        );
        {
            let mut state = self.state.write().await;
            let notice = Message::new(
                agent_id,
                MessageType::StatusUpdate,
                format!("{} is now {:?}", agent.name(), agent.status()),
            );
            self.post(&mut state, notice);
        }
        self.schedule().await;
        Ok(())
    }

    // --- Collaboration & consensus ---

    /// Invite agents holding any of the requested capabilities to help.
    pub async fn request_collaboration(
        &self,
        request: CollaborationRequest,
    ) -> MaestroResult<CollaborationOutcome> {
        if self.pool.get(request.requester).is_none() {
            return Err(MaestroError::AgentNotFound(request.requester));
        }
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        if !state.tasks.contains_key(&request.task_id) {
            return Err(MaestroError::TaskNotFound(request.task_id));
        }
        let (outcome, invitations) = state.collaborations.open(&self.pool, &request);
        for invitation in invitations {
            self.post(state, invitation);
        }
        Ok(outcome)
    }

    /// Close a session. Closing twice is a no-op.
    pub async fn close_collaboration(&self, id: Uuid) -> MaestroResult<CollaborationSession> {
        let mut state = self.state.write().await;
        state.collaborations.close(id).cloned()
    }

    /// Session by id.
    pub async fn get_collaboration(&self, id: Uuid) -> Option<CollaborationSession> {
        self.state.read().await.collaborations.get(id).cloned()
    }

    /// Merge competing results for `task_id`. Never fails.
    pub async fn resolve_conflict(
        &self,
        task_id: Uuid,
        candidates: Vec<Value>,
    ) -> ConflictResolution {
        let (title, description) = match self.state.read().await.tasks.get(&task_id) {
            Some(task) => (task.title.clone(), task.description.clone()),
            None => {
                warn!(task_id = %task_id, "Resolving conflict for unknown task");
                (format!("Task {task_id}"), String::new())
            }
        };
        let context = ConflictContext {
            title: &title,
            description: &description,
        };
        let resolution = conflict::resolve(
            self.inference.as_ref(),
            context,
            &candidates,
            self.config.consensus_threshold,
        )
        .await;
        info!(
            task_id = %task_id,
            confidence = resolution.confidence,
            accepted = resolution.accepted,
            "Conflict resolution finished"
        );
        resolution
    }

    // --- Lifecycle ---

    /// Wait until no dispatched execution is running.
    ///
    /// Tasks left queued for lack of an agent do not keep this waiting.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inflight.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.inflight.count.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Let running work finish and flush pending store writes.
    pub async fn shutdown(&self) {
        self.wait_idle().await;
        self.persistence.flush().await;
        info!("Orchestrator stopped");
    }
}

fn last_n(messages: &VecDeque<Message>, n: usize) -> Vec<Message> {
    let skip = messages.len().saturating_sub(n);
    messages.iter().skip(skip).cloned().collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use maestro_agent::AgentKind;

    /// Splits the "Report" task in two; every other call echoes.
    struct Planner;

    #[async_trait]
    impl InferenceBackend for Planner {
        async fn infer(&self, _system: Option<&str>, prompt: &str) -> MaestroResult<String> {
            if prompt.starts_with("Analyze this task") {
                let split = prompt.contains("Title: Report");
                return Ok(format!("{{\"needs_decomposition\": {split}}}"));
            }
            if prompt.starts_with("Decompose") {
                return Ok(r#"[
                    {"title": "Gather", "required_capabilities": ["web_research"]},
                    {"title": "Write", "required_capabilities": ["creative_writing"]}
                ]"#
                .into());
            }
            if prompt.starts_with("Synthesize") {
                return Ok("merged report".into());
            }
            Ok("done".into())
        }
    }

    async fn engine() -> Orchestrator {
        Orchestrator::builder(Arc::new(Planner))
            .agents(vec![
                Agent::new(AgentKind::Research, "researcher", ["web_research"], 1),
                Agent::new(AgentKind::Creative, "writer", ["creative_writing"], 1),
            ])
            .build()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_parent_completion_check_is_idempotent() {
        let engine = engine().await;
        let id = engine
            .submit_task(TaskRequest::new("Report", "Quarterly report"))
            .await
            .unwrap();
        engine.wait_idle().await;

        let parent = engine.get_task(id).await.unwrap();
        assert_eq!(parent.status, TaskStatus::Completed);
        assert_eq!(parent.result, Some(Value::String("merged report".into())));
        let completed = engine.metrics().await.completed_tasks;
        assert_eq!(completed, 3);

        engine.check_parent_completion(id).await;
        engine.check_parent_completion(id).await;
        let again = engine.get_task(id).await.unwrap();
        assert_eq!(again.completed_at, parent.completed_at);
        assert_eq!(again.history.len(), parent.history.len());
        assert_eq!(engine.metrics().await.completed_tasks, completed);
    }

    #[tokio::test]
    async fn test_category_capabilities_are_inherited() {
        let engine = Orchestrator::builder(Arc::new(Planner))
            .build()
            .await
            .unwrap();
        let id = engine
            .submit_task(
                TaskRequest::new("Translate", "Into French").with_type("communication_task"),
            )
            .await
            .unwrap();
        engine.wait_idle().await;

        let task = engine.get_task(id).await.unwrap();
        assert!(task.required_capabilities.contains("translation"));
        assert_eq!(task.status, TaskStatus::Completed);
        let agent = engine.pool().get(task.assigned_agent.unwrap()).unwrap();
        assert_eq!(agent.kind(), AgentKind::Communication);
    }

    #[tokio::test]
    async fn test_message_log_is_bounded() {
        let engine = Orchestrator::builder(Arc::new(Planner))
            .config(PlatformConfig {
                message_log_capacity: 2,
                ..PlatformConfig::default()
            })
            .agents(vec![Agent::new(
                AgentKind::Research,
                "researcher",
                ["web_research"],
                1,
            )])
            .build()
            .await
            .unwrap();
        let agent = engine.list_agents()[0].id;
        for status in [AgentStatus::Offline, AgentStatus::Idle, AgentStatus::Error] {
            engine.set_agent_status(agent, status).await.unwrap();
        }
        let messages = engine.messages(10).await;
        assert_eq!(messages.len(), 2);
        assert!(messages[0].content.ends_with("Idle"));
        assert!(messages[1].content.ends_with("Error"));
    }

    #[tokio::test]
    async fn test_unknown_ids_are_reported() {
        let engine = engine().await;
        let missing = Uuid::new_v4();
        assert!(matches!(
            engine.get_task(missing).await,
            Err(MaestroError::TaskNotFound(id)) if id == missing
        ));
        assert!(matches!(
            engine.set_agent_status(missing, AgentStatus::Offline).await,
            Err(MaestroError::AgentNotFound(_))
        ));
        assert!(matches!(
            engine.close_collaboration(missing).await,
            Err(MaestroError::CollaborationNotFound(_))
        ));
        assert!(engine
            .submit_task(TaskRequest::new("", "no title"))
            .await
            .is_err());
    }
}
