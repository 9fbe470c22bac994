use crate::{MaestroError, MaestroResult, Metadata};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Lifecycle state of a [`Task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting in the scheduler queue (or freshly submitted).
    Pending,
    /// Matched to an agent, not yet started.
    Assigned,
    /// Executing on an agent, or handed off to subtasks.
    InProgress,
    /// Finished with a result.
    Completed,
    /// Finished with an error.
    Failed,
}

impl TaskStatus {
    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// `Failed -> Pending` is the retry edge. `Pending -> InProgress` is taken
    /// by a task that handed its work off to subtasks.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, Assigned)
                | (Pending, InProgress)
                | (Assigned, InProgress)
                | (InProgress, Completed)
                | (InProgress, Failed)
                | (Failed, Pending)
        )
    }

    /// Lowercase name used in logs and the store.
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Assigned => "assigned",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    /// Parse the name produced by [`TaskStatus::as_str`].
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TaskStatus::Pending),
            "assigned" => Some(TaskStatus::Assigned),
            "in_progress" => Some(TaskStatus::InProgress),
            "completed" => Some(TaskStatus::Completed),
            "failed" => Some(TaskStatus::Failed),
            _ => None,
        }
    }

    /// Assigned or InProgress.
    pub fn is_active(self) -> bool {
        matches!(self, TaskStatus::Assigned | TaskStatus::InProgress)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded status change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    /// Previous status.
    pub from: TaskStatus,
    /// New status.
    pub to: TaskStatus,
    /// When the change happened.
    pub at: DateTime<Utc>,
}

/// A unit of work tracked by the orchestrator.
///
/// Parent and agent references are plain ids; the orchestrator's task table
/// owns every task and the parent is responsible for its `children`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier.
    pub id: Uuid,
    /// Short human-readable title.
    pub title: String,
    /// Free-form description of the work.
    pub description: String,
    /// Category tag (e.g. `research_task`).
    pub task_type: String,
    /// Capabilities an agent must hold to run this task.
    pub required_capabilities: BTreeSet<String>,
    /// Stored and reported; scheduling is FIFO.
    pub priority: i32,
    /// Current lifecycle state.
    pub status: TaskStatus,
    /// Agent currently owning the task, if any.
    pub assigned_agent: Option<Uuid>,
    /// Parent task when this task was produced by decomposition.
    pub parent_id: Option<Uuid>,
    /// Subtasks in decomposition order.
    #[serde(default)]
    pub children: Vec<Uuid>,
    /// Decomposition depth (0 for submitted tasks).
    #[serde(default)]
    pub depth: u32,
    /// Present only when Completed.
    pub result: Option<serde_json::Value>,
    /// Present only when Failed.
    pub error: Option<String>,
    /// Number of retries granted so far.
    #[serde(default)]
    pub retry_count: u32,
    /// Completion percentage in `[0, 100]`.
    #[serde(default)]
    pub progress: f64,
    /// When the task was submitted.
    pub created_at: DateTime<Utc>,
    /// When the task was last assigned to an agent.
    pub assigned_at: Option<DateTime<Utc>>,
    /// When work last started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the task completed.
    pub completed_at: Option<DateTime<Utc>>,
    /// Optional soft deadline supplied at submission.
    pub deadline: Option<DateTime<Utc>>,
    /// Wall-clock duration of the successful execution, in seconds.
    pub duration_secs: Option<f64>,
    /// Opaque submitter metadata.
    #[serde(default)]
    pub metadata: Metadata,
    /// Ordered status changes.
    #[serde(default)]
    pub history: Vec<StatusChange>,
}

impl Task {
    /// Create a pending task with default type and priority.
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: description.into(),
            task_type: default_task_type(),
            required_capabilities: BTreeSet::new(),
            priority: default_priority(),
            status: TaskStatus::Pending,
            assigned_agent: None,
            parent_id: None,
            children: Vec::new(),
            depth: 0,
            result: None,
            error: None,
            retry_count: 0,
            progress: 0.0,
            created_at: Utc::now(),
            assigned_at: None,
            started_at: None,
            completed_at: None,
            deadline: None,
            duration_secs: None,
            metadata: Metadata::new(),
            history: Vec::new(),
        }
    }

    /// Set the required capabilities.
    pub fn with_capabilities<I, S>(mut self, caps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_capabilities = caps.into_iter().map(Into::into).collect();
        self
    }

    /// Set the category tag.
    pub fn with_type(mut self, task_type: impl Into<String>) -> Self {
        self.task_type = task_type.into();
        self
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Link this task under `parent` one level deeper.
    pub fn with_parent(mut self, parent: &Task) -> Self {
        self.parent_id = Some(parent.id);
        self.depth = parent.depth + 1;
        self
    }

    /// Move to `next`, stamping timestamps and recording history.
    pub fn transition(&mut self, next: TaskStatus) -> MaestroResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(MaestroError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        let now = Utc::now();
        match next {
            TaskStatus::Assigned => self.assigned_at = Some(now),
            TaskStatus::InProgress => self.started_at = Some(now),
            TaskStatus::Completed => {
                self.completed_at = Some(now);
                self.progress = 100.0;
            }
            TaskStatus::Failed | TaskStatus::Pending => {}
        }
        self.history.push(StatusChange {
            from: self.status,
            to: next,
            at: now,
        });
        self.status = next;
        Ok(())
    }

    /// InProgress -> Completed with `result`.
    pub fn complete(
        &mut self,
        result: serde_json::Value,
        duration_secs: Option<f64>,
    ) -> MaestroResult<()> {
        self.transition(TaskStatus::Completed)?;
        self.result = Some(result);
        self.error = None;
        self.duration_secs = duration_secs;
        Ok(())
    }

    /// InProgress -> Failed with `error`.
    pub fn fail(&mut self, error: impl Into<String>) -> MaestroResult<()> {
        self.transition(TaskStatus::Failed)?;
        self.result = None;
        self.error = Some(error.into());
        Ok(())
    }

    /// Failed -> Pending for a retry: bumps the counter and drops the owner.
    pub fn reset_for_retry(&mut self) -> MaestroResult<()> {
        self.transition(TaskStatus::Pending)?;
        self.retry_count += 1;
        self.assigned_agent = None;
        self.error = None;
        Ok(())
    }

    /// Return an Assigned/InProgress task whose run was cut short to Pending.
    ///
    /// The interruption is recorded as a pass through Failed. The retry
    /// counter is left alone.
    pub fn requeue_interrupted(&mut self) -> MaestroResult<()> {
        if self.status == TaskStatus::Assigned {
            self.transition(TaskStatus::InProgress)?;
        }
        self.transition(TaskStatus::Failed)?;
        self.transition(TaskStatus::Pending)?;
        self.assigned_agent = None;
        self.error = None;
        self.result = None;
        Ok(())
    }

    /// Whether the task was split into subtasks.
    pub fn is_composite(&self) -> bool {
        !self.children.is_empty()
    }

    /// Sequence of statuses the task has been in, starting with Pending.
    pub fn status_trail(&self) -> Vec<TaskStatus> {
        let mut trail = vec![self
            .history
            .first()
            .map_or(self.status, |change| change.from)];
        trail.extend(self.history.iter().map(|change| change.to));
        trail
    }
}

fn default_task_type() -> String {
    "general".to_string()
}

fn default_priority() -> i32 {
    1
}

/// Submission payload for a new task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    /// Short title; must not be blank.
    pub title: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Category tag.
    #[serde(default = "default_task_type")]
    pub task_type: String,
    /// Capabilities an agent must hold.
    #[serde(default)]
    pub required_capabilities: BTreeSet<String>,
    /// Stored priority.
    #[serde(default = "default_priority")]
    pub priority: i32,
    /// Optional soft deadline.
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    /// Opaque submitter metadata.
    #[serde(default)]
    pub metadata: Metadata,
}

impl TaskRequest {
    /// Request with only a title and description.
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            task_type: default_task_type(),
            required_capabilities: BTreeSet::new(),
            priority: default_priority(),
            deadline: None,
            metadata: Metadata::new(),
        }
    }

    /// Set the required capabilities.
    pub fn with_capabilities<I, S>(mut self, caps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_capabilities = caps.into_iter().map(Into::into).collect();
        self
    }

    /// Set the category tag.
    pub fn with_type(mut self, task_type: impl Into<String>) -> Self {
        self.task_type = task_type.into();
        self
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Reject blank titles.
    pub fn validate(&self) -> MaestroResult<()> {
        if self.title.trim().is_empty() {
            return Err(MaestroError::InvalidTask("title must not be empty".into()));
        }
        Ok(())
    }

    /// Build the pending task.
    pub fn into_task(self) -> Task {
        let mut task = Task::new(self.title, self.description)
            .with_type(self.task_type)
            .with_priority(self.priority);
        task.required_capabilities = self.required_capabilities;
        task.deadline = self.deadline;
        task.metadata = self.metadata;
        task
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let mut task = Task::new("t", "d");
        task.transition(TaskStatus::Assigned).unwrap();
        task.transition(TaskStatus::InProgress).unwrap();
        task
            .complete(serde_json::json!({"ok": true}), Some(0.5))
            .unwrap();

        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.assigned_at.is_some());
        assert!(task.started_at.is_some());
        assert!(task.completed_at.is_some());
        assert_eq!(task.progress, 100.0);
        assert_eq!(
            task.status_trail(),
            vec![
                TaskStatus::Pending,
                TaskStatus::Assigned,
                TaskStatus::InProgress,
                TaskStatus::Completed
            ]
        );
    }

    #[test]
    fn test_illegal_transition_rejected() {
        let mut task = Task::new("t", "d");
        let err = task.transition(TaskStatus::Completed).unwrap_err();
        assert!(matches!(
            err,
            MaestroError::InvalidTransition {
                from: TaskStatus::Pending,
                to: TaskStatus::Completed
            }
        ));
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.history.is_empty());
    }

    #[test]
    fn test_completed_is_terminal() {
        for next in [
            TaskStatus::Pending,
            TaskStatus::Assigned,
            TaskStatus::InProgress,
            TaskStatus::Failed,
        ] {
            assert!(!TaskStatus::Completed.can_transition_to(next));
        }
    }

    #[test]
    fn test_retry_resets_owner_and_error() {
        let mut task = Task::new("t", "d");
        task.assigned_agent = Some(Uuid::new_v4());
        task.transition(TaskStatus::Assigned).unwrap();
        task.transition(TaskStatus::InProgress).unwrap();
        task.fail("boom").unwrap();
        assert_eq!(task.error.as_deref(), Some("boom"));

        task.reset_for_retry().unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.retry_count, 1);
        assert!(task.assigned_agent.is_none());
        assert!(task.error.is_none());
    }

    #[test]
    fn test_requeue_interrupted_task() {
        let mut task = Task::new("t", "d");
        task.assigned_agent = Some(Uuid::new_v4());
        task.transition(TaskStatus::Assigned).unwrap();
        task.requeue_interrupted().unwrap();

        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.retry_count, 0);
        assert!(task.assigned_agent.is_none());
        assert!(task.error.is_none());
        assert_eq!(
            task.status_trail(),
            vec![
                TaskStatus::Pending,
                TaskStatus::Assigned,
                TaskStatus::InProgress,
                TaskStatus::Failed,
                TaskStatus::Pending
            ]
        );

        let mut done = Task::new("t", "d");
        done.transition(TaskStatus::Assigned).unwrap();
        done.transition(TaskStatus::InProgress).unwrap();
        done.complete(serde_json::json!(1), None).unwrap();
        assert!(done.requeue_interrupted().is_err());
    }

    #[test]
    fn test_with_parent_sets_depth() {
        let parent = Task::new("p", "d");
        let child = Task::new("c", "d").with_parent(&parent);
        assert_eq!(child.parent_id, Some(parent.id));
        assert_eq!(child.depth, 1);
    }

    #[test]
    fn test_status_parse_roundtrip_names() {
        for s in ["pending", "assigned", "in_progress", "completed", "failed"] {
            assert_eq!(TaskStatus::parse(s).unwrap().as_str(), s);
        }
        assert!(TaskStatus::parse("running").is_none());
    }

    #[test]
    fn test_request_defaults_from_json() {
        let req: TaskRequest = serde_json::from_value(serde_json::json!({
            "title": "Summarize",
            "required_capabilities": ["text_summarization", "text_summarization"]
        }))
        .unwrap();
        assert_eq!(req.task_type, "general");
        assert_eq!(req.priority, 1);
        assert_eq!(req.required_capabilities.len(), 1);

        let task = req.into_task();
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.result.is_none());
    }

    #[test]
    fn test_blank_title_rejected() {
        let err = TaskRequest::new("   ", "d").validate().unwrap_err();
        assert!(matches!(err, MaestroError::InvalidTask(_)));
    }
}
