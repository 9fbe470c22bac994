#![allow(clippy::unwrap_used, clippy::expect_used)]

use maestro_core::{Task, TaskRequest, TaskStatus};

#[test]
fn retry_cycle_is_recorded_in_history() {
    let mut task = TaskRequest::new("Fix bug", "Crash on startup")
        .with_capabilities(["debugging"])
        .into_task();

    task.transition(TaskStatus::Assigned).unwrap();
    task.transition(TaskStatus::InProgress).unwrap();
    task.fail("agent crashed").unwrap();
    task.reset_for_retry().unwrap();
    task.transition(TaskStatus::Assigned).unwrap();
    task.transition(TaskStatus::InProgress).unwrap();
    task
        .complete(serde_json::json!("patched"), Some(1.25))
        .unwrap();

    assert_eq!(task.retry_count, 1);
    assert_eq!(
        task.status_trail(),
        vec![
            TaskStatus::Pending,
            TaskStatus::Assigned,
            TaskStatus::InProgress,
            TaskStatus::Failed,
            TaskStatus::Pending,
            TaskStatus::Assigned,
            TaskStatus::InProgress,
            TaskStatus::Completed,
        ]
    );
    assert_eq!(task.duration_secs, Some(1.25));
}

#[test]
fn decomposed_parent_hands_off_then_completes() {
    let mut parent = Task::new("Launch plan", "Research and write")
        .with_capabilities(["market_research", "content_creation", "forecasting"]);
    let child = Task::new("Research", "").with_parent(&parent);
    parent.children.push(child.id);

    parent.transition(TaskStatus::InProgress).unwrap();
    assert!(parent.is_composite());
    assert!(parent.assigned_at.is_none());

    parent
        .complete(serde_json::json!({"summary": "done"}), None)
        .unwrap();
    assert_eq!(
        parent.status_trail(),
        vec![
            TaskStatus::Pending,
            TaskStatus::InProgress,
            TaskStatus::Completed
        ]
    );
}

#[test]
fn task_survives_json_persistence() {
    let mut task = TaskRequest::new("Translate", "to Spanish")
        .with_type("communication_task")
        .with_priority(4)
        .with_capabilities(["translation"])
        .into_task();
    task.transition(TaskStatus::Assigned).unwrap();

    let json = serde_json::to_string(&task).unwrap();
    let restored: Task = serde_json::from_str(&json).unwrap();

    assert_eq!(restored.id, task.id);
    assert_eq!(restored.status, TaskStatus::Assigned);
    assert_eq!(restored.priority, 4);
    assert_eq!(restored.history.len(), 1);
    assert!(restored.required_capabilities.contains("translation"));
}
