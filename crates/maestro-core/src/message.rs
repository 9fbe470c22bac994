use crate::Metadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of inter-agent message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Asks an agent to take on work.
    TaskRequest,
    /// Reports the outcome of requested work.
    TaskResponse,
    /// Invitation to, or traffic within, a collaboration session.
    Collaboration,
    /// Agent or task status broadcast.
    StatusUpdate,
    /// Error report.
    Error,
}

/// An entry in the append-only inter-agent message log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier for this message.
    pub id: Uuid,
    /// Sending agent.
    pub sender: Uuid,
    /// Receiving agent; `None` means broadcast.
    pub receiver: Option<Uuid>,
    /// Task the message refers to, if any.
    pub task_id: Option<Uuid>,
    /// Kind of message.
    pub message_type: MessageType,
    /// Textual content.
    pub content: String,
    /// Arbitrary key-value metadata attached to the message.
    #[serde(default)]
    pub metadata: Metadata,
    /// UTC timestamp of when the message was created.
    pub timestamp: DateTime<Utc>,
    /// Whether the receiver has read it.
    #[serde(default)]
    pub is_read: bool,
}

impl Message {
    /// Creates a broadcast message from `sender`.
    pub fn new(sender: Uuid, message_type: MessageType, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
            receiver: None,
            task_id: None,
            message_type,
            content: content.into(),
            metadata: Metadata::new(),
            timestamp: Utc::now(),
            is_read: false,
        }
    }

    /// Creates a [`MessageType::Collaboration`] message directed at `receiver`.
    pub fn collaboration(sender: Uuid, receiver: Uuid, content: impl Into<String>) -> Self {
        Self::new(sender, MessageType::Collaboration, content).to(receiver)
    }

    /// Direct the message at a single receiver.
    pub fn to(mut self, receiver: Uuid) -> Self {
        self.receiver = Some(receiver);
        self
    }

    /// Reference a task.
    pub fn for_task(mut self, task_id: Uuid) -> Self {
        self.task_id = Some(task_id);
        self
    }

    /// Attach one metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Whether the message has no single receiver.
    pub fn is_broadcast(&self) -> bool {
        self.receiver.is_none()
    }
}
