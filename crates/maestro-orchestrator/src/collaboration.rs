use crate::pool::AgentPool;
use chrono::{DateTime, Utc};
use maestro_agent::AgentStatus;
use maestro_core::{MaestroError, MaestroResult, Message};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use tracing::info;
use uuid::Uuid;

/// Kind of help a collaboration asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollaborationKind {
    /// Help with the work itself.
    Assistance,
    /// Review of a result.
    Review,
    /// Agreement among several agents.
    Consensus,
}

impl fmt::Display for CollaborationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CollaborationKind::Assistance => "assistance",
            CollaborationKind::Review => "review",
            CollaborationKind::Consensus => "consensus",
        })
    }
}

/// Lifecycle of a [`CollaborationSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Open for messages.
    Active,
    /// Closed; kept for lookup.
    Closed,
}

/// An ad hoc channel between a requesting agent and its helpers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaborationSession {
    /// Session id.
    pub id: Uuid,
    /// Task the collaboration is about.
    pub task_id: Uuid,
    /// Agent that asked for help.
    pub requester: Uuid,
    /// Invited agents, in invitation order.
    pub participants: Vec<Uuid>,
    /// What kind of help was asked for.
    pub kind: CollaborationKind,
    /// Active until closed.
    pub status: SessionStatus,
    /// Messages sent within the session, oldest first.
    pub messages: Vec<Message>,
    /// Opening time.
    pub created_at: DateTime<Utc>,
    /// Set once closed.
    pub closed_at: Option<DateTime<Utc>>,
}

/// A request for help from peers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaborationRequest {
    /// Requesting agent; never invited to its own session.
    pub requester: Uuid,
    /// Task the help is for.
    pub task_id: Uuid,
    /// Capabilities a helper should hold; any one qualifies.
    pub required_capabilities: BTreeSet<String>,
    /// Kind of help.
    pub kind: CollaborationKind,
    /// Invitation text sent to every participant.
    pub message: String,
}

impl CollaborationRequest {
    /// Build a request; capabilities are deduplicated.
    pub fn new<I, S>(
        requester: Uuid,
        task_id: Uuid,
        required_capabilities: I,
        kind: CollaborationKind,
        message: impl Into<String>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            requester,
            task_id,
            required_capabilities: required_capabilities.into_iter().map(Into::into).collect(),
            kind,
            message: message.into(),
        }
    }
}

/// Result of [`CollaborationBroker::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "session_id")]
pub enum CollaborationOutcome {
    /// A session was opened with this id.
    Opened(Uuid),
    /// Nobody besides the requester holds any requested capability.
    NoAgentsAvailable,
}

impl CollaborationOutcome {
    /// Id of the opened session, if any.
    pub fn session_id(self) -> Option<Uuid> {
        match self {
            CollaborationOutcome::Opened(id) => Some(id),
            CollaborationOutcome::NoAgentsAvailable => None,
        }
    }
}

/// Owns every collaboration session.
#[derive(Debug, Default)]
pub struct CollaborationBroker {
    sessions: HashMap<Uuid, CollaborationSession>,
}

impl CollaborationBroker {
    /// Empty broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session for `request` and return the invitations to deliver.
    ///
    /// Participants are gathered capability by capability, each agent at most
    /// once, skipping the requester and Offline agents. Busy and Error agents
    /// are still invited.
    pub fn open(
        &mut self,
        pool: &AgentPool,
        request: &CollaborationRequest,
    ) -> (CollaborationOutcome, Vec<Message>) {
        let participants = find_participants(pool, request);
        if participants.is_empty() {
            info!(
                task_id = %request.task_id,
                requester = %request.requester,
                "No agents available for collaboration"
            );
            return (CollaborationOutcome::NoAgentsAvailable, Vec::new());
        }

        let session_id = Uuid::new_v4();
        let invitations: Vec<Message> = participants
            .iter()
            .map(|participant| {
                Message::collaboration(
                    request.requester,
                    *participant,
                    format!("Collaboration request: {}", request.message),
                )
                .for_task(request.task_id)
                .with_metadata("collaboration_id", session_id.to_string().into())
                .with_metadata("type", request.kind.to_string().into())
            })
            .collect();

        info!(
            collaboration_id = %session_id,
            task_id = %request.task_id,
            kind = %request.kind,
            participants = participants.len(),
            "Collaboration opened"
        );
        self.sessions.insert(
            session_id,
            CollaborationSession {
                id: session_id,
                task_id: request.task_id,
                requester: request.requester,
                participants,
                kind: request.kind,
                status: SessionStatus::Active,
                messages: invitations.clone(),
                created_at: Utc::now(),
                closed_at: None,
            },
        );
        (CollaborationOutcome::Opened(session_id), invitations)
    }

    /// Close a session. Closing twice is a no-op.
    pub fn close(&mut self, id: Uuid) -> MaestroResult<&CollaborationSession> {
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or(MaestroError::CollaborationNotFound(id))?;
        if session.status == SessionStatus::Active {
            session.status = SessionStatus::Closed;
            session.closed_at = Some(Utc::now());
            info!(collaboration_id = %id, "Collaboration closed");
        }
        Ok(session)
    }

    /// Session by id, open or closed.
    pub fn get(&self, id: Uuid) -> Option<&CollaborationSession> {
        self.sessions.get(&id)
    }

    /// Sessions still open.
    pub fn active_count(&self) -> usize {
        self.sessions
            .values()
            .filter(|s| s.status == SessionStatus::Active)
            .count()
    }

    /// All sessions ever opened.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// No session was ever opened.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

fn find_participants(pool: &AgentPool, request: &CollaborationRequest) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    let mut participants = Vec::new();
    for capability in &request.required_capabilities {
        for id in pool.agents_with(capability) {
            if *id == request.requester || seen.contains(id) {
                continue;
            }
            let online = pool
                .get(*id)
                .is_some_and(|agent| agent.status() != AgentStatus::Offline);
            if online {
                seen.insert(*id);
                participants.push(*id);
            }
        }
    }
    participants
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use maestro_agent::{Agent, AgentKind};
    use maestro_core::MessageType;

    fn pool() -> AgentPool {
        AgentPool::new(vec![
            Agent::new(AgentKind::Code, "coder", ["code_review", "debugging"], 2),
            Agent::new(AgentKind::Code, "reviewer", ["code_review"], 2),
            Agent::new(
                AgentKind::Research,
                "checker",
                ["fact_checking", "code_review"],
                2,
            ),
            Agent::new(AgentKind::Research, "sleeper", ["fact_checking"], 2),
        ])
    }

    #[test]
    fn test_participants_exclude_requester_offline_and_duplicates() {
        let pool = pool();
        let ids: Vec<Uuid> = pool.agents().iter().map(|a| a.id()).collect();
        pool.agents()[3].set_status(AgentStatus::Offline);
        pool.agents()[2].set_status(AgentStatus::Error);

        let mut broker = CollaborationBroker::new();
        let request = CollaborationRequest::new(
            ids[0],
            Uuid::new_v4(),
            ["code_review", "fact_checking"],
            CollaborationKind::Review,
            "Please review the patch",
        );
        let (outcome, invitations) = broker.open(&pool, &request);
        let session = broker.get(outcome.session_id().unwrap()).unwrap();

        assert_eq!(session.participants, vec![ids[1], ids[2]]);
        assert_eq!(session.status, SessionStatus::Active);
        assert_eq!(invitations.len(), 2);
        assert_eq!(session.messages.len(), 2);

        let first = &invitations[0];
        assert_eq!(first.message_type, MessageType::Collaboration);
        assert_eq!(first.receiver, Some(ids[1]));
        assert_eq!(
            first.content,
            "Collaboration request: Please review the patch"
        );
        assert_eq!(first.metadata["type"], "review");
        assert_eq!(
            first.metadata["collaboration_id"],
            session.id.to_string().as_str()
        );
    }

    #[test]
    fn test_unknown_capability_opens_nothing() {
        let pool = pool();
        let mut broker = CollaborationBroker::new();
        let request = CollaborationRequest::new(
            pool.agents()[0].id(),
            Uuid::new_v4(),
            ["translation"],
            CollaborationKind::Assistance,
            "help",
        );
        let (outcome, invitations) = broker.open(&pool, &request);
        assert_eq!(outcome, CollaborationOutcome::NoAgentsAvailable);
        assert!(invitations.is_empty());
        assert!(broker.is_empty());
    }

    #[test]
    fn test_close_is_idempotent() {
        let pool = pool();
        let mut broker = CollaborationBroker::new();
        let request = CollaborationRequest::new(
            pool.agents()[0].id(),
            Uuid::new_v4(),
            ["fact_checking"],
            CollaborationKind::Consensus,
            "agree?",
        );
        let id = broker.open(&pool, &request).0.session_id().unwrap();
        assert_eq!(broker.active_count(), 1);

        let closed_at = broker.close(id).unwrap().closed_at;
        assert!(closed_at.is_some());
        assert_eq!(broker.close(id).unwrap().closed_at, closed_at);
        assert_eq!(broker.active_count(), 0);
        assert!(matches!(
            broker.close(Uuid::new_v4()),
            Err(MaestroError::CollaborationNotFound(_))
        ));
    }
}
