use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{OrchestrationError, OrchestrationResult};

/// Represents the lifecycle status of an agent
///
/// # Status Transitions
/// ```text
/// Offline -> Idle -> Busy -> Idle
///                       └--> Error -> Busy
/// (any) -> Offline
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Not yet initialized, or shut down
    Offline,
    /// Initialized and ready for work
    Idle,
    /// Working on exactly one task
    Busy,
    /// Last task failed; still able to accept the next one
    Error,
}

impl AgentStatus {
    /// Checks if a transition from the current status to `next` is valid
    ///
    /// # Valid Transitions
    /// - Offline -> Idle (initialize)
    /// - Idle -> Busy, Error -> Busy (task start)
    /// - Busy -> Idle (task success)
    /// - Busy -> Error (task failure)
    /// - any -> Offline (shutdown)
    pub fn can_transition_to(&self, next: AgentStatus) -> bool {
        use AgentStatus::*;
        matches!(
            (self, next),
            (Offline, Idle)
                | (Idle, Busy)
                | (Error, Busy)
                | (Busy, Idle)
                | (Busy, Error)
                | (_, Offline)
        )
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentStatus::Offline => write!(f, "offline"),
            AgentStatus::Idle => write!(f, "idle"),
            AgentStatus::Busy => write!(f, "busy"),
            AgentStatus::Error => write!(f, "error"),
        }
    }
}

/// Identity and live state of a registered agent
///
/// The runtime exclusively owns its live descriptor; callers only ever see
/// cloned snapshots, so mutating a snapshot never affects the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub id: Uuid,
    pub name: String,
    pub agent_type: String,
    pub capabilities: Vec<String>,
    pub status: AgentStatus,
    pub last_activity: DateTime<Utc>,
    pub task_queue: Vec<Uuid>,
}

impl AgentDescriptor {
    /// Creates a descriptor for a not-yet-initialized agent
    pub fn new(
        name: impl Into<String>,
        agent_type: impl Into<String>,
        capabilities: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            agent_type: agent_type.into(),
            capabilities,
            status: AgentStatus::Offline,
            last_activity: Utc::now(),
            task_queue: Vec::new(),
        }
    }

    /// Checks whether this agent can serve the given capability tag
    ///
    /// Matches the agent type exactly or any declared capability,
    /// case-insensitively.
    pub fn supports(&self, tag: &str) -> bool {
        let tag = tag.to_lowercase();
        self.agent_type.to_lowercase() == tag
            || self
                .capabilities
                .iter()
                .any(|cap| cap.to_lowercase() == tag)
    }

    /// Moves the agent to `next`, refreshing the activity timestamp
    pub(crate) fn transition_to(&mut self, next: AgentStatus) -> OrchestrationResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(OrchestrationError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        self.last_activity = Utc::now();
        Ok(())
    }
}
