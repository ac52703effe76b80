use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{OrchestrationError, OrchestrationResult};

/// Kinds of events carried by the bus
///
/// This is a closed set: every notification in the core is one of these.
/// Agent lifecycle announcements reuse the task-started/task-completed
/// kinds rather than introducing dedicated variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A task was submitted to the orchestrator
    TaskCreated,
    /// An agent began working on a task (or announced activation)
    TaskStarted,
    /// An agent finished a task successfully
    TaskCompleted,
    /// An agent failed a task
    TaskFailed,
    /// A fault somewhere in the system (routing miss, handler fault)
    AgentError,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventType::TaskCreated => write!(f, "task_created"),
            EventType::TaskStarted => write!(f, "task_started"),
            EventType::TaskCompleted => write!(f, "task_completed"),
            EventType::TaskFailed => write!(f, "task_failed"),
            EventType::AgentError => write!(f, "agent_error"),
        }
    }
}

/// A single notification on the bus
///
/// Events are immutable once published: the bus hands out clones, never
/// references into its own history, and no mutator exists.
///
/// # Invariants
/// - `source` is never empty
/// - `payload` is always a JSON object
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    id: Uuid,
    event_type: EventType,
    timestamp: DateTime<Utc>,
    source: String,
    task_id: Option<Uuid>,
    payload: Value,
}

impl Event {
    /// Builds and validates an event
    ///
    /// # Returns
    /// * `Ok(Event)` - Event with a fresh id and timestamp
    /// * `Err(OrchestrationError::Validation)` - If the source is empty or
    ///   the payload is not a JSON object
    pub fn new(
        event_type: EventType,
        source: impl Into<String>,
        payload: Value,
        task_id: Option<Uuid>,
    ) -> OrchestrationResult<Self> {
        let source = source.into();
        if source.is_empty() {
            return Err(OrchestrationError::Validation(
                "event source cannot be empty".to_string(),
            ));
        }
        if !payload.is_object() {
            return Err(OrchestrationError::Validation(
                "event payload must be a JSON object".to_string(),
            ));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            event_type,
            timestamp: Utc::now(),
            source,
            task_id,
            payload,
        })
    }

    /// Returns the event's unique id
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the kind of event
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// Returns the publish timestamp
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the id of the component that published this event
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the task this event relates to, if any
    pub fn task_id(&self) -> Option<Uuid> {
        self.task_id
    }

    /// Returns the event payload
    pub fn payload(&self) -> &Value {
        &self.payload
    }
}
