use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur in the orchestration core
#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not initialized: {0}")]
    NotInitialized(String),

    #[error("No suitable agent for task type: {0}")]
    NoSuitableAgent(String),

    #[error("Agent {agent_id} is busy and cannot accept task {task_id}")]
    AgentBusy { agent_id: Uuid, task_id: Uuid },

    #[error("Task execution failed: {0}")]
    Execution(String),

    #[error("Timed out after {timeout:?} waiting for task {task_id}")]
    Timeout { task_id: Uuid, timeout: Duration },

    #[error("Event handler fault: {0}")]
    HandlerFault(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}

pub type OrchestrationResult<T> = Result<T, OrchestrationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_display() {
        let err = OrchestrationError::Validation("payload must be an object".to_string());
        assert_eq!(err.to_string(), "Validation failed: payload must be an object");
    }

    #[test]
    fn busy_error_carries_both_ids() {
        let agent_id = Uuid::new_v4();
        let task_id = Uuid::new_v4();
        let err = OrchestrationError::AgentBusy { agent_id, task_id };

        let rendered = err.to_string();
        assert!(rendered.contains(&agent_id.to_string()));
        assert!(rendered.contains(&task_id.to_string()));
    }

    #[test]
    fn transition_error_names_both_states() {
        let err = OrchestrationError::InvalidTransition {
            from: "completed".to_string(),
            to: "pending".to_string(),
        };

        assert_eq!(
            err.to_string(),
            "Invalid state transition from completed to pending"
        );
    }
}
