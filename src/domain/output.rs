use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{OrchestrationError, OrchestrationResult};

/// Output from an agent's task execution
///
/// Created once per completed task and never mutated afterwards.
///
/// # Invariants
/// - `confidence` is within [0, 1]; enforced here at construction and not
///   re-validated anywhere else
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutput {
    pub id: Uuid,
    pub task_id: Uuid,
    pub agent_id: Uuid,
    pub result: Value,
    pub confidence: f32,
    pub timestamp: DateTime<Utc>,
    pub metadata: Value,
}

impl TaskOutput {
    /// Builds a task output, validating the confidence score
    ///
    /// # Returns
    /// * `Ok(TaskOutput)` - Output with a generated id and timestamp
    /// * `Err(OrchestrationError::Validation)` - If confidence is outside
    ///   [0, 1] or not a number
    pub fn new(
        task_id: Uuid,
        agent_id: Uuid,
        result: Value,
        confidence: f32,
        metadata: Value,
    ) -> OrchestrationResult<Self> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(OrchestrationError::Validation(format!(
                "confidence must be within [0, 1], got {confidence}"
            )));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            task_id,
            agent_id,
            result,
            confidence,
            timestamp: Utc::now(),
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_output_with_valid_confidence() {
        let task_id = Uuid::new_v4();
        let agent_id = Uuid::new_v4();

        let output = TaskOutput::new(task_id, agent_id, json!({"ok": true}), 0.9, json!({}))
            .unwrap();

        assert_eq!(output.task_id, task_id);
        assert_eq!(output.agent_id, agent_id);
        assert_eq!(output.confidence, 0.9);
    }

    #[test]
    fn confidence_bounds_are_inclusive() {
        assert!(TaskOutput::new(Uuid::new_v4(), Uuid::new_v4(), json!({}), 0.0, json!({})).is_ok());
        assert!(TaskOutput::new(Uuid::new_v4(), Uuid::new_v4(), json!({}), 1.0, json!({})).is_ok());
    }

    #[test]
    fn negative_confidence_fails() {
        let result = TaskOutput::new(Uuid::new_v4(), Uuid::new_v4(), json!({}), -0.1, json!({}));

        assert!(matches!(result, Err(OrchestrationError::Validation(_))));
    }

    #[test]
    fn confidence_above_one_fails() {
        let result = TaskOutput::new(Uuid::new_v4(), Uuid::new_v4(), json!({}), 1.5, json!({}));

        assert!(matches!(result, Err(OrchestrationError::Validation(_))));
    }

    #[test]
    fn nan_confidence_fails() {
        let result =
            TaskOutput::new(Uuid::new_v4(), Uuid::new_v4(), json!({}), f32::NAN, json!({}));

        assert!(matches!(result, Err(OrchestrationError::Validation(_))));
    }
}
