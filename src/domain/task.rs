use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{OrchestrationError, OrchestrationResult};

/// Ordinal task priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Normal,
    High,
    Critical,
}

impl Default for TaskPriority {
    fn default() -> Self {
        TaskPriority::Normal
    }
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskPriority::Low => write!(f, "low"),
            TaskPriority::Normal => write!(f, "normal"),
            TaskPriority::High => write!(f, "high"),
            TaskPriority::Critical => write!(f, "critical"),
        }
    }
}

/// Represents the lifecycle status of a task
///
/// # Status Transitions
/// ```text
/// Pending -> Assigned -> Completed
///                 └----> Failed
/// ```
///
/// Status is monotonic: no transition ever moves backward. A pending task
/// that finds no matching agent simply stays pending (inspectable, not
/// dropped).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Submitted but not yet routed to an agent
    Pending,
    /// Routed to an agent which is (or was) working on it
    Assigned,
    /// Finished successfully; an output exists
    Completed,
    /// The assigned agent rejected or failed the task
    Failed,
}

impl TaskStatus {
    /// Checks if a transition from the current status to `next` is valid
    ///
    /// # Valid Transitions
    /// - Pending -> Assigned
    /// - Assigned -> Completed
    /// - Assigned -> Failed
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, Assigned) | (Assigned, Completed) | (Assigned, Failed)
        )
    }

    /// Returns true for Completed and Failed
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Assigned => write!(f, "assigned"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A unit of submitted work
///
/// The `task_type` tag is what routing rules match against. Status and
/// assignment are mutated only by the router, through the crate-private
/// transition methods below; everything else is fixed at submission.
///
/// # Invariants
/// - `task_type` is never empty
/// - `payload` is always a JSON object
/// - Status transitions follow [`TaskStatus::can_transition_to`]
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    id: Uuid,
    task_type: String,
    priority: TaskPriority,
    dependencies: Vec<Uuid>,
    payload: Value,
    created_at: DateTime<Utc>,
    assigned_agent_id: Option<Uuid>,
    status: TaskStatus,
}

impl Task {
    /// Builds and validates a task
    ///
    /// # Returns
    /// * `Ok(Task)` - New pending task with a generated id
    /// * `Err(OrchestrationError::Validation)` - If the type is empty or the
    ///   payload is not a JSON object
    pub fn new(
        task_type: impl Into<String>,
        payload: Value,
        priority: TaskPriority,
        dependencies: Vec<Uuid>,
    ) -> OrchestrationResult<Self> {
        let task_type = task_type.into();
        if task_type.is_empty() {
            return Err(OrchestrationError::Validation(
                "task type cannot be empty".to_string(),
            ));
        }
        if !payload.is_object() {
            return Err(OrchestrationError::Validation(
                "task payload must be a JSON object".to_string(),
            ));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            task_type,
            priority,
            dependencies,
            payload,
            created_at: Utc::now(),
            assigned_agent_id: None,
            status: TaskStatus::Pending,
        })
    }

    /// Marks the task as assigned to an agent
    pub(crate) fn assign(&mut self, agent_id: Uuid) -> OrchestrationResult<()> {
        self.transition_to(TaskStatus::Assigned)?;
        self.assigned_agent_id = Some(agent_id);
        Ok(())
    }

    /// Marks the task as completed
    pub(crate) fn complete(&mut self) -> OrchestrationResult<()> {
        self.transition_to(TaskStatus::Completed)
    }

    /// Marks the task as failed
    pub(crate) fn fail(&mut self) -> OrchestrationResult<()> {
        self.transition_to(TaskStatus::Failed)
    }

    fn transition_to(&mut self, next: TaskStatus) -> OrchestrationResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(OrchestrationError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }

    // ===== Getters =====

    /// Returns the task's id
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the routing type tag
    pub fn task_type(&self) -> &str {
        &self.task_type
    }

    /// Returns the task's priority
    pub fn priority(&self) -> TaskPriority {
        self.priority
    }

    /// Returns the ids of tasks this one depends on
    pub fn dependencies(&self) -> &[Uuid] {
        &self.dependencies
    }

    /// Returns the task payload
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Returns the submission timestamp
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the assigned agent, once routed
    pub fn assigned_agent_id(&self) -> Option<Uuid> {
        self.assigned_agent_id
    }

    /// Returns the task's current status
    pub fn status(&self) -> TaskStatus {
        self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_task() -> Task {
        Task::new(
            "data_validation",
            json!({"rows": 10}),
            TaskPriority::Normal,
            vec![],
        )
        .unwrap()
    }

    #[test]
    fn create_task_with_valid_type() {
        let task = sample_task();

        assert_eq!(task.task_type(), "data_validation");
        assert_eq!(task.status(), TaskStatus::Pending);
        assert_eq!(task.assigned_agent_id(), None);
        assert!(task.dependencies().is_empty());
    }

    #[test]
    fn create_task_with_empty_type_fails() {
        let result = Task::new("", json!({}), TaskPriority::Normal, vec![]);

        assert!(matches!(result, Err(OrchestrationError::Validation(_))));
    }

    #[test]
    fn create_task_with_array_payload_fails() {
        let result = Task::new("analysis", json!([1, 2]), TaskPriority::Normal, vec![]);

        assert!(matches!(result, Err(OrchestrationError::Validation(_))));
    }

    #[test]
    fn assign_then_complete() {
        let mut task = sample_task();
        let agent_id = Uuid::new_v4();

        task.assign(agent_id).unwrap();
        assert_eq!(task.status(), TaskStatus::Assigned);
        assert_eq!(task.assigned_agent_id(), Some(agent_id));

        task.complete().unwrap();
        assert_eq!(task.status(), TaskStatus::Completed);
    }

    #[test]
    fn assign_then_fail() {
        let mut task = sample_task();

        task.assign(Uuid::new_v4()).unwrap();
        task.fail().unwrap();

        assert_eq!(task.status(), TaskStatus::Failed);
    }

    #[test]
    fn complete_without_assignment_fails() {
        let mut task = sample_task();

        let result = task.complete();

        assert!(matches!(
            result,
            Err(OrchestrationError::InvalidTransition { .. })
        ));
        assert_eq!(task.status(), TaskStatus::Pending);
    }

    #[test]
    fn no_transition_moves_backward() {
        let mut task = sample_task();
        task.assign(Uuid::new_v4()).unwrap();
        task.complete().unwrap();

        assert!(task.fail().is_err());
        assert!(task.assign(Uuid::new_v4()).is_err());
        assert_eq!(task.status(), TaskStatus::Completed);
    }

    #[test]
    fn status_transition_table() {
        use TaskStatus::*;

        assert!(Pending.can_transition_to(Assigned));
        assert!(Assigned.can_transition_to(Completed));
        assert!(Assigned.can_transition_to(Failed));

        assert!(!Pending.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Failed));
        assert!(!Assigned.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Completed));
    }

    #[test]
    fn terminal_statuses() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Assigned.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
    }

    #[test]
    fn priority_ordering() {
        assert!(TaskPriority::Low < TaskPriority::Normal);
        assert!(TaskPriority::Normal < TaskPriority::High);
        assert!(TaskPriority::High < TaskPriority::Critical);
    }

    #[test]
    fn status_display() {
        assert_eq!(TaskStatus::Pending.to_string(), "pending");
        assert_eq!(TaskStatus::Assigned.to_string(), "assigned");
        assert_eq!(TaskStatus::Completed.to_string(), "completed");
        assert_eq!(TaskStatus::Failed.to_string(), "failed");
    }
}
