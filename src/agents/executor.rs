use async_trait::async_trait;

use crate::domain::{AgentDescriptor, EventType, Task, TaskOutput};
use crate::error::OrchestrationResult;

/// Execution capability implemented per agent variant
///
/// The runtime wraps every executor in the same lifecycle and event
/// sequence; the executor only decides what a task means and what its
/// output is. Failures are returned as error values, never panics — the
/// runtime re-raises them to the router after publishing the task-failed
/// event.
#[async_trait]
pub trait AgentExecutor: Send {
    /// Executes one task, returning its output or an error
    ///
    /// `agent` is the live descriptor of the runtime invoking this
    /// executor, provided so the output can be attributed to it.
    async fn execute(
        &mut self,
        agent: &AgentDescriptor,
        task: &Task,
    ) -> OrchestrationResult<TaskOutput>;

    /// Event types this agent wants to observe
    ///
    /// The runtime registers one subscription per entry at initialize and
    /// releases them all at shutdown.
    fn interests(&self) -> Vec<EventType> {
        Vec::new()
    }
}
