use serde_json::json;
use uuid::Uuid;

use crate::bus::{EventBus, SubscriptionId};
use crate::domain::{AgentDescriptor, AgentStatus, EventType, Task, TaskOutput};
use crate::error::{OrchestrationError, OrchestrationResult};

use super::executor::AgentExecutor;

/// State machine wrapping an executor with event emission and fault capture
///
/// The runtime exclusively owns its descriptor (including the live task
/// queue); [`AgentRuntime::info`] hands out snapshots only.
///
/// # Concurrency
/// An agent processes exactly one task at a time. A second `process_task`
/// while busy is rejected immediately with `AgentBusy` — there is no
/// internal queueing discipline.
pub struct AgentRuntime {
    descriptor: AgentDescriptor,
    executor: Box<dyn AgentExecutor>,
    subscriptions: Vec<SubscriptionId>,
    initialized: bool,
}

impl AgentRuntime {
    /// Wraps an executor behind a fresh, offline descriptor
    pub fn new(descriptor: AgentDescriptor, executor: Box<dyn AgentExecutor>) -> Self {
        Self {
            descriptor,
            executor,
            subscriptions: Vec::new(),
            initialized: false,
        }
    }

    /// Returns the agent's id
    pub fn id(&self) -> Uuid {
        self.descriptor.id
    }

    /// Returns the agent's current status
    pub fn status(&self) -> AgentStatus {
        self.descriptor.status
    }

    /// Checks whether this agent can serve a capability tag
    pub fn supports(&self, tag: &str) -> bool {
        self.descriptor.supports(tag)
    }

    /// Returns an immutable snapshot of the descriptor
    ///
    /// Mutating the snapshot (including its task queue) never affects the
    /// runtime's internal state.
    pub fn info(&self) -> AgentDescriptor {
        self.descriptor.clone()
    }

    /// Brings the agent online: Offline -> Idle
    ///
    /// Registers the executor's interest subscriptions, then publishes an
    /// activation event. Every subsequent operation fails with
    /// `NotInitialized` until this has completed.
    pub fn initialize(&mut self, bus: &mut EventBus) -> OrchestrationResult<()> {
        if self.initialized {
            return Ok(());
        }

        self.descriptor.transition_to(AgentStatus::Idle)?;

        for event_type in self.executor.interests() {
            let name = self.descriptor.name.clone();
            let sub = bus.subscribe(
                event_type,
                Box::new(move |event| {
                    tracing::debug!(agent = %name, event = %event.event_type(), "observed event");
                    Ok(())
                }),
            );
            self.subscriptions.push(sub);
        }

        bus.publish(
            EventType::TaskStarted,
            self.descriptor.id.to_string(),
            json!({
                "message": "agent activated",
                "agent_name": self.descriptor.name,
                "agent_type": self.descriptor.agent_type,
            }),
            None,
        )?;

        self.initialized = true;
        tracing::info!(agent = %self.descriptor.name, id = %self.descriptor.id, "agent initialized");
        Ok(())
    }

    /// Executes one task, driving the full event sequence
    ///
    /// Transitions {Idle|Error} -> Busy, publishes task-started, awaits the
    /// executor, then either:
    /// - success: publishes task-completed carrying the output,
    ///   Busy -> Idle, returns the output, or
    /// - failure: publishes task-failed carrying the error message,
    ///   Busy -> Error, and re-raises the error to the caller. The fault is
    ///   never swallowed at this layer.
    pub async fn process_task(
        &mut self,
        task: &Task,
        bus: &mut EventBus,
    ) -> OrchestrationResult<TaskOutput> {
        if !self.initialized {
            return Err(OrchestrationError::NotInitialized(
                self.descriptor.name.clone(),
            ));
        }
        if self.descriptor.status == AgentStatus::Busy {
            return Err(OrchestrationError::AgentBusy {
                agent_id: self.descriptor.id,
                task_id: task.id(),
            });
        }

        self.descriptor.transition_to(AgentStatus::Busy)?;
        self.descriptor.task_queue.push(task.id());

        let source = self.descriptor.id.to_string();
        bus.publish(
            EventType::TaskStarted,
            source.clone(),
            json!({
                "task_type": task.task_type(),
                "agent_name": self.descriptor.name,
            }),
            Some(task.id()),
        )?;

        let outcome = self.executor.execute(&self.descriptor, task).await;
        self.descriptor.task_queue.retain(|id| *id != task.id());

        match outcome {
            Ok(output) => {
                bus.publish(
                    EventType::TaskCompleted,
                    source,
                    json!({
                        "output_id": output.id,
                        "confidence": output.confidence,
                        "result": output.result,
                    }),
                    Some(task.id()),
                )?;
                self.descriptor.transition_to(AgentStatus::Idle)?;
                Ok(output)
            }
            Err(err) => {
                bus.publish(
                    EventType::TaskFailed,
                    source,
                    json!({ "error": err.to_string() }),
                    Some(task.id()),
                )?;
                self.descriptor.transition_to(AgentStatus::Error)?;
                Err(err)
            }
        }
    }

    /// Takes the agent offline
    ///
    /// Releases every held subscription on all paths (including when
    /// already offline), then publishes a best-effort final event — a
    /// publish failure is logged, never raised, so shutdown always
    /// completes.
    pub fn shutdown(&mut self, bus: &mut EventBus) {
        for sub in self.subscriptions.drain(..) {
            bus.unsubscribe(sub);
        }

        if self.descriptor.status == AgentStatus::Offline {
            self.initialized = false;
            return;
        }

        if let Err(err) = self.descriptor.transition_to(AgentStatus::Offline) {
            tracing::warn!(agent = %self.descriptor.name, error = %err, "shutdown transition failed");
        }

        let final_event = bus.publish(
            EventType::TaskCompleted,
            self.descriptor.id.to_string(),
            json!({
                "message": "agent deactivated",
                "agent_name": self.descriptor.name,
            }),
            None,
        );
        if let Err(err) = final_event {
            tracing::warn!(agent = %self.descriptor.name, error = %err, "shutdown event not published");
        }

        self.initialized = false;
        tracing::info!(agent = %self.descriptor.name, "agent shut down");
    }

    #[cfg(test)]
    pub(crate) fn force_status(&mut self, status: AgentStatus) {
        self.descriptor.status = status;
    }
}
