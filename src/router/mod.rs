//! Router / orchestrator: matches submitted tasks to registered agents and
//! drives their execution.
//!
//! The orchestrator is explicitly constructed and owns the bus, the route
//! table, the agents and the task/output registries. Every mutating method
//! takes `&mut self`, so access is caller-serialized with no internal
//! locking — sharing across truly parallel callers needs an external mutex.

pub mod rules;

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::agents::{AgentExecutor, AgentRuntime};
use crate::bus::{BusConfig, EventBus};
use crate::domain::{
    AgentDescriptor, AgentStatus, Event, EventType, Task, TaskOutput, TaskPriority, TaskStatus,
};
use crate::error::{OrchestrationError, OrchestrationResult};

pub use rules::{RoutePredicate, RouteTable, RoutingRule};

/// Source id used for router-originated events
const ROUTER_SOURCE: &str = "orchestrator";

/// Router configuration
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Interval between status checks in
    /// [`Orchestrator::wait_for_task_completion`]. Completion is observed
    /// with a latency of up to one interval, regardless of when the task
    /// actually finished.
    pub poll_interval: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
        }
    }
}

/// Aggregate view over the registries
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorStatus {
    pub agents: usize,
    pub pending_tasks: usize,
    pub assigned_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    pub events: usize,
}

/// Event-driven task orchestrator
///
/// # Task State Machine
/// ```text
/// pending --(route match)--> assigned --(agent success)--> completed
///    │                            └-----(agent failure)--> failed
///    └--(no route match)--> pending   (stays inspectable, never dropped)
/// ```
pub struct Orchestrator {
    bus: EventBus,
    routes: RouteTable,
    agents: Vec<AgentRuntime>,
    tasks: HashMap<Uuid, Task>,
    outputs: HashMap<Uuid, TaskOutput>,
    poll_interval: Duration,
    initialized: bool,
}

impl Orchestrator {
    /// Creates an orchestrator with its own bus and empty registries
    pub fn new(bus_config: BusConfig, router_config: RouterConfig) -> Self {
        Self {
            bus: EventBus::new(bus_config),
            routes: RouteTable::new(),
            agents: Vec::new(),
            tasks: HashMap::new(),
            outputs: HashMap::new(),
            poll_interval: router_config.poll_interval,
            initialized: true,
        }
    }

    /// Appends a routing rule; earlier rules take precedence
    pub fn add_rule(&mut self, rule: RoutingRule) {
        self.routes.push(rule);
    }

    /// Registers and initializes an agent
    ///
    /// Agents are considered for routing in registration order.
    pub fn register_agent(
        &mut self,
        descriptor: AgentDescriptor,
        executor: Box<dyn AgentExecutor>,
    ) -> OrchestrationResult<Uuid> {
        self.ensure_initialized()?;

        let mut runtime = AgentRuntime::new(descriptor, executor);
        runtime.initialize(&mut self.bus)?;
        let id = runtime.id();
        self.agents.push(runtime);

        tracing::info!(agent_id = %id, "agent registered");
        Ok(id)
    }

    /// Submits a task and immediately attempts assignment
    ///
    /// Assignment is synchronous-with-submission: this call returns only
    /// after the assigned agent has fully finished (or failed) the work.
    /// An execution failure does **not** reject this call — the task is
    /// marked failed and `Ok(task_id)` is still returned; inspect
    /// [`Orchestrator::task`] and [`Orchestrator::output`] for the outcome.
    /// A routing miss leaves the task pending and records an `agent_error`
    /// event.
    ///
    /// # Returns
    /// * `Ok(Uuid)` - Id of the stored task
    /// * `Err(OrchestrationError::Validation)` - If the task is malformed
    pub async fn create_task(
        &mut self,
        task_type: impl Into<String>,
        payload: serde_json::Value,
        priority: TaskPriority,
        dependencies: Vec<Uuid>,
    ) -> OrchestrationResult<Uuid> {
        self.ensure_initialized()?;

        let task = Task::new(task_type, payload, priority, dependencies)?;
        let task_id = task.id();

        self.bus.publish(
            EventType::TaskCreated,
            ROUTER_SOURCE,
            json!({
                "task_type": task.task_type(),
                "priority": task.priority().to_string(),
            }),
            Some(task_id),
        )?;
        self.tasks.insert(task_id, task);

        self.assign_task(task_id).await?;
        Ok(task_id)
    }

    /// Routes one pending task and drives execution to a terminal status
    ///
    /// Evaluates the ordered rule table over the task type; the first
    /// matching rule names a capability tag, served by the first registered
    /// non-offline agent carrying that tag. No match: the task stays
    /// pending forever (no retry, no dead-letter) and an `agent_error`
    /// event records the miss.
    async fn assign_task(&mut self, task_id: Uuid) -> OrchestrationResult<()> {
        let task = match self.tasks.get(&task_id) {
            Some(task) => task.clone(),
            None => {
                return Err(OrchestrationError::Validation(format!(
                    "unknown task {task_id}"
                )))
            }
        };

        let target = self.routes.resolve(task.task_type()).and_then(|tag| {
            self.agents
                .iter()
                .position(|agent| agent.supports(tag) && agent.status() != AgentStatus::Offline)
        });

        let Some(index) = target else {
            let miss = OrchestrationError::NoSuitableAgent(task.task_type().to_string());
            tracing::warn!(task_id = %task_id, "{miss}");
            self.bus.publish(
                EventType::AgentError,
                ROUTER_SOURCE,
                json!({ "message": miss.to_string() }),
                Some(task_id),
            )?;
            return Ok(());
        };

        let agent_id = self.agents[index].id();
        if let Some(stored) = self.tasks.get_mut(&task_id) {
            stored.assign(agent_id)?;
        }

        let outcome = self.agents[index].process_task(&task, &mut self.bus).await;
        match outcome {
            Ok(output) => {
                if let Some(stored) = self.tasks.get_mut(&task_id) {
                    stored.complete()?;
                }
                self.outputs.insert(task_id, output);
                tracing::info!(task_id = %task_id, agent_id = %agent_id, "task completed");
            }
            Err(err) => {
                // The runtime already published task_failed; the failure
                // stops here and is not re-raised past the router.
                if let Some(stored) = self.tasks.get_mut(&task_id) {
                    stored.fail()?;
                }
                tracing::warn!(task_id = %task_id, agent_id = %agent_id, error = %err, "task failed");
            }
        }

        Ok(())
    }

    // ===== Read accessors (pure projections) =====

    /// Returns counts over the registries and the event history depth
    pub fn status(&self) -> OrchestratorStatus {
        let count = |status: TaskStatus| {
            self.tasks
                .values()
                .filter(|task| task.status() == status)
                .count()
        };
        OrchestratorStatus {
            agents: self.agents.len(),
            pending_tasks: count(TaskStatus::Pending),
            assigned_tasks: count(TaskStatus::Assigned),
            completed_tasks: count(TaskStatus::Completed),
            failed_tasks: count(TaskStatus::Failed),
            events: self.bus.len(),
        }
    }

    /// Returns a snapshot of one agent's descriptor
    pub fn agent_info(&self, agent_id: Uuid) -> Option<AgentDescriptor> {
        self.agents
            .iter()
            .find(|agent| agent.id() == agent_id)
            .map(|agent| agent.info())
    }

    /// Returns one task by id
    pub fn task(&self, task_id: Uuid) -> Option<&Task> {
        self.tasks.get(&task_id)
    }

    /// Returns the output of a completed task
    pub fn output(&self, task_id: Uuid) -> Option<&TaskOutput> {
        self.outputs.get(&task_id)
    }

    /// Returns all tasks currently in the given status
    pub fn tasks_by_status(&self, status: TaskStatus) -> Vec<&Task> {
        self.tasks
            .values()
            .filter(|task| task.status() == status)
            .collect()
    }

    /// Returns the most recent `limit` events (whole history if `None`)
    pub fn event_history(&self, limit: Option<usize>) -> Vec<Event> {
        self.bus.history(limit)
    }

    /// Returns the events relating to one task, in insertion order
    pub fn task_events(&self, task_id: Uuid) -> Vec<Event> {
        self.bus.task_events(task_id)
    }

    /// Polls until the task reaches a terminal status
    ///
    /// This is a cooperative poll loop, not a condition variable: the task
    /// status is checked every `poll_interval`, so observing completion
    /// adds latency proportional to the interval, not to the completion
    /// itself.
    ///
    /// # Returns
    /// * `Ok(TaskStatus)` - Completed or Failed
    /// * `Err(OrchestrationError::Timeout)` - Deadline exceeded
    /// * `Err(OrchestrationError::Validation)` - Unknown task id
    pub async fn wait_for_task_completion(
        &self,
        task_id: Uuid,
        timeout: Duration,
    ) -> OrchestrationResult<TaskStatus> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let status = match self.tasks.get(&task_id) {
                Some(task) => task.status(),
                None => {
                    return Err(OrchestrationError::Validation(format!(
                        "unknown task {task_id}"
                    )))
                }
            };
            if status.is_terminal() {
                return Ok(status);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(OrchestrationError::Timeout { task_id, timeout });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Shuts down every agent and clears all registries
    ///
    /// Idempotent: a second call is a no-op. Afterwards every operation
    /// fails with `NotInitialized`.
    pub fn shutdown(&mut self) {
        if !self.initialized {
            return;
        }

        for agent in &mut self.agents {
            agent.shutdown(&mut self.bus);
        }
        self.agents.clear();
        self.tasks.clear();
        self.outputs.clear();
        self.bus.clear();
        self.initialized = false;

        tracing::info!("orchestrator shut down");
    }

    fn ensure_initialized(&self) -> OrchestrationResult<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(OrchestrationError::NotInitialized(
                "orchestrator".to_string(),
            ))
        }
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(BusConfig::default(), RouterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct EchoExecutor;

    #[async_trait]
    impl AgentExecutor for EchoExecutor {
        async fn execute(
            &mut self,
            agent: &AgentDescriptor,
            task: &Task,
        ) -> OrchestrationResult<TaskOutput> {
            TaskOutput::new(
                task.id(),
                agent.id,
                json!({"echo": task.payload().clone()}),
                0.9,
                json!({}),
            )
        }
    }

    struct FailingExecutor;

    #[async_trait]
    impl AgentExecutor for FailingExecutor {
        async fn execute(
            &mut self,
            _agent: &AgentDescriptor,
            _task: &Task,
        ) -> OrchestrationResult<TaskOutput> {
            Err(OrchestrationError::Execution("provider down".to_string()))
        }
    }

    fn orchestrator_with_data_agent() -> (Orchestrator, Uuid) {
        let mut orchestrator = Orchestrator::default();
        orchestrator.add_rule(RoutingRule::contains("data", "data"));
        let agent_id = orchestrator
            .register_agent(
                AgentDescriptor::new("validator", "data", vec!["data".to_string()]),
                Box::new(EchoExecutor),
            )
            .unwrap();
        (orchestrator, agent_id)
    }

    #[tokio::test]
    async fn matched_task_completes_with_assignment() {
        let (mut orchestrator, agent_id) = orchestrator_with_data_agent();

        let task_id = orchestrator
            .create_task(
                "data_validation",
                json!({"rows": 5}),
                TaskPriority::Normal,
                vec![],
            )
            .await
            .unwrap();

        let task = orchestrator.task(task_id).unwrap();
        assert_eq!(task.status(), TaskStatus::Completed);
        assert_eq!(task.assigned_agent_id(), Some(agent_id));

        let output = orchestrator.output(task_id).unwrap();
        assert_eq!(output.task_id, task_id);
        assert_eq!(output.result["echo"]["rows"], 5);
    }

    #[tokio::test]
    async fn unmatched_task_stays_pending_with_agent_error() {
        let (mut orchestrator, _) = orchestrator_with_data_agent();

        let task_id = orchestrator
            .create_task("image_render", json!({}), TaskPriority::Normal, vec![])
            .await
            .unwrap();

        let task = orchestrator.task(task_id).unwrap();
        assert_eq!(task.status(), TaskStatus::Pending);
        assert_eq!(task.assigned_agent_id(), None);

        assert!(orchestrator.tasks_by_status(TaskStatus::Assigned).is_empty());
        assert!(orchestrator.tasks_by_status(TaskStatus::Completed).is_empty());
        assert!(orchestrator.tasks_by_status(TaskStatus::Failed).is_empty());

        let errors: Vec<Event> = orchestrator
            .task_events(task_id)
            .into_iter()
            .filter(|e| e.event_type() == EventType::AgentError)
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].payload()["message"]
            .as_str()
            .unwrap()
            .contains("No suitable agent"));
    }

    #[tokio::test]
    async fn rule_without_matching_agent_leaves_task_pending() {
        let mut orchestrator = Orchestrator::default();
        orchestrator.add_rule(RoutingRule::contains("data", "research"));
        orchestrator
            .register_agent(
                AgentDescriptor::new("validator", "data", vec!["data".to_string()]),
                Box::new(EchoExecutor),
            )
            .unwrap();

        let task_id = orchestrator
            .create_task("data_validation", json!({}), TaskPriority::Normal, vec![])
            .await
            .unwrap();

        assert_eq!(
            orchestrator.task(task_id).unwrap().status(),
            TaskStatus::Pending
        );
    }

    #[tokio::test]
    async fn failed_execution_marks_task_failed_but_create_succeeds() {
        let mut orchestrator = Orchestrator::default();
        orchestrator.add_rule(RoutingRule::contains("data", "data"));
        let agent_id = orchestrator
            .register_agent(
                AgentDescriptor::new("validator", "data", vec!["data".to_string()]),
                Box::new(FailingExecutor),
            )
            .unwrap();

        // The execution failure is not re-raised past the router.
        let task_id = orchestrator
            .create_task("data_cleanup", json!({}), TaskPriority::High, vec![])
            .await
            .unwrap();

        let task = orchestrator.task(task_id).unwrap();
        assert_eq!(task.status(), TaskStatus::Failed);
        assert_eq!(task.assigned_agent_id(), Some(agent_id));
        assert!(orchestrator.output(task_id).is_none());

        let events: Vec<EventType> = orchestrator
            .task_events(task_id)
            .iter()
            .map(|e| e.event_type())
            .collect();
        assert_eq!(
            events,
            vec![
                EventType::TaskCreated,
                EventType::TaskStarted,
                EventType::TaskFailed,
            ]
        );

        // The agent is in error state but remains routable.
        assert_eq!(
            orchestrator.agent_info(agent_id).unwrap().status,
            AgentStatus::Error
        );
    }

    #[tokio::test]
    async fn capability_scenario_resolves_to_terminal_status() {
        // One agent with capability "data"; a data_validation task must end
        // terminal, never pending or assigned, after create_task returns.
        let (mut orchestrator, _) = orchestrator_with_data_agent();

        let task_id = orchestrator
            .create_task(
                "data_validation",
                json!({"source": "upload"}),
                TaskPriority::Normal,
                vec![],
            )
            .await
            .unwrap();

        let status = orchestrator.task(task_id).unwrap().status();
        assert!(status.is_terminal());
    }

    #[tokio::test]
    async fn first_rule_and_first_agent_win() {
        let mut orchestrator = Orchestrator::default();
        orchestrator.add_rule(RoutingRule::contains("data", "data"));
        orchestrator.add_rule(RoutingRule::contains("validation", "research"));

        let first = orchestrator
            .register_agent(
                AgentDescriptor::new("one", "data", vec![]),
                Box::new(EchoExecutor),
            )
            .unwrap();
        let _second = orchestrator
            .register_agent(
                AgentDescriptor::new("two", "data", vec![]),
                Box::new(EchoExecutor),
            )
            .unwrap();

        let task_id = orchestrator
            .create_task("data_validation", json!({}), TaskPriority::Normal, vec![])
            .await
            .unwrap();

        assert_eq!(
            orchestrator.task(task_id).unwrap().assigned_agent_id(),
            Some(first)
        );
    }

    #[tokio::test]
    async fn wait_for_completed_task_returns_immediately() {
        let (mut orchestrator, _) = orchestrator_with_data_agent();
        let task_id = orchestrator
            .create_task("data_validation", json!({}), TaskPriority::Normal, vec![])
            .await
            .unwrap();

        let status = orchestrator
            .wait_for_task_completion(task_id, Duration::from_millis(200))
            .await
            .unwrap();

        assert_eq!(status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn wait_for_pending_task_times_out() {
        let (mut orchestrator, _) = orchestrator_with_data_agent();
        let task_id = orchestrator
            .create_task("image_render", json!({}), TaskPriority::Normal, vec![])
            .await
            .unwrap();

        let result = orchestrator
            .wait_for_task_completion(task_id, Duration::from_millis(120))
            .await;

        assert!(matches!(result, Err(OrchestrationError::Timeout { .. })));
    }

    #[tokio::test]
    async fn wait_for_unknown_task_fails_validation() {
        let (orchestrator, _) = orchestrator_with_data_agent();

        let result = orchestrator
            .wait_for_task_completion(Uuid::new_v4(), Duration::from_millis(50))
            .await;

        assert!(matches!(result, Err(OrchestrationError::Validation(_))));
    }

    #[tokio::test]
    async fn create_task_with_empty_type_fails() {
        let (mut orchestrator, _) = orchestrator_with_data_agent();

        let result = orchestrator
            .create_task("", json!({}), TaskPriority::Normal, vec![])
            .await;

        assert!(matches!(result, Err(OrchestrationError::Validation(_))));
        assert_eq!(orchestrator.status().pending_tasks, 0);
    }

    #[tokio::test]
    async fn status_reflects_registries() {
        let (mut orchestrator, _) = orchestrator_with_data_agent();

        orchestrator
            .create_task("data_validation", json!({}), TaskPriority::Normal, vec![])
            .await
            .unwrap();
        orchestrator
            .create_task("image_render", json!({}), TaskPriority::Normal, vec![])
            .await
            .unwrap();

        let status = orchestrator.status();
        assert_eq!(status.agents, 1);
        assert_eq!(status.completed_tasks, 1);
        assert_eq!(status.pending_tasks, 1);
        assert_eq!(status.assigned_tasks, 0);
        assert_eq!(status.failed_tasks, 0);
        assert!(status.events > 0);
    }

    #[tokio::test]
    async fn shutdown_is_idempotent_and_clears_everything() {
        let (mut orchestrator, _) = orchestrator_with_data_agent();
        orchestrator
            .create_task("data_validation", json!({}), TaskPriority::Normal, vec![])
            .await
            .unwrap();

        orchestrator.shutdown();

        let status = orchestrator.status();
        assert_eq!(status.agents, 0);
        assert_eq!(status.completed_tasks, 0);
        assert_eq!(status.events, 0);

        // Second call is a no-op.
        orchestrator.shutdown();

        let result = orchestrator
            .create_task("data_validation", json!({}), TaskPriority::Normal, vec![])
            .await;
        assert!(matches!(result, Err(OrchestrationError::NotInitialized(_))));
    }
}
