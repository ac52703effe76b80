//! Flotilla: event-driven task orchestration core.
//!
//! An in-memory event bus with bounded history, a task lifecycle registry,
//! an agent runtime contract, and a deterministic router that assigns
//! submitted work to registered agents.
//!
//! ```no_run
//! use flotilla::domain::{AgentDescriptor, TaskPriority};
//! use flotilla::router::{Orchestrator, RoutingRule};
//! # use flotilla::agents::AgentExecutor;
//! # async fn run(executor: Box<dyn AgentExecutor>) -> flotilla::error::OrchestrationResult<()> {
//! let mut orchestrator = Orchestrator::default();
//! orchestrator.add_rule(RoutingRule::contains("data", "data"));
//! orchestrator.register_agent(
//!     AgentDescriptor::new("validator", "data", vec!["data".to_string()]),
//!     executor,
//! )?;
//!
//! let task_id = orchestrator
//!     .create_task("data_validation", serde_json::json!({"rows": 10}),
//!                  TaskPriority::Normal, vec![])
//!     .await?;
//! let task = orchestrator.task(task_id);
//! # Ok(())
//! # }
//! ```
//!
//! All registries are volatile and single-writer: mutating APIs take
//! `&mut self` and the crate holds no locks. Failures are inspectable
//! through the event history rather than a separate error channel.

pub mod agents;
pub mod bus;
pub mod domain;
pub mod error;
pub mod provider;
pub mod router;

pub use agents::{AgentExecutor, AgentRuntime};
pub use bus::{BusConfig, EventBus, SubscriptionId};
pub use domain::{
    AgentDescriptor, AgentStatus, Event, EventType, Task, TaskOutput, TaskPriority, TaskStatus,
};
pub use error::{OrchestrationError, OrchestrationResult};
pub use provider::{
    CompletionExecutor, CompletionProvider, CompletionRequest, CompletionResponse, TokenUsage,
};
pub use router::{Orchestrator, RouterConfig, RoutingRule};
