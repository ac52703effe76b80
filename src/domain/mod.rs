// Core data model for the orchestration core
//
// Everything here is a plain value type with invariant-enforcing
// constructors; coordination logic lives in the bus, agents and router
// modules.

pub mod agent;
pub mod event;
pub mod output;
pub mod task;

pub use agent::{AgentDescriptor, AgentStatus};
pub use event::{Event, EventType};
pub use output::TaskOutput;
pub use task::{Task, TaskPriority, TaskStatus};
