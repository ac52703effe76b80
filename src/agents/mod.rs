// Agent runtime contract
//
// An agent is an executor (the per-variant "what does this task mean"
// logic) wrapped in a runtime (the shared lifecycle state machine, event
// emission and fault capture).

pub mod executor;
pub mod runtime;

pub use executor::AgentExecutor;
pub use runtime::AgentRuntime;
