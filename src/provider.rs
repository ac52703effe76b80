//! Opaque completion-provider contract.
//!
//! The core never inspects a provider's internals: it hands over a request,
//! awaits a response, and treats any rejection as an ordinary execution
//! failure. [`CompletionExecutor`] is the one place agent-side logic
//! touches this capability.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::agents::AgentExecutor;
use crate::domain::{AgentDescriptor, Task, TaskOutput};
use crate::error::{OrchestrationError, OrchestrationResult};

/// Request sent to the external completion capability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub prompt: String,
    pub system: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Provider selector; `None` lets the collaborator pick its default
    pub provider: Option<String>,
}

impl CompletionRequest {
    /// Creates a request with the default sampling parameters
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            temperature: 0.7,
            max_tokens: 4096,
            provider: None,
        }
    }
}

/// Token accounting reported by the provider
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Response from the external completion capability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub content: String,
    pub model: String,
    pub usage: TokenUsage,
}

/// External natural-language generation capability
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn generate_completion(
        &self,
        request: CompletionRequest,
    ) -> OrchestrationResult<CompletionResponse>;
}

/// Executor that delegates a task to a completion provider
///
/// Reads the `"prompt"` key (and optional `"system"` key) from the task
/// payload, forwards it, and wraps the response into a [`TaskOutput`].
pub struct CompletionExecutor {
    provider: Arc<dyn CompletionProvider>,
}

impl CompletionExecutor {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl AgentExecutor for CompletionExecutor {
    async fn execute(
        &mut self,
        agent: &AgentDescriptor,
        task: &Task,
    ) -> OrchestrationResult<TaskOutput> {
        let prompt = task.payload()["prompt"].as_str().ok_or_else(|| {
            OrchestrationError::Execution("task payload is missing a 'prompt' key".to_string())
        })?;

        let mut request = CompletionRequest::new(prompt);
        request.system = task.payload()["system"].as_str().map(str::to_string);

        let response = self.provider.generate_completion(request).await?;

        TaskOutput::new(
            task.id(),
            agent.id,
            json!({ "content": response.content }),
            1.0,
            json!({
                "model": response.model,
                "total_tokens": response.usage.total_tokens,
            }),
        )
    }
}
