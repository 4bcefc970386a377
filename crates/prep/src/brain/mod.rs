//! Model access for the pipeline stages: provider abstraction, per-stage model settings and
//! the bounded tool-calling loop used by the calendar and research agents.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub mod agent;
pub mod providers;

pub use agent::{run_tool_loop, ToolExecutor};
pub use providers::{
    ChatConfig, ChatMessage, ChatRequest, ChunkStream, LLMProviderTrait, OpenAIProvider,
    ProviderError, ProviderResponse, ProviderType, ResponseFormat, StreamChunk, TokenUsage,
    ToolCallRequest, ToolDefinition,
};

/// Which backend and model a stage uses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    pub provider: ProviderType,
    pub model: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl ModelSettings {
    pub fn new(provider: ProviderType, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Request config for a call made with these settings
    pub fn chat_config(&self) -> ChatConfig {
        ChatConfig {
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tool_choice: None,
        }
    }
}

/// Build the provider that serves `settings`
pub fn build_provider(settings: &ModelSettings) -> Arc<dyn LLMProviderTrait> {
    Arc::new(OpenAIProvider::new(settings.provider))
}
