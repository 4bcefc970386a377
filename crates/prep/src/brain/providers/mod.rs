//! Multi-provider LLM abstraction layer
//!
//! Every stage talks to its model through [`LLMProviderTrait`], so stages can be pointed at
//! different backends (or at scripted fakes) without changing the pipeline.

mod openai;
mod provider_trait;

pub use openai::OpenAIProvider;
pub use provider_trait::{
    ChatConfig, ChatMessage, ChatRequest, ChunkStream, LLMProviderTrait, MessageRole,
    ProviderError, ProviderResponse, ProviderType, ResponseFormat, StreamChunk, TokenUsage,
    ToolCallRequest, ToolDefinition,
};
