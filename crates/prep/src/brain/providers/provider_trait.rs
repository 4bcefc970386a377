//! Provider trait and common types for the pipeline's model calls

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

/// Supported LLM provider types. Both speak the OpenAI chat-completions dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    OpenAI,
    Groq,
}

impl Default for ProviderType {
    fn default() -> Self {
        ProviderType::OpenAI
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderType::OpenAI => write!(f, "openai"),
            ProviderType::Groq => write!(f, "groq"),
        }
    }
}

impl std::str::FromStr for ProviderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(ProviderType::OpenAI),
            "groq" => Ok(ProviderType::Groq),
            _ => Err(format!("Unknown provider type: {}", s)),
        }
    }
}

/// Error type for provider operations
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Response parse error: {0}")]
    ParseError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Rate limited: retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Provider not available: {0}")]
    NotAvailable(String),
}

/// Role of a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

/// A message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    /// For tool role messages - the ID of the tool call this is responding to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// For assistant messages that include tool calls
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRequest>>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: content.into(),
            tool_call_id: Some(tool_call_id.into()),
            tool_calls: None,
        }
    }

    pub fn assistant_with_tools(tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: String::new(),
            tool_call_id: None,
            tool_calls: Some(tool_calls),
        }
    }
}

/// A tool call requested by the LLM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Tool definition for function calling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Constrains the shape of a model's reply
#[derive(Debug, Clone)]
pub enum ResponseFormat {
    /// JSON conforming to the given schema
    JsonSchema {
        name: String,
        schema: serde_json::Value,
    },
}

/// Configuration for a chat request
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub model: String,
    /// Ignored by reasoning models
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Force tool usage: "auto", "required", "none", or specific tool name
    pub tool_choice: Option<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4.1".to_string(),
            temperature: None,
            max_tokens: None,
            tool_choice: None,
        }
    }
}

/// A complete chat request
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Option<Vec<ToolDefinition>>,
    pub config: ChatConfig,
    pub response_format: Option<ResponseFormat>,
}

impl ChatRequest {
    /// Single-turn request with no tools
    pub fn single(config: ChatConfig, prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::user(prompt)],
            tools: None,
            config,
            response_format: None,
        }
    }

    pub fn with_response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = Some(format);
        self
    }
}

/// Response from an LLM provider
#[derive(Debug, Clone)]
pub enum ProviderResponse {
    /// Text response from the LLM
    Text {
        content: String,
        usage: Option<TokenUsage>,
    },
    /// LLM wants to call tools
    ToolCalls {
        calls: Vec<ToolCallRequest>,
        usage: Option<TokenUsage>,
    },
}

impl ProviderResponse {
    /// Get the text content if this is a text response
    pub fn text(&self) -> Option<&str> {
        match self {
            ProviderResponse::Text { content, .. } => Some(content),
            ProviderResponse::ToolCalls { .. } => None,
        }
    }

    /// Get the tool calls if this is a tool call response
    pub fn tool_calls(&self) -> Option<&[ToolCallRequest]> {
        match self {
            ProviderResponse::Text { .. } => None,
            ProviderResponse::ToolCalls { calls, .. } => Some(calls),
        }
    }

    /// Get token usage if available
    pub fn usage(&self) -> Option<&TokenUsage> {
        match self {
            ProviderResponse::Text { usage, .. } => usage.as_ref(),
            ProviderResponse::ToolCalls { usage, .. } => usage.as_ref(),
        }
    }
}

/// Token usage information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

/// A chunk of streamed response
#[derive(Debug, Clone)]
pub struct StreamChunk {
    pub content: String,
    pub is_done: bool,
}

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, ProviderError>> + Send>>;

/// Trait that all LLM providers must implement
#[async_trait]
pub trait LLMProviderTrait: Send + Sync {
    /// Get the provider type
    fn provider_type(&self) -> ProviderType;

    /// Get the provider name for logging/display
    fn name(&self) -> &'static str;

    /// Check if this provider is properly configured and ready
    fn is_configured(&self) -> bool;

    /// Send a chat request and get a response
    async fn chat(&self, request: ChatRequest) -> Result<ProviderResponse, ProviderError>;

    /// Send a chat request and get a streaming response
    async fn chat_stream(&self, request: ChatRequest) -> Result<ChunkStream, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_type_round_trips_through_strings() {
        assert_eq!("openai".parse::<ProviderType>().unwrap(), ProviderType::OpenAI);
        assert_eq!(" Groq ".parse::<ProviderType>().unwrap(), ProviderType::Groq);
        assert!("anthropic".parse::<ProviderType>().is_err());
        assert_eq!(ProviderType::Groq.to_string(), "groq");
    }

    #[test]
    fn response_accessors_match_variant() {
        let text = ProviderResponse::Text {
            content: "hello".into(),
            usage: None,
        };
        assert_eq!(text.text(), Some("hello"));
        assert!(text.tool_calls().is_none());

        let calls = ProviderResponse::ToolCalls {
            calls: vec![ToolCallRequest {
                id: "call_1".into(),
                name: "tavily_search".into(),
                arguments: serde_json::json!({"query": "acme"}),
            }],
            usage: None,
        };
        assert!(calls.text().is_none());
        assert_eq!(calls.tool_calls().map(|c| c.len()), Some(1));
    }
}
