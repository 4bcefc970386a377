//! OpenAI-compatible chat completions provider (OpenAI and Groq)

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;

use super::provider_trait::{
    ChatMessage, ChatRequest, ChunkStream, LLMProviderTrait, MessageRole, ProviderError,
    ProviderResponse, ProviderType, ResponseFormat, StreamChunk, TokenUsage, ToolCallRequest,
    ToolDefinition,
};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Chat completions provider for any OpenAI-compatible API
pub struct OpenAIProvider {
    client: Client,
    api_key: Option<String>,
    endpoint: String,
    provider_type: ProviderType,
}

impl OpenAIProvider {
    /// Create a provider for the given backend, reading its key and base URL from the environment
    pub fn new(provider_type: ProviderType) -> Self {
        let (key_var, base_var, default_base) = match provider_type {
            ProviderType::OpenAI => ("OPENAI_API_KEY", "OPENAI_BASE_URL", OPENAI_BASE_URL),
            ProviderType::Groq => ("GROQ_API_KEY", "GROQ_BASE_URL", GROQ_BASE_URL),
        };

        let api_key = std::env::var(key_var).ok().filter(|k| !k.trim().is_empty());
        let base_url = std::env::var(base_var).unwrap_or_else(|_| default_base.to_string());

        if api_key.is_some() {
            tracing::info!("[OPENAI] {} provider initialized with API key", provider_type);
        } else {
            tracing::warn!(
                "[OPENAI] {} provider created without API key - {} env var not found",
                provider_type,
                key_var
            );
        }

        Self {
            client: Client::new(),
            api_key,
            endpoint: chat_completions_url(&base_url),
            provider_type,
        }
    }

    /// Create with an explicit endpoint and key (proxies, tests)
    pub fn with_endpoint(
        provider_type: ProviderType,
        endpoint: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key,
            endpoint: endpoint.into(),
            provider_type,
        }
    }

    /// Convert our ChatMessage to OpenAI API format
    fn message_to_openai(&self, msg: &ChatMessage) -> serde_json::Value {
        let role = match msg.role {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        };

        let mut obj = serde_json::json!({
            "role": role,
            "content": msg.content
        });

        if let Some(ref tool_call_id) = msg.tool_call_id {
            obj["tool_call_id"] = serde_json::json!(tool_call_id);
        }

        if let Some(ref tool_calls) = msg.tool_calls {
            let calls: Vec<serde_json::Value> = tool_calls
                .iter()
                .map(|tc| {
                    serde_json::json!({
                        "id": tc.id,
                        "type": "function",
                        "function": {
                            "name": tc.name,
                            "arguments": tc.arguments.to_string()
                        }
                    })
                })
                .collect();
            obj["tool_calls"] = serde_json::json!(calls);
            if msg.content.is_empty() {
                obj["content"] = serde_json::Value::Null;
            }
        }

        obj
    }

    /// Convert ToolDefinition to OpenAI tool format
    fn tool_to_openai(&self, tool: &ToolDefinition) -> serde_json::Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.parameters
            }
        })
    }

    /// Build the request body shared by blocking and streaming calls
    fn build_payload(&self, request: &ChatRequest, stream: bool) -> serde_json::Value {
        let messages: Vec<serde_json::Value> = request
            .messages
            .iter()
            .map(|m| self.message_to_openai(m))
            .collect();

        let mut payload = serde_json::json!({
            "model": request.config.model,
            "messages": messages
        });

        let reasoning = is_reasoning_model(&request.config.model);
        if let Some(temperature) = request.config.temperature {
            if !reasoning {
                payload["temperature"] = serde_json::json!(temperature);
            }
        }
        if let Some(max_tokens) = request.config.max_tokens {
            let key = if reasoning { "max_completion_tokens" } else { "max_tokens" };
            payload[key] = serde_json::json!(max_tokens);
        }

        if let Some(ref tools) = request.tools {
            if !tools.is_empty() {
                let openai_tools: Vec<serde_json::Value> =
                    tools.iter().map(|t| self.tool_to_openai(t)).collect();
                payload["tools"] = serde_json::json!(openai_tools);

                payload["tool_choice"] = match request.config.tool_choice.as_deref() {
                    None | Some("auto") => serde_json::json!("auto"),
                    Some("required") => serde_json::json!("required"),
                    Some("none") => serde_json::json!("none"),
                    Some(specific) => {
                        serde_json::json!({"type": "function", "function": {"name": specific}})
                    }
                };
            }
        }

        match &request.response_format {
            Some(ResponseFormat::JsonSchema { name, schema }) => {
                payload["response_format"] = serde_json::json!({
                    "type": "json_schema",
                    "json_schema": {
                        "name": name,
                        "schema": schema,
                        "strict": false
                    }
                });
            }
            None => {}
        }

        if stream {
            payload["stream"] = serde_json::json!(true);
        }

        payload
    }

    fn auth_header(&self) -> Result<String, ProviderError> {
        self.api_key
            .as_ref()
            .map(|k| format!("Bearer {}", k))
            .ok_or_else(|| {
                ProviderError::AuthError(format!("No {} API key configured", self.provider_type))
            })
    }

    async fn send(&self, payload: &serde_json::Value) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .header("Authorization", self.auth_header()?)
            .json(payload)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            if status.as_u16() == 429 {
                let retry_after_ms = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<f64>().ok())
                    .map(|secs| (secs * 1000.0) as u64);
                return Err(ProviderError::RateLimited { retry_after_ms });
            }
            if status.as_u16() == 401 {
                let body = response.text().await.unwrap_or_default();
                return Err(ProviderError::AuthError(body));
            }

            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        Ok(response)
    }
}

/// Parse an OpenAI response body into a ProviderResponse
pub(crate) fn parse_response(json: &serde_json::Value) -> Result<ProviderResponse, ProviderError> {
    let message = json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .ok_or_else(|| ProviderError::ParseError("response has no choices".to_string()))?;

    let usage = json.get("usage").and_then(|u| {
        Some(TokenUsage {
            input_tokens: u["prompt_tokens"].as_u64()? as u32,
            output_tokens: u["completion_tokens"].as_u64()? as u32,
            total_tokens: u["total_tokens"].as_u64()? as u32,
        })
    });

    if let Some(tool_calls) = message["tool_calls"].as_array() {
        let calls: Vec<ToolCallRequest> = tool_calls
            .iter()
            .filter_map(|tc| {
                let id = tc["id"].as_str()?.to_string();
                let name = tc["function"]["name"].as_str()?.to_string();
                let args_str = tc["function"]["arguments"].as_str().unwrap_or("{}");
                let arguments: serde_json::Value =
                    serde_json::from_str(args_str).unwrap_or(serde_json::json!({}));

                Some(ToolCallRequest {
                    id,
                    name,
                    arguments,
                })
            })
            .collect();

        if !calls.is_empty() {
            return Ok(ProviderResponse::ToolCalls { calls, usage });
        }
    }

    let content = message["content"]
        .as_str()
        .unwrap_or("")
        .trim()
        .to_string();

    Ok(ProviderResponse::Text { content, usage })
}

/// Pull every complete SSE line out of `buffer`, returning the content deltas and whether
/// `[DONE]` was seen. A trailing partial line stays in the buffer as raw bytes, so a
/// multibyte character split across network chunks is decoded only once it is whole.
pub(crate) fn drain_sse_lines(buffer: &mut Vec<u8>) -> (Vec<String>, bool) {
    let mut deltas = Vec::new();
    let mut done = false;

    while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
        let raw: Vec<u8> = buffer.drain(..=pos).collect();
        if parse_sse_line(&String::from_utf8_lossy(&raw), &mut deltas) {
            done = true;
        }
    }

    (deltas, done)
}

/// Treat whatever is left in `buffer` after the body ends as one final line
pub(crate) fn flush_sse_buffer(buffer: &mut Vec<u8>) -> (Vec<String>, bool) {
    if buffer.is_empty() {
        return (Vec::new(), false);
    }
    buffer.push(b'\n');
    drain_sse_lines(buffer)
}

/// Returns true for the `[DONE]` sentinel
fn parse_sse_line(line: &str, deltas: &mut Vec<String>) -> bool {
    let Some(data) = line.trim().strip_prefix("data:") else {
        return false;
    };
    let data = data.trim();
    if data == "[DONE]" {
        return true;
    }
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(data) {
        if let Some(delta) = json["choices"][0]["delta"]["content"].as_str() {
            if !delta.is_empty() {
                deltas.push(delta.to_string());
            }
        }
    }
    false
}

fn chat_completions_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

/// Reasoning models reject `temperature` and count output with `max_completion_tokens`
fn is_reasoning_model(model: &str) -> bool {
    ["o1", "o3", "o4"].iter().any(|p| model.starts_with(p))
}

#[async_trait]
impl LLMProviderTrait for OpenAIProvider {
    fn provider_type(&self) -> ProviderType {
        self.provider_type
    }

    fn name(&self) -> &'static str {
        match self.provider_type {
            ProviderType::OpenAI => "OpenAI",
            ProviderType::Groq => "Groq",
        }
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn chat(&self, request: ChatRequest) -> Result<ProviderResponse, ProviderError> {
        let payload = self.build_payload(&request, false);

        tracing::debug!(
            "[OPENAI] Sending request: provider={}, model={}, messages={}, tools={}",
            self.provider_type,
            request.config.model,
            request.messages.len(),
            request.tools.as_ref().map(|t| t.len()).unwrap_or(0)
        );

        let response = self.send(&payload).await?;

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        parse_response(&json)
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<ChunkStream, ProviderError> {
        let payload = self.build_payload(&request, true);

        tracing::debug!(
            "[OPENAI] Opening stream: provider={}, model={}",
            self.provider_type,
            request.config.model
        );

        let response = self.send(&payload).await?;
        let mut byte_stream = response.bytes_stream();

        let stream = async_stream::stream! {
            let mut buffer: Vec<u8> = Vec::new();
            while let Some(next) = byte_stream.next().await {
                match next {
                    Ok(bytes) => {
                        buffer.extend_from_slice(&bytes);
                        let (deltas, done) = drain_sse_lines(&mut buffer);
                        for content in deltas {
                            yield Ok(StreamChunk { content, is_done: false });
                        }
                        if done {
                            yield Ok(StreamChunk { content: String::new(), is_done: true });
                            return;
                        }
                    }
                    Err(e) => {
                        yield Err(ProviderError::RequestFailed(e.to_string()));
                        return;
                    }
                }
            }

            let (deltas, _) = flush_sse_buffer(&mut buffer);
            for content in deltas {
                yield Ok(StreamChunk { content, is_done: false });
            }
            yield Ok(StreamChunk { content: String::new(), is_done: true });
        };

        Ok(Box::pin(stream))
    }
}
