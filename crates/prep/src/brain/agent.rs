//! Bounded tool-calling loop shared by the calendar and research agents.
//!
//! Tool failures never abort the loop: they are handed back to the model as tool results so it
//! can rephrase or move on. Only provider errors end a run early.

use async_trait::async_trait;

use super::{
    ChatMessage, ChatRequest, LLMProviderTrait, ModelSettings, ProviderError, ProviderResponse,
    ToolDefinition,
};

/// Something the model can call by name
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Function definitions advertised to the model
    fn definitions(&self) -> Vec<ToolDefinition>;

    /// Run one tool call. `Err` carries a message for the model, not a pipeline failure.
    async fn call(&self, name: &str, arguments: &serde_json::Value) -> Result<String, String>;
}

/// Drive `provider` until it answers in text, executing requested tools in between.
///
/// After `max_steps` rounds of tool calls the model gets one last turn with tool use disabled,
/// so the caller always receives the best answer available at the budget.
pub async fn run_tool_loop(
    provider: &dyn LLMProviderTrait,
    settings: &ModelSettings,
    system_prompt: &str,
    user_prompt: &str,
    tools: &dyn ToolExecutor,
    max_steps: usize,
) -> Result<String, ProviderError> {
    let definitions = tools.definitions();
    let definitions = (!definitions.is_empty()).then_some(definitions);

    let mut messages = Vec::new();
    if !system_prompt.is_empty() {
        messages.push(ChatMessage::system(system_prompt));
    }
    messages.push(ChatMessage::user(user_prompt));

    for step in 0..max_steps {
        let request = ChatRequest {
            messages: messages.clone(),
            tools: definitions.clone(),
            config: settings.chat_config(),
            response_format: None,
        };

        match provider.chat(request).await? {
            ProviderResponse::Text { content, usage } => {
                if let Some(u) = usage {
                    tracing::debug!(
                        "[TOOL_LOOP] Finished at step {}: {} input, {} output tokens",
                        step,
                        u.input_tokens,
                        u.output_tokens
                    );
                }
                return Ok(content);
            }
            ProviderResponse::ToolCalls { calls, .. } => {
                tracing::info!(
                    "[TOOL_LOOP] Step {}: model requested {} tool call(s)",
                    step + 1,
                    calls.len()
                );
                messages.push(ChatMessage::assistant_with_tools(calls.clone()));

                for call in &calls {
                    tracing::debug!("[TOOL_LOOP] Executing {} ({})", call.name, call.id);
                    let result = match tools.call(&call.name, &call.arguments).await {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::warn!("[TOOL_LOOP] Tool {} failed: {}", call.name, e);
                            format!("Error: {}", e)
                        }
                    };
                    messages.push(ChatMessage::tool_result(call.id.clone(), result));
                }
            }
        }
    }

    tracing::warn!(
        "[TOOL_LOOP] Step budget of {} exhausted, asking for a final answer",
        max_steps
    );

    let mut config = settings.chat_config();
    config.tool_choice = Some("none".to_string());
    let request = ChatRequest {
        messages,
        tools: definitions,
        config,
        response_format: None,
    };

    match provider.chat(request).await? {
        ProviderResponse::Text { content, .. } => Ok(content),
        ProviderResponse::ToolCalls { .. } => Err(ProviderError::ParseError(
            "model kept requesting tools after the step budget".to_string(),
        )),
    }
}
