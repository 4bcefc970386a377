//! Calendar agent backed by a Google Calendar MCP server.
//!
//! Each fetch spawns the MCP server as a child process (rmcp child-process transport), exposes
//! its tools to the calendar model and runs the bounded tool loop. The session is cancelled on
//! every exit path, which terminates the child.

use std::sync::Arc;

use async_trait::async_trait;
use rmcp::model::CallToolRequestParam;
use rmcp::service::RunningService;
use rmcp::transport::child_process::TokioChildProcess;
use rmcp::{RoleClient, ServiceExt};
use serde::{Deserialize, Serialize};

use super::{calendar_instruction, CalendarError, CalendarSource};
use crate::brain::{run_tool_loop, LLMProviderTrait, ModelSettings, ToolDefinition, ToolExecutor};

const CALENDAR_SYSTEM_PROMPT: &str = "You are a calendar assistant with access to Google Calendar tools. \
Use the tools to look up the requested day. Answer in plain text, listing every meeting with its title, \
start time, and each attendee's name and email address. Do not invent meetings.";

/// How to launch the calendar MCP server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarMcpConfig {
    pub command: String,
    pub args: Vec<String>,
    pub max_steps: usize,
}

impl Default for CalendarMcpConfig {
    fn default() -> Self {
        Self {
            command: "node".to_string(),
            args: Vec::new(),
            max_steps: 30,
        }
    }
}

/// Connected MCP session plus the tool list it advertised
struct McpSession {
    service: RunningService<RoleClient, ()>,
    tools: Vec<ToolDefinition>,
}

impl McpSession {
    async fn connect(config: &CalendarMcpConfig) -> Result<Self, CalendarError> {
        let mut command = tokio::process::Command::new(&config.command);
        command.args(&config.args);

        let transport = TokioChildProcess::new(&mut command)
            .map_err(|e| CalendarError::SpawnFailed(e.to_string()))?;

        let service = ()
            .serve(transport)
            .await
            .map_err(|e| CalendarError::ConnectionFailed(e.to_string()))?;

        let tools = match service.list_all_tools().await {
            Ok(tools) => tools
                .iter()
                .filter_map(|tool| serde_json::to_value(tool).ok())
                .filter_map(|value| tool_definition_from_mcp(&value))
                .collect::<Vec<_>>(),
            Err(e) => {
                let _ = service.cancel().await;
                return Err(CalendarError::ToolListFailed(e.to_string()));
            }
        };

        tracing::info!("[CALENDAR] MCP session open with {} tool(s)", tools.len());
        Ok(Self { service, tools })
    }

    async fn disconnect(self) {
        if let Err(e) = self.service.cancel().await {
            tracing::warn!("[CALENDAR] MCP session did not shut down cleanly: {}", e);
        }
    }
}

/// Map an MCP tool listing entry to a function definition
fn tool_definition_from_mcp(value: &serde_json::Value) -> Option<ToolDefinition> {
    let name = value.get("name")?.as_str()?.to_string();
    let description = value
        .get("description")
        .and_then(|d| d.as_str())
        .unwrap_or_default()
        .to_string();
    let parameters = value
        .get("inputSchema")
        .cloned()
        .unwrap_or_else(|| serde_json::json!({"type": "object", "properties": {}}));

    Some(ToolDefinition {
        name,
        description,
        parameters,
    })
}

#[async_trait]
impl ToolExecutor for McpSession {
    fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.clone()
    }

    async fn call(&self, name: &str, arguments: &serde_json::Value) -> Result<String, String> {
        let result = self
            .service
            .call_tool(CallToolRequestParam {
                name: name.to_string().into(),
                arguments: arguments.as_object().cloned(),
            })
            .await
            .map_err(|e| e.to_string())?;

        let text: String = result
            .content
            .iter()
            .filter_map(|c| c.as_text().map(|t| t.text.as_str()))
            .collect::<Vec<_>>()
            .join("\n");

        if result.is_error == Some(true) {
            return Err(if text.is_empty() {
                "Unknown error".to_string()
            } else {
                text
            });
        }

        Ok(text)
    }
}

/// Calendar source that asks a model to read the calendar through MCP tools
pub struct McpCalendarAgent {
    config: CalendarMcpConfig,
    provider: Arc<dyn LLMProviderTrait>,
    settings: ModelSettings,
}

impl McpCalendarAgent {
    pub fn new(
        config: CalendarMcpConfig,
        provider: Arc<dyn LLMProviderTrait>,
        settings: ModelSettings,
    ) -> Self {
        Self {
            config,
            provider,
            settings,
        }
    }
}

#[async_trait]
impl CalendarSource for McpCalendarAgent {
    async fn fetch(&self, date: &str) -> Result<String, CalendarError> {
        if self.config.command.trim().is_empty() {
            return Err(CalendarError::NotConfigured(
                "CALENDAR_MCP_COMMAND is empty".to_string(),
            ));
        }
        if !self.provider.is_configured() {
            return Err(CalendarError::NotConfigured(format!(
                "{} provider has no API key",
                self.provider.name()
            )));
        }

        tracing::info!(
            "[CALENDAR] Connecting to calendar MCP server: {} {}",
            self.config.command,
            self.config.args.join(" ")
        );
        let session = McpSession::connect(&self.config).await?;

        let outcome = run_tool_loop(
            self.provider.as_ref(),
            &self.settings,
            CALENDAR_SYSTEM_PROMPT,
            &calendar_instruction(date),
            &session,
            self.config.max_steps,
        )
        .await;

        session.disconnect().await;

        let text = outcome.map_err(|e| CalendarError::Agent(e.to_string()))?;
        tracing::info!("[CALENDAR] Calendar agent returned {} chars", text.len());
        Ok(text)
    }
}
