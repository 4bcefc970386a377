//! Calendar collaborator: given a date, return free-text calendar information.

use async_trait::async_trait;

mod mcp;

pub use mcp::{CalendarMcpConfig, McpCalendarAgent};

/// Errors from calendar fetching
#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
    #[error("Calendar integration not configured: {0}")]
    NotConfigured(String),
    #[error("Failed to spawn calendar MCP server: {0}")]
    SpawnFailed(String),
    #[error("MCP connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Failed to list calendar tools: {0}")]
    ToolListFailed(String),
    #[error("Calendar agent failed: {0}")]
    Agent(String),
}

/// Anything that can describe a day's calendar
#[async_trait]
pub trait CalendarSource: Send + Sync {
    /// `date` is passed through as the caller supplied it
    async fn fetch(&self, date: &str) -> Result<String, CalendarError>;
}

/// The instruction sent to the calendar agent
pub fn calendar_instruction(date: &str) -> String {
    format!(
        "What is on my calendar for {}. Include the meeting title, time, and the attendees - names and emails.",
        date
    )
}
