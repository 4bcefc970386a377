//! Web search and the research agent built on it.

use async_trait::async_trait;

use crate::{pipeline::Meeting, Result};

mod agent;
mod tavily;

pub use agent::{research_prompt, ReactResearcher};
pub use tavily::{SearchResult, TavilyClient, TavilyConfig};

/// Errors from the search provider
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Search provider not configured: {0}")]
    NotConfigured(String),
    #[error("Search request failed: {0}")]
    RequestFailed(String),
    #[error("Search API error ({status}): {message}")]
    ApiError { status: u16, message: String },
    #[error("Failed to parse search response: {0}")]
    ParseError(String),
}

/// Turns a meeting list into free-text findings with links
#[async_trait]
pub trait Researcher: Send + Sync {
    async fn research(&self, meetings: &[Meeting]) -> Result<String>;
}
