//! Research agent: a tool-calling model with one web search tool.

use std::sync::Arc;

use async_trait::async_trait;

use super::tavily::{render_results, TavilyClient};
use super::Researcher;
use crate::brain::{run_tool_loop, LLMProviderTrait, ModelSettings, ToolDefinition, ToolExecutor};
use crate::pipeline::{meetings_to_prompt_json, Meeting};
use crate::Result;

const SEARCH_TOOL: &str = "tavily_search";

const RESEARCH_SYSTEM_PROMPT: &str = "You are a research assistant preparing briefings for business meetings. \
Use the tavily_search tool as many times as you need, one focused query at a time. \
When you have enough information, answer directly without calling more tools.";

/// The research instruction for a list of meetings
pub fn research_prompt(meetings: &[Meeting]) -> String {
    format!(
        r#"Your goal is to help me prepare for an upcoming meeting.
You will be provided with the name of a company we are meeting with and a list of attendees.

meeting information:
{}

Please find the profile information (e.g. linkedin profile) of the attendees using tavily search.

1. Search for the attendees name using all available information such as their email, initials/last name, etc.
- provide details on the attendees experience, education, and skills, and location
- If there are multiple attendees with the same name, only focus on the one that works at the relevant company
- it is important you find the profile of all the attendees!
2. Research the company in the context of AI initiatives using tavily search.
3. Provide your findings summarized concisely with the relevant links. Do not include anything else in the output."#,
        meetings_to_prompt_json(meetings)
    )
}

struct SearchTool<'a> {
    client: &'a TavilyClient,
}

#[async_trait]
impl ToolExecutor for SearchTool<'_> {
    fn definitions(&self) -> Vec<ToolDefinition> {
        vec![ToolDefinition {
            name: SEARCH_TOOL.to_string(),
            description: "Search the web. Returns titles, URLs and page content for the best matches."
                .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "The search query"}
                },
                "required": ["query"]
            }),
        }]
    }

    async fn call(&self, name: &str, arguments: &serde_json::Value) -> std::result::Result<String, String> {
        if name != SEARCH_TOOL {
            return Err(format!("Unknown tool: {}", name));
        }
        let query = arguments["query"]
            .as_str()
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| "Missing 'query' argument".to_string())?;

        self.client
            .search(query)
            .await
            .map(|results| render_results(&results))
            .map_err(|e| e.to_string())
    }
}

/// Researcher that lets a model drive Tavily searches
pub struct ReactResearcher {
    provider: Arc<dyn LLMProviderTrait>,
    settings: ModelSettings,
    search: TavilyClient,
    max_steps: usize,
}

impl ReactResearcher {
    pub fn new(
        provider: Arc<dyn LLMProviderTrait>,
        settings: ModelSettings,
        search: TavilyClient,
        max_steps: usize,
    ) -> Self {
        Self {
            provider,
            settings,
            search,
            max_steps,
        }
    }
}

#[async_trait]
impl Researcher for ReactResearcher {
    async fn research(&self, meetings: &[Meeting]) -> Result<String> {
        if !self.search.is_configured() {
            tracing::warn!("[RESEARCH] TAVILY_API_KEY not set; searches will fail");
        }

        tracing::info!(
            "[RESEARCH] Researching {} meeting(s) with {} (max {} steps)",
            meetings.len(),
            self.settings.model,
            self.max_steps
        );

        let tool = SearchTool {
            client: &self.search,
        };
        let findings = run_tool_loop(
            self.provider.as_ref(),
            &self.settings,
            RESEARCH_SYSTEM_PROMPT,
            &research_prompt(meetings),
            &tool,
            self.max_steps,
        )
        .await?;

        tracing::info!("[RESEARCH] Findings ready ({} chars)", findings.len());
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::*;
    use crate::brain::{ProviderError, ProviderResponse, ProviderType, ToolCallRequest};
    use crate::research::TavilyConfig;
    use crate::testing::ScriptedProvider;
    use crate::PrepError;

    fn acme() -> Meeting {
        let mut attendees = IndexMap::new();
        attendees.insert("jane@acme.com".to_string(), "jane".to_string());
        Meeting {
            company: "Acme".into(),
            title: "Acme Sync".into(),
            attendees,
            meeting_time: "2:00 PM".into(),
        }
    }

    #[test]
    fn prompt_embeds_meetings() {
        let prompt = research_prompt(&[acme()]);
        assert!(prompt.contains("jane@acme.com"));
        assert!(prompt.contains("AI initiatives"));
    }

    #[tokio::test]
    async fn search_failures_go_back_to_the_model() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .respond(ProviderResponse::ToolCalls {
                    calls: vec![ToolCallRequest {
                        id: "call_1".into(),
                        name: SEARCH_TOOL.into(),
                        arguments: serde_json::json!({"query": "Jane Acme linkedin"}),
                    }],
                    usage: None,
                })
                .respond_text("Jane leads AI at Acme [link](https://acme.com)"),
        );
        let researcher = ReactResearcher::new(
            provider.clone(),
            ModelSettings::new(ProviderType::OpenAI, "o3-mini-2025-01-31"),
            TavilyClient::new(TavilyConfig::default()),
            5,
        );

        let findings = researcher.research(&[acme()]).await.unwrap();
        assert!(findings.contains("Jane leads AI"));

        let requests = provider.requests();
        let tool_result = requests[1].messages.last().unwrap();
        assert!(tool_result.content.starts_with("Error: "));
        assert!(tool_result.content.contains("TAVILY_API_KEY"));
    }

    #[tokio::test]
    async fn unknown_tool_and_missing_query_are_tool_errors() {
        let client = TavilyClient::new(TavilyConfig::default());
        let tool = SearchTool { client: &client };
        assert_eq!(
            tool.call("web_fetch", &serde_json::json!({})).await.unwrap_err(),
            "Unknown tool: web_fetch"
        );
        assert!(tool
            .call(SEARCH_TOOL, &serde_json::json!({"query": " "}))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn terminal_model_failure_propagates() {
        let provider = Arc::new(ScriptedProvider::new().fail_with(ProviderError::AuthError(
            "invalid key".into(),
        )));
        let researcher = ReactResearcher::new(
            provider,
            ModelSettings::new(ProviderType::OpenAI, "o3-mini-2025-01-31"),
            TavilyClient::new(TavilyConfig::default()),
            5,
        );
        assert!(matches!(
            researcher.research(&[acme()]).await,
            Err(PrepError::Provider(ProviderError::AuthError(_)))
        ));
    }
}
