//! Tavily search API client

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::SearchError;

const DEFAULT_ENDPOINT: &str = "https://api.tavily.com/search";

/// Characters of raw page content kept per result
const RAW_CONTENT_LIMIT: usize = 4000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TavilyConfig {
    pub api_key: Option<String>,
    pub max_results: usize,
    pub search_depth: String,
    pub endpoint: String,
}

impl Default for TavilyConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            max_results: 3,
            search_depth: "advanced".to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub content: String,
    pub raw_content: Option<String>,
    pub score: Option<f64>,
}

pub struct TavilyClient {
    http_client: reqwest::Client,
    config: TavilyConfig,
}

impl TavilyClient {
    pub fn new(config: TavilyConfig) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            config,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.config
            .api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }

    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| SearchError::NotConfigured("TAVILY_API_KEY not set".to_string()))?;

        tracing::info!("[TAVILY] Searching: {}", query);

        let response = self
            .http_client
            .post(&self.config.endpoint)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({
                "query": query,
                "max_results": self.config.max_results,
                "search_depth": self.config.search_depth,
                "include_raw_content": true,
            }))
            .send()
            .await
            .map_err(|e| SearchError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(SearchError::ApiError { status, message });
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| SearchError::ParseError(e.to_string()))?;

        let results = parse_results(&json);
        tracing::debug!("[TAVILY] {} result(s) for '{}'", results.len(), query);
        Ok(results)
    }
}

fn parse_results(json: &Value) -> Vec<SearchResult> {
    json["results"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .map(|r| SearchResult {
                    title: r["title"].as_str().unwrap_or("").to_string(),
                    url: r["url"].as_str().unwrap_or("").to_string(),
                    content: r["content"].as_str().unwrap_or("").to_string(),
                    raw_content: r["raw_content"].as_str().map(truncate_raw),
                    score: r["score"].as_f64(),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn truncate_raw(text: &str) -> String {
    match text.char_indices().nth(RAW_CONTENT_LIMIT) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Plain-text rendering handed back to the research model
pub fn render_results(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "No results found.".to_string();
    }

    results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let mut block = format!("[{}] {}\nURL: {}\n{}", i + 1, r.title, r.url, r.content);
            if let Some(raw) = r.raw_content.as_deref().filter(|raw| !raw.is_empty()) {
                block.push_str("\n\nPage content:\n");
                block.push_str(raw);
            }
            block
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}
