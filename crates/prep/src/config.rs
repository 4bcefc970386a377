//! Environment-driven configuration for the pipeline and its collaborators.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::brain::{ModelSettings, ProviderType};
use crate::calendar::CalendarMcpConfig;
use crate::research::TavilyConfig;
use crate::{PrepError, Result};

/// Everything needed to build a [`crate::Pipeline`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrepConfig {
    /// Attendees whose email contains this domain are the operator's colleagues
    pub operator_domain: String,
    pub calendar: CalendarMcpConfig,
    pub calendar_model: ModelSettings,
    pub extraction_model: ModelSettings,
    pub research_model: ModelSettings,
    pub formatter_model: ModelSettings,
    pub tavily: TavilyConfig,
    pub research_max_steps: usize,
}

impl Default for PrepConfig {
    fn default() -> Self {
        Self {
            operator_domain: "tavily.com".to_string(),
            calendar: CalendarMcpConfig::default(),
            calendar_model: ModelSettings::new(ProviderType::Groq, "llama-3.3-70b-versatile"),
            extraction_model: ModelSettings::new(ProviderType::OpenAI, "gpt-4.1-nano")
                .with_temperature(0.0),
            research_model: ModelSettings::new(ProviderType::OpenAI, "o3-mini-2025-01-31"),
            formatter_model: ModelSettings::new(ProviderType::OpenAI, "gpt-4.1"),
            tavily: TavilyConfig::default(),
            research_max_steps: 15,
        }
    }
}

impl PrepConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset or blank keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(domain) = get("OPERATOR_DOMAIN") {
            config.operator_domain = domain.trim().to_string();
        }

        if let Some(command) = get("CALENDAR_MCP_COMMAND") {
            config.calendar.command = command;
        }
        if let Some(script) = get("GOOGLE_CALENDAR_CONFIG") {
            config.calendar.args.push(script);
        }
        if let Some(extra) = get("CALENDAR_MCP_ARGS") {
            config
                .calendar
                .args
                .extend(extra.split_whitespace().map(String::from));
        }
        if config.calendar.args.is_empty() {
            tracing::warn!("[CONFIG] GOOGLE_CALENDAR_CONFIG not set; calendar MCP server gets no script");
        }
        config.calendar.max_steps =
            parse_or(get("CALENDAR_MAX_STEPS"), "CALENDAR_MAX_STEPS", config.calendar.max_steps);

        apply_model(&get, "CALENDAR", &mut config.calendar_model)?;
        apply_model(&get, "EXTRACTION", &mut config.extraction_model)?;
        apply_model(&get, "RESEARCH", &mut config.research_model)?;
        apply_model(&get, "FORMATTER", &mut config.formatter_model)?;

        config.tavily.api_key = get("TAVILY_API_KEY");
        config.tavily.max_results =
            parse_or(get("TAVILY_MAX_RESULTS"), "TAVILY_MAX_RESULTS", config.tavily.max_results);
        if let Some(depth) = get("TAVILY_SEARCH_DEPTH") {
            config.tavily.search_depth = depth;
        }
        config.research_max_steps =
            parse_or(get("RESEARCH_MAX_STEPS"), "RESEARCH_MAX_STEPS", config.research_max_steps);

        Ok(config)
    }
}

fn apply_model<G>(get: &G, prefix: &str, settings: &mut ModelSettings) -> Result<()>
where
    G: Fn(&str) -> Option<String>,
{
    if let Some(provider) = get(&format!("{}_PROVIDER", prefix)) {
        settings.provider = ProviderType::from_str(&provider).map_err(|e| {
            PrepError::Config(format!("{}_PROVIDER: {}", prefix, e))
        })?;
    }
    if let Some(model) = get(&format!("{}_MODEL", prefix)) {
        settings.model = model;
    }
    Ok(())
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display + Copy,
{
    match value {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("[CONFIG] Invalid {}='{}', using {}", key, raw, default);
            default
        }),
    }
}
