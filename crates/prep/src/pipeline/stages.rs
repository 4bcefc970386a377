//! The four stages. Each publishes its status event before doing any work, writes exactly one
//! [`RunState`] slot, and brackets itself with start/finish trace events.

use std::time::Instant;

use futures::StreamExt;

use super::extract::{build_meetings, parse_calendar_data};
use super::meeting::CalendarData;
use super::prompts::{extraction_prompt, formatting_prompt};
use super::state::RunState;
use crate::brain::{ChatRequest, LLMProviderTrait, ModelSettings, ResponseFormat};
use crate::calendar::CalendarSource;
use crate::events::{CallMode, Stage, StatusKind, TraceEvent, TraceSink};
use crate::research::Researcher;
use crate::{PrepError, Result};

pub const CALENDAR_STATUS: &str = "Connecting to Google Calendar MCP...";
pub const CALENDAR_PARSER_STATUS: &str = "Analyzing Your Calendar...";
pub const REACT_STATUS: &str = "Searching Tavily for Meeting Insights...";
pub const MARKDOWN_FORMATTER_STATUS: &str = "Formatting Meeting Insights...";

struct StageTimer {
    stage: Stage,
    started: Instant,
}

impl StageTimer {
    fn start(stage: Stage, sink: &TraceSink) -> Result<Self> {
        tracing::info!("[PIPELINE] Stage {} ({}/4) started", stage.as_str(), stage.order());
        sink.emit(TraceEvent::StageStarted { stage })?;
        Ok(Self {
            stage,
            started: Instant::now(),
        })
    }

    fn finish(self, sink: &TraceSink) -> Result<()> {
        let elapsed_ms = self.started.elapsed().as_millis() as u64;
        tracing::info!(
            "[PIPELINE] Stage {} finished in {}ms",
            self.stage.as_str(),
            elapsed_ms
        );
        sink.emit(TraceEvent::StageFinished {
            stage: self.stage,
            elapsed_ms,
        })
    }
}

/// Fetch: raw calendar text for the run's date
pub async fn fetch_calendar(
    calendar: &dyn CalendarSource,
    state: &RunState,
    sink: &TraceSink,
) -> Result<()> {
    let timer = StageTimer::start(Stage::CalendarFetch, sink)?;
    sink.status(StatusKind::CalendarStatus, CALENDAR_STATUS)?;

    let calendar_data = calendar.fetch(state.date()).await?;
    state.calendar_data.set(calendar_data)?;

    timer.finish(sink)
}

/// Extract: structured meetings from the raw calendar text
pub async fn extract_meetings(
    extractor: &dyn LLMProviderTrait,
    settings: &ModelSettings,
    operator_domain: &str,
    state: &RunState,
    sink: &TraceSink,
) -> Result<()> {
    let timer = StageTimer::start(Stage::CalendarExtraction, sink)?;
    sink.status(StatusKind::CalendarParserStatus, CALENDAR_PARSER_STATUS)?;

    let prompt = extraction_prompt(state.calendar_data.get()?, operator_domain);
    let request = ChatRequest::single(settings.chat_config(), prompt).with_response_format(
        ResponseFormat::JsonSchema {
            name: "CalendarData".to_string(),
            schema: CalendarData::json_schema(),
        },
    );

    let response = extractor.chat(request).await?;
    let text = response
        .text()
        .ok_or_else(|| PrepError::Schema("extraction model answered with tool calls".to_string()))?
        .to_string();
    sink.emit(TraceEvent::ModelOutput {
        mode: CallMode::Buffered,
        text: text.clone(),
    })?;

    let meetings = build_meetings(parse_calendar_data(&text)?, operator_domain, sink)?;
    tracing::info!("[PIPELINE] Extracted {} meeting(s)", meetings.len());
    state.calendar_events.set(meetings)?;

    timer.finish(sink)
}

/// Research: free-text findings about every meeting's attendees and company
pub async fn research_meetings(
    researcher: &dyn Researcher,
    state: &RunState,
    sink: &TraceSink,
) -> Result<()> {
    let timer = StageTimer::start(Stage::Research, sink)?;
    sink.status(StatusKind::ReactStatus, REACT_STATUS)?;

    let findings = researcher.research(state.calendar_events.get()?).await?;
    state.research_results.set(findings)?;

    timer.finish(sink)
}

/// Format: the markdown briefing, streamed to the client fragment by fragment
pub async fn format_briefing(
    formatter: &dyn LLMProviderTrait,
    settings: &ModelSettings,
    state: &RunState,
    sink: &TraceSink,
) -> Result<()> {
    let timer = StageTimer::start(Stage::Formatting, sink)?;
    sink.status(StatusKind::MarkdownFormatterStatus, MARKDOWN_FORMATTER_STATUS)?;

    let prompt = formatting_prompt(state.calendar_events.get()?, state.research_results.get()?);
    let mut stream = formatter
        .chat_stream(ChatRequest::single(settings.chat_config(), prompt))
        .await?;

    let mut document = String::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if !chunk.content.is_empty() {
            document.push_str(&chunk.content);
            sink.emit(TraceEvent::ModelOutput {
                mode: CallMode::Streaming,
                text: chunk.content,
            })?;
        }
        if chunk.is_done {
            break;
        }
    }

    state.formatted_output.set(document)?;
    timer.finish(sink)
}
