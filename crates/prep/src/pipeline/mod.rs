//! Pipeline orchestrator: Fetch, Extract, Research, Format, strictly in that order.
//!
//! A run is split in two so a caller can hold back its response until the calendar has been
//! fetched: [`Pipeline::begin`] runs Fetch, [`FetchedRun::finish`] runs the rest. Every stage
//! reports through the run's [`TraceSink`]; the run stops as soon as the reading side of that
//! sink goes away.

use std::sync::Arc;

use uuid::Uuid;

use crate::brain::{build_provider, LLMProviderTrait, ModelSettings};
use crate::calendar::{CalendarSource, McpCalendarAgent};
use crate::config::PrepConfig;
use crate::events::{TraceEvent, TraceSink};
use crate::research::{ReactResearcher, Researcher, TavilyClient};
use crate::{PrepError, Result};

pub mod extract;
mod meeting;
mod prompts;
pub mod stages;
mod state;

pub use meeting::{meetings_to_prompt_json, CalendarData, Meeting, RawAttendee, RawMeeting};
pub use prompts::{extraction_prompt, formatting_prompt};
pub use state::{RunState, Slot};

/// External capabilities a run depends on
#[derive(Clone)]
pub struct Collaborators {
    pub calendar: Arc<dyn CalendarSource>,
    pub extractor: Arc<dyn LLMProviderTrait>,
    pub researcher: Arc<dyn Researcher>,
    pub formatter: Arc<dyn LLMProviderTrait>,
}

impl Collaborators {
    /// Production collaborators: MCP calendar agent, OpenAI-compatible models, Tavily research
    pub fn from_config(config: &PrepConfig) -> Self {
        let calendar = McpCalendarAgent::new(
            config.calendar.clone(),
            build_provider(&config.calendar_model),
            config.calendar_model.clone(),
        );
        let researcher = ReactResearcher::new(
            build_provider(&config.research_model),
            config.research_model.clone(),
            TavilyClient::new(config.tavily.clone()),
            config.research_max_steps,
        );

        Self {
            calendar: Arc::new(calendar),
            extractor: build_provider(&config.extraction_model),
            researcher: Arc::new(researcher),
            formatter: build_provider(&config.formatter_model),
        }
    }
}

/// Per-run settings the stages need besides their collaborators
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub operator_domain: String,
    pub extraction: ModelSettings,
    pub formatter: ModelSettings,
}

impl PipelineSettings {
    pub fn from_config(config: &PrepConfig) -> Self {
        Self {
            operator_domain: config.operator_domain.clone(),
            extraction: config.extraction_model.clone(),
            formatter: config.formatter_model.clone(),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&PrepConfig::default())
    }
}

pub struct Pipeline {
    collaborators: Collaborators,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(collaborators: Collaborators, settings: PipelineSettings) -> Self {
        Self {
            collaborators,
            settings,
        }
    }

    pub fn from_config(config: &PrepConfig) -> Self {
        Self::new(
            Collaborators::from_config(config),
            PipelineSettings::from_config(config),
        )
    }

    /// Run the Fetch stage. A failure here is reported only through the returned error; the
    /// sink holds at most the fetch status event.
    pub async fn begin(self, date: impl Into<String>, sink: TraceSink) -> Result<FetchedRun> {
        let run_id = Uuid::new_v4();
        let state = RunState::new(date);
        tracing::info!("[PIPELINE] Run {} started for '{}'", run_id, state.date());

        if let Err(e) =
            stages::fetch_calendar(self.collaborators.calendar.as_ref(), &state, &sink).await
        {
            tracing::error!("[PIPELINE] Run {} failed to fetch calendar: {}", run_id, e);
            return Err(e);
        }

        Ok(FetchedRun {
            pipeline: self,
            state,
            sink,
            run_id,
        })
    }

    /// All four stages back to back
    pub async fn run(self, date: impl Into<String>, sink: TraceSink) -> Result<RunState> {
        self.begin(date, sink).await?.finish().await
    }

    async fn remaining_stages(&self, state: &RunState, sink: &TraceSink) -> Result<()> {
        let c = &self.collaborators;
        stages::extract_meetings(
            c.extractor.as_ref(),
            &self.settings.extraction,
            &self.settings.operator_domain,
            state,
            sink,
        )
        .await?;
        stages::research_meetings(c.researcher.as_ref(), state, sink).await?;
        stages::format_briefing(c.formatter.as_ref(), &self.settings.formatter, state, sink).await
    }
}

/// A run whose calendar has been fetched
pub struct FetchedRun {
    pipeline: Pipeline,
    state: RunState,
    sink: TraceSink,
    run_id: Uuid,
}

impl FetchedRun {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Extract, Research and Format. Any failure other than a disconnect is published as a
    /// terminal `RunFailed` event before it is returned.
    pub async fn finish(self) -> Result<RunState> {
        let FetchedRun {
            pipeline,
            state,
            sink,
            run_id,
        } = self;

        let outcome = tokio::select! {
            result = pipeline.remaining_stages(&state, &sink) => result,
            _ = sink.closed() => Err(PrepError::StreamClosed),
        };

        match outcome {
            Ok(()) => {
                tracing::info!("[PIPELINE] Run {} complete", run_id);
                Ok(state)
            }
            Err(PrepError::StreamClosed) => {
                tracing::warn!("[PIPELINE] Run {} abandoned: client disconnected", run_id);
                Err(PrepError::StreamClosed)
            }
            Err(e) => {
                tracing::error!("[PIPELINE] Run {} failed: {}", run_id, e);
                let _ = sink.emit(TraceEvent::RunFailed {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }
}
