//! Meeting preparation pipeline.
//!
//! Fetches a day's calendar, extracts client meetings and attendees, researches them on the
//! web and formats a markdown briefing, publishing progress and formatter output as a stream
//! of event records while it runs.

pub mod brain;
pub mod calendar;
pub mod config;
pub mod events;
pub mod pipeline;
pub mod research;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use config::PrepConfig;
pub use events::{trace_channel, EventKind, EventMultiplexer, EventRecord, TraceReceiver, TraceSink};
pub use pipeline::{Collaborators, FetchedRun, Meeting, Pipeline, PipelineSettings, RunState};

/// Errors that abort a pipeline run
#[derive(Debug, thiserror::Error)]
pub enum PrepError {
    #[error("Calendar error: {0}")]
    Calendar(#[from] calendar::CalendarError),

    #[error("LLM error: {0}")]
    Provider(#[from] brain::ProviderError),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Run state error: {0}")]
    State(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Client disconnected")]
    StreamClosed,
}

pub type Result<T> = std::result::Result<T, PrepError>;
