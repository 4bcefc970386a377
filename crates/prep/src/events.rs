//! Event taxonomy and multiplexer.
//!
//! Stages write [`TraceEvent`]s into a [`TraceSink`]. The [`EventMultiplexer`] decides which of
//! those reach the client and turns them into [`EventRecord`]s, preserving emission order.

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use ts_rs::TS;

use crate::{PrepError, Result};

/// The four pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    CalendarFetch,
    CalendarExtraction,
    Research,
    Formatting,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::CalendarFetch => "calendar_fetch",
            Stage::CalendarExtraction => "calendar_extraction",
            Stage::Research => "research",
            Stage::Formatting => "formatting",
        }
    }

    pub fn order(&self) -> u32 {
        match self {
            Stage::CalendarFetch => 1,
            Stage::CalendarExtraction => 2,
            Stage::Research => 3,
            Stage::Formatting => 4,
        }
    }
}

/// Named progress events a stage may publish
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    CalendarStatus,
    CalendarParserStatus,
    ReactStatus,
    MarkdownFormatterStatus,
    CompanyEvent,
}

/// Whether a model call's output is meant for the client as it is produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallMode {
    Streaming,
    Buffered,
}

/// Everything observable about a run, in the order it happened
#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    StageStarted {
        stage: Stage,
    },
    StageFinished {
        stage: Stage,
        elapsed_ms: u64,
    },
    Status {
        kind: StatusKind,
        payload: serde_json::Value,
    },
    ModelOutput {
        mode: CallMode,
        text: String,
    },
    RunFailed {
        message: String,
    },
}

impl TraceEvent {
    pub fn status(kind: StatusKind, payload: impl Into<serde_json::Value>) -> Self {
        TraceEvent::Status {
            kind,
            payload: payload.into(),
        }
    }
}

/// Type tag of an outward record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Streaming,
    CalendarStatus,
    CalendarParserStatus,
    ReactStatus,
    MarkdownFormatterStatus,
    CompanyEvent,
    /// Terminal record after a failure once streaming has begun
    Error,
}

impl From<StatusKind> for EventKind {
    fn from(kind: StatusKind) -> Self {
        match kind {
            StatusKind::CalendarStatus => EventKind::CalendarStatus,
            StatusKind::CalendarParserStatus => EventKind::CalendarParserStatus,
            StatusKind::ReactStatus => EventKind::ReactStatus,
            StatusKind::MarkdownFormatterStatus => EventKind::MarkdownFormatterStatus,
            StatusKind::CompanyEvent => EventKind::CompanyEvent,
        }
    }
}

/// One JSON object on the outward stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct EventRecord {
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[ts(type = "unknown")]
    pub content: serde_json::Value,
}

impl EventRecord {
    pub fn new(kind: EventKind, content: impl Into<serde_json::Value>) -> Self {
        Self {
            kind,
            content: content.into(),
        }
    }

    /// Compact JSON followed by a newline
    pub fn to_ndjson_line(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)
            .map_err(|e| PrepError::Schema(format!("failed to encode event record: {}", e)))?;
        line.push('\n');
        Ok(line)
    }
}

/// Selects and maps trace events for the client
#[derive(Debug, Default, Clone, Copy)]
pub struct EventMultiplexer;

impl EventMultiplexer {
    /// Streaming model output, status events and run failures pass; everything else is dropped
    pub fn map(event: &TraceEvent) -> Option<EventRecord> {
        match event {
            TraceEvent::ModelOutput {
                mode: CallMode::Streaming,
                text,
            } => Some(EventRecord::new(EventKind::Streaming, text.clone())),
            TraceEvent::Status { kind, payload } => {
                Some(EventRecord::new((*kind).into(), payload.clone()))
            }
            TraceEvent::RunFailed { message } => {
                Some(EventRecord::new(EventKind::Error, message.clone()))
            }
            TraceEvent::ModelOutput {
                mode: CallMode::Buffered,
                ..
            }
            | TraceEvent::StageStarted { .. }
            | TraceEvent::StageFinished { .. } => None,
        }
    }

    /// Adapt a trace stream into the outward record stream without reordering
    pub fn records<S>(trace: S) -> impl Stream<Item = EventRecord> + Send
    where
        S: Stream<Item = TraceEvent> + Send,
    {
        trace.filter_map(|event| futures::future::ready(Self::map(&event)))
    }
}

/// Write side of a run's trace
#[derive(Debug, Clone)]
pub struct TraceSink {
    sender: mpsc::UnboundedSender<TraceEvent>,
}

impl TraceSink {
    /// Fails with [`PrepError::StreamClosed`] once the reader has gone away
    pub fn emit(&self, event: TraceEvent) -> Result<()> {
        self.sender.send(event).map_err(|_| PrepError::StreamClosed)
    }

    pub fn status(&self, kind: StatusKind, payload: impl Into<serde_json::Value>) -> Result<()> {
        self.emit(TraceEvent::status(kind, payload))
    }

    /// Resolves when the reader is dropped
    pub async fn closed(&self) {
        self.sender.closed().await
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Read side of a run's trace
pub struct TraceReceiver {
    receiver: mpsc::UnboundedReceiver<TraceEvent>,
}

impl TraceReceiver {
    pub fn into_stream(self) -> UnboundedReceiverStream<TraceEvent> {
        UnboundedReceiverStream::new(self.receiver)
    }

    /// Outward records for this trace
    pub fn into_records(self) -> impl Stream<Item = EventRecord> + Send {
        EventMultiplexer::records(self.into_stream())
    }

    /// Everything emitted so far, without waiting
    pub fn drain(&mut self) -> Vec<TraceEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }
}

pub fn trace_channel() -> (TraceSink, TraceReceiver) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (TraceSink { sender }, TraceReceiver { receiver })
}
